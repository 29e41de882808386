//! Turning plain data into tree nodes.
//!
//! Creation builds a detached subtree and needs no running action. When a
//! creation step fails, every node it created is discarded again; nodes the
//! caller handed in are released unchanged.

use crate::errors::{ArborError, Result};
use crate::model::{ModelClass, PropDef};
use crate::ops::store::{ModelData, NodeData, ParentLink, Store};
use crate::snapshot::{Snapshot, FROZEN_KEY, MODEL_ID_KEY, MODEL_TYPE_KEY};
use crate::value::{Input, NodeId, PathSegment, Value};
use indexmap::IndexMap;
use std::rc::Rc;

/// Whether `$modelId`s found in input data are kept or replaced by fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdMode {
    Keep,
    Regenerate,
}

/// Initial prop values for [`Store::create_model`].
#[derive(Debug, Clone, Default)]
pub struct Props {
    values: IndexMap<String, Input>,
    model_id: Option<String>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Use this id instead of a generated one.
    ///
    /// Creating a model of a class built with `without_id` fails with
    /// `InvalidSnapshot` when an id is given.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Props from a JSON object; each value is tweaked on creation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSnapshot` when `json` is not an object.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(ArborError::InvalidSnapshot {
                reason: "model props must be a JSON object".to_string(),
            });
        };
        let mut props = Props::new();
        for (key, value) in map {
            if key == MODEL_ID_KEY {
                props.model_id = value.as_str().map(str::to_string);
            } else {
                props.values.insert(key, Input::Json(value));
            }
        }
        Ok(props)
    }
}

fn is_frozen_json(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    map.get(FROZEN_KEY).and_then(serde_json::Value::as_bool) == Some(true)
}

impl Store {
    /// Convert an input into a tree value.
    ///
    /// JSON containers become fresh detached nodes. A node handle is returned
    /// unchanged, so tweaking an existing node is a no-op.
    ///
    /// # Errors
    ///
    /// Fails for unknown model types, undeclared props, duplicate model ids
    /// inside the input and prop type errors.
    pub fn tweak(&mut self, input: impl Into<Input>) -> Result<Value> {
        Ok(self.prepare_input(input.into(), IdMode::Keep)?.0)
    }

    /// Create a model instance of a registered type.
    ///
    /// # Errors
    ///
    /// `UnknownModelType`, `UnknownProp`, `TypeCheck`, or a hierarchy error
    /// when a provided node already has a parent.
    pub fn create_model(&mut self, model_type: &str, props: Props) -> Result<NodeId> {
        let class = self.registry.require(model_type)?;
        self.build_model(class, props.model_id, props.values, IdMode::Keep)
    }

    /// Create a frozen node holding opaque data.
    pub fn frozen(&mut self, data: serde_json::Value) -> NodeId {
        self.alloc(NodeData::Frozen(Snapshot::from_json(&data)))
    }

    /// Returns the value plus whether new nodes were created for it.
    pub(crate) fn prepare_input(&mut self, input: Input, mode: IdMode) -> Result<(Value, bool)> {
        match input {
            Input::Value(Value::Node(id)) => {
                self.node(id)?;
                Ok((Value::Node(id), false))
            }
            Input::Value(value) => Ok((value, false)),
            Input::Json(json) => {
                let value = self.create_from_json(&json, mode)?;
                let created = value.is_node();
                Ok((value, created))
            }
        }
    }

    pub(crate) fn create_from_json(&mut self, json: &serde_json::Value, mode: IdMode) -> Result<Value> {
        if let Some(primitive) = Value::from_json_primitive(json) {
            return Ok(primitive);
        }
        let id = match json {
            serde_json::Value::Array(items) => self.create_array(items, mode)?,
            serde_json::Value::Object(map) if is_frozen_json(map) => {
                let data = map.get("data").cloned().unwrap_or(serde_json::Value::Null);
                self.frozen(data)
            }
            serde_json::Value::Object(map) if map.contains_key(MODEL_TYPE_KEY) => {
                self.create_model_from_json(map, mode)?
            }
            serde_json::Value::Object(map) => self.create_object(map, mode)?,
            _ => {
                return Err(ArborError::Internal {
                    message: "primitive JSON reached container creation".to_string(),
                })
            }
        };
        Ok(Value::Node(id))
    }

    fn create_array(&mut self, items: &[serde_json::Value], mode: IdMode) -> Result<NodeId> {
        let array = self.alloc(NodeData::Array(Vec::with_capacity(items.len())));
        for (index, item) in items.iter().enumerate() {
            let built = self
                .create_from_json(item, mode)
                .and_then(|value| self.attach_new_child(array, PathSegment::Index(index), value));
            if let Err(e) = built {
                self.discard_subtree(array);
                return Err(e);
            }
        }
        Ok(array)
    }

    fn create_object(
        &mut self,
        map: &serde_json::Map<String, serde_json::Value>,
        mode: IdMode,
    ) -> Result<NodeId> {
        let object = self.alloc(NodeData::Object(IndexMap::with_capacity(map.len())));
        for (key, item) in map {
            let built = self
                .create_from_json(item, mode)
                .and_then(|value| self.attach_new_child(object, PathSegment::from(key), value));
            if let Err(e) = built {
                self.discard_subtree(object);
                return Err(e);
            }
        }
        Ok(object)
    }

    fn create_model_from_json(
        &mut self,
        map: &serde_json::Map<String, serde_json::Value>,
        mode: IdMode,
    ) -> Result<NodeId> {
        let model_type = map
            .get(MODEL_TYPE_KEY)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ArborError::InvalidSnapshot {
                reason: format!("{} must be a string", MODEL_TYPE_KEY),
            })?;
        let class = self.registry.require(model_type)?;
        let map = match &class.from_snapshot {
            Some(process) => process(map.clone()),
            None => map.clone(),
        };
        let model_id = match mode {
            IdMode::Keep => map
                .get(MODEL_ID_KEY)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            IdMode::Regenerate => None,
        };
        let props: IndexMap<String, Input> = map
            .into_iter()
            .filter(|(key, _)| key != MODEL_TYPE_KEY && key != MODEL_ID_KEY)
            .map(|(key, value)| (key, Input::Json(value)))
            .collect();
        self.build_model(class, model_id, props, mode)
    }

    pub(crate) fn build_model(
        &mut self,
        class: Rc<ModelClass>,
        model_id: Option<String>,
        mut props: IndexMap<String, Input>,
        mode: IdMode,
    ) -> Result<NodeId> {
        if let Some(unknown) = props.keys().find(|key| class.prop(key).is_none()) {
            return Err(ArborError::UnknownProp {
                model_type: class.name.clone(),
                prop: unknown.clone(),
            });
        }

        let model_id = match (class.has_id, model_id) {
            (true, model_id) => Some(model_id.unwrap_or_else(|| self.config.generate_model_id())),
            (false, None) => None,
            (false, Some(model_id)) => {
                return Err(ArborError::InvalidSnapshot {
                    reason: format!(
                        "model type '{}' has no id, but '{}' was given",
                        class.name, model_id
                    ),
                })
            }
        };
        let node = self.alloc(NodeData::Model(ModelData {
            class: class.clone(),
            id: model_id,
            props: IndexMap::with_capacity(class.props.len()),
        }));

        let mut borrowed = Vec::new();
        for (name, def) in class.props.iter() {
            let input = props
                .shift_remove(name)
                .or_else(|| def.default.as_ref().map(|d| d.to_input()))
                .unwrap_or(Input::Value(Value::Null));
            if let Err(e) = self.init_prop(node, name, def, input, mode, &mut borrowed) {
                self.abandon_model(node, &borrowed);
                return Err(e);
            }
        }

        if let Some(hook) = class.on_init.clone() {
            if let Err(e) = self.run_hook(node, crate::ops::lifecycle::HOOK_ON_INIT, hook) {
                self.abandon_model(node, &borrowed);
                return Err(e);
            }
        }
        Ok(node)
    }

    fn init_prop(
        &mut self,
        node: NodeId,
        name: &str,
        def: &PropDef,
        input: Input,
        mode: IdMode,
        borrowed: &mut Vec<NodeId>,
    ) -> Result<()> {
        let (value, created) = self.prepare_input(input, mode)?;
        if self.config.type_checking_enabled() {
            if let Some(prop_type) = &def.prop_type {
                if let Some(err) = prop_type.check(self, &value, &[PathSegment::from(name)]) {
                    return self.reject_input(&value, created, ArborError::TypeCheck(err));
                }
            }
        }
        if let Err(e) = self.attach_new_child(node, PathSegment::from(name), value.clone()) {
            return self.reject_input(&value, created, e);
        }
        if let (Value::Node(child), false) = (&value, created) {
            borrowed.push(*child);
        }
        Ok(())
    }

    /// Undo a half-built model, handing caller-owned children back detached.
    fn abandon_model(&mut self, node: NodeId, borrowed: &[NodeId]) {
        for child in borrowed {
            if let Some(n) = self.nodes.get_mut(child) {
                if n.parent.as_ref().is_some_and(|link| link.parent == node) {
                    n.parent = None;
                }
            }
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            if let NodeData::Model(model) = &mut n.data {
                for value in model.props.values_mut() {
                    if value.as_node().is_some_and(|id| borrowed.contains(&id)) {
                        *value = Value::Null;
                    }
                }
            }
        }
        self.discard_subtree(node);
    }

    pub(crate) fn reject_input<T>(&mut self, value: &Value, created: bool, err: ArborError) -> Result<T> {
        if created {
            self.discard_value(value);
        }
        Err(err)
    }

    /// Attach a value under a node that is still being built.
    pub(crate) fn attach_new_child(
        &mut self,
        container: NodeId,
        key: PathSegment,
        value: Value,
    ) -> Result<()> {
        if let Value::Node(child) = &value {
            self.check_attachable(*child, container, &[])?;
        }
        let child = value.as_node();
        match &mut self.node_mut(container)?.data {
            NodeData::Object(map) => {
                map.insert(key.as_key(), value);
            }
            NodeData::Model(model) => {
                model.props.insert(key.as_key(), value);
            }
            NodeData::Array(items) => items.push(value),
            NodeData::Frozen(_) => {
                return Err(ArborError::WrongNodeKind {
                    node: container,
                    expected: "container".to_string(),
                    actual: "frozen".to_string(),
                })
            }
        }
        if let Some(child) = child {
            self.node_mut(child)?.parent = Some(ParentLink {
                parent: container,
                key,
            });
            self.structure_version += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::registry::Registry;
    use crate::NodeKind;
    use serde_json::json;

    fn store_with_point() -> Store {
        let registry = Registry::new();
        registry
            .register(
                ModelClass::builder("Point")
                    .prop("x", PropDef::with_default(0))
                    .prop("y", PropDef::with_default(0))
                    .build(),
            )
            .unwrap();
        Store::with_registry(Rc::new(registry))
    }

    #[test]
    fn test_tweak_primitive_is_identity() {
        let mut store = store_with_point();
        assert_eq!(store.tweak(json!(5)).unwrap(), Value::from(5));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_tweak_existing_node_is_idempotent() {
        let mut store = store_with_point();
        let first = store.tweak(json!({"a": 1})).unwrap();
        let again = store.tweak(first.clone()).unwrap();
        assert_eq!(first, again);
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_model_snapshot_json_becomes_model() {
        let mut store = store_with_point();
        let node = store
            .tweak(json!({"$modelType": "Point", "$modelId": "p1", "x": 3}))
            .unwrap()
            .as_node()
            .unwrap();
        assert_eq!(store.kind(node).unwrap(), NodeKind::Model);
        assert_eq!(store.model_id(node).unwrap().as_deref(), Some("p1"));
        assert_eq!(store.get(node, "x").unwrap(), Value::from(3));
        assert_eq!(store.get(node, "y").unwrap(), Value::from(0));
    }

    #[test]
    fn test_unknown_prop_creates_nothing() {
        let mut store = store_with_point();
        let err = store
            .tweak(json!([{"$modelType": "Point", "z": 1}]))
            .unwrap_err();
        assert!(matches!(err, ArborError::UnknownProp { .. }));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_duplicate_ids_inside_input_rejected() {
        let mut store = store_with_point();
        let err = store
            .tweak(json!([
                {"$modelType": "Point", "$modelId": "same"},
                {"$modelType": "Point", "$modelId": "same"}
            ]))
            .unwrap_err();
        assert!(matches!(err, ArborError::DuplicateId { .. }));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_failed_model_releases_borrowed_child() {
        let mut store = store_with_point();
        let child = store.tweak(json!({"k": 1})).unwrap();
        let err = store
            .create_model("Point", Props::new().set("x", child.clone()).set("nope", 1))
            .unwrap_err();
        assert!(matches!(err, ArborError::UnknownProp { .. }));
        let child = child.as_node().unwrap();
        assert!(store.contains(child));
        assert_eq!(store.get_parent(child).unwrap(), None);
    }

    #[test]
    fn test_failed_on_init_leaves_nothing_behind() {
        let registry = Registry::new();
        registry
            .register(
                ModelClass::builder("Strict")
                    .prop("child", PropDef::new())
                    .on_init(|_, _| Err(ArborError::action_failed("onInit", "refused")))
                    .build(),
            )
            .unwrap();
        let mut store = Store::with_registry(Rc::new(registry));
        let borrowed = store.tweak(json!({"k": 1})).unwrap().as_node().unwrap();
        let before = store.node_count();

        let err = store
            .create_model("Strict", Props::new().set("child", borrowed))
            .unwrap_err();

        assert!(matches!(err, ArborError::ActionFailed { .. }));
        assert_eq!(store.node_count(), before);
        assert_eq!(store.get_parent(borrowed).unwrap(), None);
    }

    #[test]
    fn test_model_id_rejected_for_class_without_id() {
        let registry = Registry::new();
        registry
            .register(ModelClass::builder("Pixel").without_id().build())
            .unwrap();
        let mut store = Store::with_registry(Rc::new(registry));

        let given = store
            .create_model("Pixel", Props::new().with_model_id("px-1"))
            .unwrap_err();
        let from_json = store
            .tweak(json!({"$modelType": "Pixel", "$modelId": "px-1"}))
            .unwrap_err();

        assert!(matches!(given, ArborError::InvalidSnapshot { .. }));
        assert!(matches!(from_json, ArborError::InvalidSnapshot { .. }));
        assert_eq!(store.node_count(), 0);
        let pixel = store.create_model("Pixel", Props::new()).unwrap();
        assert_eq!(store.model_id(pixel).unwrap(), None);
    }

    #[test]
    fn test_frozen_json_is_opaque() {
        let mut store = store_with_point();
        let node = store
            .tweak(json!({"$frozen": true, "data": {"deep": [1, 2]}}))
            .unwrap()
            .as_node()
            .unwrap();
        assert_eq!(store.kind(node).unwrap(), NodeKind::Frozen);
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.frozen_data(node).unwrap(), json!({"deep": [1, 2]}));
    }
}
