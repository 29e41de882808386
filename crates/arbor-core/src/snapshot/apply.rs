//! Reconciling a live subtree with a snapshot.
//!
//! Node identity survives wherever the snapshot still describes the same
//! thing: objects stay objects, arrays stay arrays, and models stay the same
//! instance while their type and id match. Array elements that are
//! id-bearing models are matched by id, so reordering moves nodes instead of
//! recreating them. Everything else is replaced by freshly created nodes.

use crate::action::BUILTIN_APPLY_SNAPSHOT;
use crate::errors::{ArborError, Result};
use crate::ops::store::{NodeData, Store};
use crate::snapshot::{Snapshot, FROZEN_KEY, MODEL_ID_KEY, MODEL_TYPE_KEY};
use crate::value::{Input, NodeId, PathSegment, Value};
use serde_json::Map;
use std::collections::{HashMap, HashSet};

type JsonMap = Map<String, serde_json::Value>;

fn model_key(json: &serde_json::Value) -> Option<(&str, Option<&str>)> {
    let map = json.as_object()?;
    let model_type = map.get(MODEL_TYPE_KEY)?.as_str()?;
    Some((model_type, map.get(MODEL_ID_KEY).and_then(serde_json::Value::as_str)))
}

fn is_frozen(json: &serde_json::Value) -> bool {
    json.get(FROZEN_KEY).and_then(serde_json::Value::as_bool) == Some(true)
}

impl Store {
    /// Make the subtree at `node` match `snapshot`, in place.
    ///
    /// Runs as the built-in `$$applySnapshot` action and emits patches for
    /// every slot it changes. With auto type checking on, types are checked
    /// once the whole snapshot is applied: a model root against its own
    /// props, any other node against the prop of the nearest model above it.
    ///
    /// # Errors
    /// * `InvalidSnapshot` - If the snapshot describes a different kind of
    ///   node, or a model of another type or id
    /// * `UnknownProp`, `DuplicateId`, `TypeCheck` - From the slot writes
    pub fn apply_snapshot(&mut self, node: NodeId, snapshot: &serde_json::Value) -> Result<()> {
        self.node(node)?;
        if !self.can_reconcile(node, snapshot)? {
            return Err(ArborError::InvalidSnapshot {
                reason: format!(
                    "snapshot does not describe {} ({})",
                    node,
                    self.kind(node)?.as_str()
                ),
            });
        }
        let snapshot = snapshot.clone();
        self.run_builtin(node, BUILTIN_APPLY_SNAPSHOT, Vec::new(), move |store| {
            store.with_deferred_type_checks(|store| store.reconcile_node(node, &snapshot))?;
            if store.is_model(node) && store.config.type_checking_enabled() {
                store.type_check(node)?;
            }
            store.check_enclosing_types(node)?;
            Ok(Value::Null)
        })
        .map(|_| ())
    }

    /// Whether `node` may be kept and reconciled against `json`
    pub(crate) fn can_reconcile(&self, node: NodeId, json: &serde_json::Value) -> Result<bool> {
        Ok(match (&self.node(node)?.data, json) {
            (NodeData::Array(_), serde_json::Value::Array(_)) => true,
            (NodeData::Frozen(data), json) if is_frozen(json) => {
                let incoming = json.get("data").cloned().unwrap_or(serde_json::Value::Null);
                *data == Snapshot::from_json(&incoming)
            }
            (NodeData::Model(model), json) => match model_key(json) {
                Some((model_type, id)) => {
                    model_type == model.class.name && id == model.id.as_deref()
                }
                None => false,
            },
            (NodeData::Object(_), serde_json::Value::Object(map)) => {
                !map.contains_key(MODEL_TYPE_KEY) && !is_frozen(json)
            }
            _ => false,
        })
    }

    pub(crate) fn reconcile_node(&mut self, node: NodeId, json: &serde_json::Value) -> Result<()> {
        match self.kind(node)? {
            crate::NodeKind::Object => match json {
                serde_json::Value::Object(map) => self.reconcile_object(node, map),
                _ => Err(mismatch(node, "object")),
            },
            crate::NodeKind::Array => match json {
                serde_json::Value::Array(items) => self.reconcile_array(node, items),
                _ => Err(mismatch(node, "array")),
            },
            crate::NodeKind::Model => match json {
                serde_json::Value::Object(map) => self.reconcile_model(node, map),
                _ => Err(mismatch(node, "model")),
            },
            // Equal frozen data; frozen nodes never change in place.
            crate::NodeKind::Frozen => Ok(()),
        }
    }

    fn reconcile_object(&mut self, node: NodeId, map: &JsonMap) -> Result<()> {
        let stale: Vec<String> = self
            .keys(node)?
            .into_iter()
            .filter(|key| !map.contains_key(key))
            .collect();
        for key in stale {
            self.delete_slot(node, PathSegment::Key(key))?;
        }
        for (key, json) in map {
            self.reconcile_slot(node, PathSegment::from(key), json)?;
        }
        Ok(())
    }

    fn reconcile_model(&mut self, node: NodeId, map: &JsonMap) -> Result<()> {
        let class = self.model_class(node)?;
        let map = match &class.from_snapshot {
            Some(process) => process(map.clone()),
            None => map.clone(),
        };
        if let Some(unknown) = map
            .keys()
            .find(|key| *key != MODEL_TYPE_KEY && *key != MODEL_ID_KEY && class.prop(key).is_none())
        {
            return Err(ArborError::UnknownProp {
                model_type: class.name.clone(),
                prop: unknown.clone(),
            });
        }
        for (name, def) in class.props.iter() {
            let json = match (map.get(name), &def.default) {
                (Some(json), _) => json.clone(),
                (None, Some(default)) => match default.to_input() {
                    Input::Json(json) => json,
                    Input::Value(value) => value.to_json().unwrap_or(serde_json::Value::Null),
                },
                (None, None) => serde_json::Value::Null,
            };
            self.reconcile_slot(node, PathSegment::from(name), &json)?;
        }
        Ok(())
    }

    pub(crate) fn reconcile_slot(
        &mut self,
        container: NodeId,
        key: PathSegment,
        json: &serde_json::Value,
    ) -> Result<()> {
        if let Value::Node(child) = self.get(container, key.clone())? {
            if self.can_reconcile(child, json)? {
                return self.reconcile_node(child, json);
            }
        }
        // Equal primitives are a no-op inside set_slot.
        self.set_slot(container, key, Input::Json(json.clone()), true)
    }

    fn reconcile_array(&mut self, node: NodeId, items: &[serde_json::Value]) -> Result<()> {
        let current = self.values(node)?;

        let mut by_id: HashMap<(String, String), NodeId> = HashMap::new();
        for child in current.iter().filter_map(Value::as_node) {
            if let Ok(model) = self.model_data(child) {
                if let Some(id) = &model.id {
                    by_id.insert((model.class.name.clone(), id.clone()), child);
                }
            }
        }

        // Pick which existing child, if any, each incoming item reuses.
        let mut used = HashSet::new();
        let mut reuse: Vec<Option<NodeId>> = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let candidate = match model_key(item) {
                Some((model_type, Some(id))) => by_id
                    .get(&(model_type.to_string(), id.to_string()))
                    .copied(),
                _ => current
                    .get(index)
                    .and_then(Value::as_node)
                    .filter(|child| !self.model_data(*child).is_ok_and(|m| m.id.is_some())),
            };
            let candidate = match candidate {
                Some(child) if !used.contains(&child) && self.can_reconcile(child, item)? => {
                    used.insert(child);
                    Some(child)
                }
                _ => None,
            };
            reuse.push(candidate);
        }

        for (item, child) in items.iter().zip(&reuse) {
            if let Some(child) = child {
                self.reconcile_node(*child, item)?;
            }
        }

        let desired: Vec<Option<Value>> = items
            .iter()
            .zip(&reuse)
            .map(|(item, child)| match child {
                Some(child) => Some(Value::Node(*child)),
                None => Value::from_json_primitive(item),
            })
            .collect();

        let prefix = desired
            .iter()
            .zip(&current)
            .take_while(|(want, have)| want.as_ref() == Some(*have))
            .count();
        let max_suffix = desired.len().min(current.len()) - prefix;
        let suffix = desired
            .iter()
            .rev()
            .zip(current.iter().rev())
            .take(max_suffix)
            .take_while(|(want, have)| want.as_ref() == Some(*have))
            .count();
        if prefix == current.len() && prefix == desired.len() {
            return Ok(());
        }

        let delete_count = current.len() - prefix - suffix;
        let inserts: Vec<Input> = items[prefix..items.len() - suffix]
            .iter()
            .zip(&desired[prefix..desired.len() - suffix])
            .map(|(item, want)| match want {
                Some(value) => Input::Value(value.clone()),
                None => Input::Json(item.clone()),
            })
            .collect();
        self.splice_slots(node, prefix, delete_count, inserts)?;
        Ok(())
    }
}

fn mismatch(node: NodeId, expected: &str) -> ArborError {
    ArborError::InvalidSnapshot {
        reason: format!("{} cannot be reconciled with a non-{} snapshot", node, expected),
    }
}
