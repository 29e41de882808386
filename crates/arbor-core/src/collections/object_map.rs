//! `arbor/ObjectMap`: a string-keyed map model.

use super::{items_node, string_arg, ITEMS_PROP, OBJECT_MAP_TYPE};
use crate::errors::Result;
use crate::model::{ModelClass, PropDef};
use crate::ops::{Props, Store};
use crate::value::{Input, NodeId, Value};

pub fn object_map_class() -> ModelClass {
    ModelClass::builder(OBJECT_MAP_TYPE)
        .prop(ITEMS_PROP, PropDef::with_default_fn(|| serde_json::json!({})))
        .action("set", |store, map, args| {
            let key = string_arg(args, 0, "set")?;
            let value = args.get(1).cloned().unwrap_or(Value::Null);
            let items = items_node(store, map, OBJECT_MAP_TYPE)?;
            store.set(items, key, value)?;
            Ok(Value::Null)
        })
        .action("delete", |store, map, args| {
            let key = string_arg(args, 0, "delete")?;
            let items = items_node(store, map, OBJECT_MAP_TYPE)?;
            Ok(Value::Bool(store.delete(items, key)?.is_some()))
        })
        .action("clear", |store, map, _| {
            let items = items_node(store, map, OBJECT_MAP_TYPE)?;
            for key in store.keys(items)? {
                store.delete(items, key)?;
            }
            Ok(Value::Null)
        })
        .build()
}

impl Store {
    /// Create a detached object map holding `entries` (a JSON object).
    ///
    /// # Errors
    ///
    /// Creation errors of the entry values.
    pub fn create_object_map(&mut self, entries: serde_json::Value) -> Result<NodeId> {
        self.create_model(OBJECT_MAP_TYPE, Props::new().set(ITEMS_PROP, entries))
    }

    /// # Errors
    ///
    /// `WrongNodeKind` when `map` is not an object map.
    pub fn object_map_get(&self, map: NodeId, key: &str) -> Result<Option<Value>> {
        let items = items_node(self, map, OBJECT_MAP_TYPE)?;
        if !self.has(items, key)? {
            return Ok(None);
        }
        self.get(items, key).map(Some)
    }

    /// # Errors
    ///
    /// `WrongNodeKind` when `map` is not an object map.
    pub fn object_map_has(&self, map: NodeId, key: &str) -> Result<bool> {
        self.has(items_node(self, map, OBJECT_MAP_TYPE)?, key)
    }

    /// # Errors
    ///
    /// `WrongNodeKind` when `map` is not an object map.
    pub fn object_map_keys(&self, map: NodeId) -> Result<Vec<String>> {
        self.keys(items_node(self, map, OBJECT_MAP_TYPE)?)
    }

    /// Set `key` through the map's `set` action.
    ///
    /// # Errors
    ///
    /// Errors of the `set` action and of tweaking `value`.
    pub fn object_map_set(&mut self, map: NodeId, key: &str, value: impl Into<Input>) -> Result<()> {
        self.call_with_input(map, "set", vec![Value::from(key)], value.into())
            .map(|_| ())
    }

    /// Remove `key`; returns whether it was present.
    ///
    /// # Errors
    ///
    /// Errors of the `delete` action.
    pub fn object_map_delete(&mut self, map: NodeId, key: &str) -> Result<bool> {
        let removed = self.call_action(map, "delete", vec![Value::from(key)])?;
        Ok(removed.as_bool().unwrap_or(false))
    }

    /// # Errors
    ///
    /// Errors of the `clear` action.
    pub fn object_map_clear(&mut self, map: NodeId) -> Result<()> {
        self.call_action(map, "clear", Vec::new()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::errors::ArborError;
    use crate::registry::Registry;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn test_map_operations() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let map = store.create_object_map(json!({"a": 1})).unwrap();

        store.object_map_set(map, "b", json!({"nested": true})).unwrap();
        assert_eq!(store.object_map_keys(map).unwrap(), ["a", "b"]);
        assert!(store.object_map_get(map, "b").unwrap().unwrap().is_node());
        assert_eq!(store.object_map_get(map, "zz").unwrap(), None);

        assert!(store.object_map_delete(map, "a").unwrap());
        assert!(!store.object_map_delete(map, "a").unwrap());
        assert!(!store.object_map_has(map, "a").unwrap());

        store.object_map_clear(map).unwrap();
        assert!(store.object_map_keys(map).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_shape() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let map = store.create_object_map(json!({"k": "v"})).unwrap();
        let snapshot = store.get_snapshot_json(map).unwrap();

        assert_eq!(snapshot["$modelType"], json!(OBJECT_MAP_TYPE));
        assert!(snapshot["$modelId"].is_string());
        assert_eq!(snapshot["items"], json!({"k": "v"}));
    }

    #[test]
    fn test_failed_set_discards_new_node() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let map = store.create_object_map(json!({})).unwrap();
        store
            .add_middleware(
                map,
                crate::action::middleware_fn(|_, ctx, _| {
                    Err(ArborError::action_failed(ctx.action_name(), "read only"))
                }),
            )
            .unwrap();
        let before = store.node_count();

        let err = store.object_map_set(map, "x", json!([1, 2])).unwrap_err();
        assert!(matches!(err, ArborError::ActionFailed { .. }));
        assert_eq!(store.node_count(), before);
    }

    #[test]
    fn test_not_a_map() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let set = store.create_array_set(json!([])).unwrap();
        assert!(matches!(
            store.object_map_keys(set),
            Err(ArborError::WrongNodeKind { .. })
        ));
    }
}
