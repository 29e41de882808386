//! `arbor/ArraySet`: an insertion-ordered set model.
//!
//! Primitives are compared by value, nodes by identity.

use super::{items_node, ARRAY_SET_TYPE, ITEMS_PROP};
use crate::errors::Result;
use crate::model::{ModelClass, PropDef};
use crate::ops::{Props, Store};
use crate::value::{Input, NodeId, Value};

pub fn array_set_class() -> ModelClass {
    ModelClass::builder(ARRAY_SET_TYPE)
        .prop(ITEMS_PROP, PropDef::with_default_fn(|| serde_json::json!([])))
        .action("add", |store, set, args| {
            let value = args.first().cloned().unwrap_or(Value::Null);
            let items = items_node(store, set, ARRAY_SET_TYPE)?;
            if store.values(items)?.contains(&value) {
                return Ok(Value::Bool(false));
            }
            store.array_push(items, value)?;
            Ok(Value::Bool(true))
        })
        .action("delete", |store, set, args| {
            let value = args.first().cloned().unwrap_or(Value::Null);
            let items = items_node(store, set, ARRAY_SET_TYPE)?;
            match store.values(items)?.iter().position(|v| *v == value) {
                Some(index) => {
                    store.array_remove(items, index)?;
                    Ok(Value::Bool(true))
                }
                None => Ok(Value::Bool(false)),
            }
        })
        .action("clear", |store, set, _| {
            let items = items_node(store, set, ARRAY_SET_TYPE)?;
            store.array_clear(items)?;
            Ok(Value::Null)
        })
        .build()
}

impl Store {
    /// Create a detached array set from a JSON array.
    ///
    /// Items are taken as given; duplicates in `items` are not removed.
    ///
    /// # Errors
    ///
    /// Creation errors of the item values.
    pub fn create_array_set(&mut self, items: serde_json::Value) -> Result<NodeId> {
        self.create_model(ARRAY_SET_TYPE, Props::new().set(ITEMS_PROP, items))
    }

    /// # Errors
    ///
    /// `WrongNodeKind` when `set` is not an array set.
    pub fn array_set_values(&self, set: NodeId) -> Result<Vec<Value>> {
        self.values(items_node(self, set, ARRAY_SET_TYPE)?)
    }

    /// # Errors
    ///
    /// `WrongNodeKind` when `set` is not an array set.
    pub fn array_set_has(&self, set: NodeId, value: &Value) -> Result<bool> {
        Ok(self.array_set_values(set)?.contains(value))
    }

    /// Add a value; returns whether it was new.
    ///
    /// # Errors
    ///
    /// Errors of the `add` action and of tweaking `value`.
    pub fn array_set_add(&mut self, set: NodeId, value: impl Into<Input>) -> Result<bool> {
        let added = self.call_with_input(set, "add", Vec::new(), value.into())?;
        Ok(added.as_bool().unwrap_or(false))
    }

    /// Remove a value; returns whether it was present.
    ///
    /// # Errors
    ///
    /// Errors of the `delete` action.
    pub fn array_set_delete(&mut self, set: NodeId, value: impl Into<Value>) -> Result<bool> {
        let removed = self.call_action(set, "delete", vec![value.into()])?;
        Ok(removed.as_bool().unwrap_or(false))
    }

    /// # Errors
    ///
    /// Errors of the `clear` action.
    pub fn array_set_clear(&mut self, set: NodeId) -> Result<()> {
        self.call_action(set, "clear", Vec::new()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::registry::Registry;
    use crate::types;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn test_add_is_idempotent_for_primitives() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let set = store.create_array_set(json!(["a"])).unwrap();

        assert!(!store.array_set_add(set, "a").unwrap());
        assert!(store.array_set_add(set, "b").unwrap());
        assert_eq!(
            store.array_set_values(set).unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );

        assert!(store.array_set_delete(set, "a").unwrap());
        assert!(!store.array_set_has(set, &Value::from("a")).unwrap());
        store.array_set_clear(set).unwrap();
        assert!(store.array_set_values(set).unwrap().is_empty());
    }

    #[test]
    fn test_nodes_compare_by_identity() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let set = store.create_array_set(json!([])).unwrap();

        assert!(store.array_set_add(set, json!({"x": 1})).unwrap());
        assert!(store.array_set_add(set, json!({"x": 1})).unwrap());
        let first = store.array_set_values(set).unwrap()[0].clone();
        assert!(store.array_set_delete(set, first).unwrap());
        assert_eq!(store.array_set_values(set).unwrap().len(), 1);
    }

    #[test]
    fn test_set_of_type_checks_items() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let set = store.create_array_set(json!([1, "two"])).unwrap();
        let err = types::set_of(types::number())
            .check(&store, &Value::Node(set), &[])
            .unwrap();
        let expected: crate::Path = vec!["items".into(), 1.into()];
        assert_eq!(err.path, expected);
        assert_eq!(err.actual, json!("two"));
    }
}
