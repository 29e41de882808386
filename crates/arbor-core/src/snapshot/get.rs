use crate::errors::Result;
use crate::ops::store::{NodeData, Store};
use crate::snapshot::{Snapshot, SnapshotMap, FROZEN_KEY, MODEL_ID_KEY, MODEL_TYPE_KEY};
use crate::value::{NodeId, Value};
use std::rc::Rc;

impl Store {
    /// Snapshot of a node, from cache when the subtree is unchanged.
    ///
    /// Model snapshots pass their props through the class's `to_snapshot`
    /// processor before the `$modelType`/`$modelId` keys are added.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn get_snapshot(&self, node: NodeId) -> Result<Snapshot> {
        let entry = self.node(node)?;
        if let Some(cached) = entry.snapshot.borrow().as_ref() {
            return Ok(cached.clone());
        }

        let snapshot = match &entry.data {
            NodeData::Object(map) => {
                let mut out = SnapshotMap::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.value_snapshot(value)?);
                }
                Snapshot::object(out)
            }
            NodeData::Array(items) => Snapshot::array(
                items
                    .iter()
                    .map(|value| self.value_snapshot(value))
                    .collect::<Result<Vec<_>>>()?,
            ),
            NodeData::Model(model) => {
                let mut props = SnapshotMap::with_capacity(model.props.len());
                for (key, value) in &model.props {
                    props.insert(key.clone(), self.value_snapshot(value)?);
                }
                if let Some(process) = &model.class.to_snapshot {
                    props = process(props);
                }
                let mut out = SnapshotMap::with_capacity(props.len() + 2);
                out.insert(
                    MODEL_TYPE_KEY.to_string(),
                    Snapshot::String(Rc::from(model.class.name.as_str())),
                );
                if let Some(id) = &model.id {
                    out.insert(MODEL_ID_KEY.to_string(), Snapshot::String(Rc::from(id.as_str())));
                }
                out.extend(props);
                Snapshot::object(out)
            }
            NodeData::Frozen(data) => {
                let mut out = SnapshotMap::with_capacity(2);
                out.insert(FROZEN_KEY.to_string(), Snapshot::Bool(true));
                out.insert("data".to_string(), data.clone());
                Snapshot::object(out)
            }
        };

        *entry.snapshot.borrow_mut() = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Snapshot of a node as JSON
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn get_snapshot_json(&self, node: NodeId) -> Result<serde_json::Value> {
        Ok(self.get_snapshot(node)?.to_json())
    }

    /// Snapshot of any slot value; primitives map to themselves.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for a dangling node handle.
    pub fn value_snapshot(&self, value: &Value) -> Result<Snapshot> {
        Ok(match value {
            Value::Null => Snapshot::Null,
            Value::Bool(b) => Snapshot::Bool(*b),
            Value::Number(n) => Snapshot::Number(n.clone()),
            Value::String(s) => Snapshot::String(Rc::from(s.as_str())),
            Value::Node(id) => self.get_snapshot(*id)?,
        })
    }

    pub(crate) fn value_json(&self, value: &Value) -> Result<serde_json::Value> {
        match value.to_json() {
            Some(json) => Ok(json),
            None => Ok(self.value_snapshot(value)?.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::model::ModelClass;
    use crate::registry::Registry;
    use crate::PropDef;
    use serde_json::json;

    #[test]
    fn test_unchanged_subtrees_are_shared() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store
            .tweak(json!({"left": {"n": 1}, "right": {"n": 2}}))
            .unwrap()
            .as_node()
            .unwrap();
        let right = store.get(root, "right").unwrap().as_node().unwrap();

        let before = store.get_snapshot(root).unwrap();
        assert!(Snapshot::ptr_eq(&before, &store.get_snapshot(root).unwrap()));

        store
            .run_in_action(root, "bump", |s| {
                s.set(right, "n", 3)?;
                Ok(Value::Null)
            })
            .unwrap();

        let after = store.get_snapshot(root).unwrap();
        assert!(!Snapshot::ptr_eq(&before, &after));
        assert!(Snapshot::ptr_eq(before.get("left").unwrap(), after.get("left").unwrap()));
        assert!(!Snapshot::ptr_eq(before.get("right").unwrap(), after.get("right").unwrap()));
        assert_eq!(after, json!({"left": {"n": 1}, "right": {"n": 3}}));
    }

    #[test]
    fn test_model_snapshot_shape_and_processor() {
        let registry = Registry::new();
        registry
            .register(
                ModelClass::builder("Tagged")
                    .prop("tags", PropDef::with_default(json!(["a", "b"])))
                    .to_snapshot(|mut props| {
                        let joined = props
                            .get("tags")
                            .and_then(Snapshot::as_array)
                            .map(|tags| {
                                tags.iter()
                                    .filter_map(Snapshot::as_str)
                                    .collect::<Vec<_>>()
                                    .join(",")
                            })
                            .unwrap_or_default();
                        props.insert("tags".to_string(), Snapshot::String(Rc::from(joined.as_str())));
                        props
                    })
                    .build(),
            )
            .unwrap();
        let mut store = Store::with_registry(Rc::new(registry));
        let node = store
            .create_model("Tagged", crate::Props::new().with_model_id("t1"))
            .unwrap();

        assert_eq!(
            store.get_snapshot_json(node).unwrap(),
            json!({"$modelType": "Tagged", "$modelId": "t1", "tags": "a,b"})
        );
    }

    #[test]
    fn test_frozen_snapshot() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let node = store.frozen(json!({"x": [1]}));
        assert_eq!(
            store.get_snapshot_json(node).unwrap(),
            json!({"$frozen": true, "data": {"x": [1]}})
        );
    }
}
