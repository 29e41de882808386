//! Immutable, structurally shared snapshot values.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::rc::Rc;

use super::{MODEL_ID_KEY, MODEL_TYPE_KEY};

/// Ordered key/value content of an object snapshot.
pub type SnapshotMap = IndexMap<String, Snapshot>;

/// Immutable plain-data image of a tree node.
///
/// Containers are reference counted: a subtree that did not change between
/// two snapshots is the same allocation in both, which [`Snapshot::ptr_eq`]
/// detects in constant time.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(Rc<str>),
    Array(Rc<Vec<Snapshot>>),
    Object(Rc<SnapshotMap>),
}

impl Snapshot {
    pub fn array(items: Vec<Snapshot>) -> Self {
        Snapshot::Array(Rc::new(items))
    }

    pub fn object(map: SnapshotMap) -> Self {
        Snapshot::Object(Rc::new(map))
    }

    /// Reference equality: same allocation for containers, equal value for primitives.
    pub fn ptr_eq(a: &Snapshot, b: &Snapshot) -> bool {
        match (a, b) {
            (Snapshot::Array(x), Snapshot::Array(y)) => Rc::ptr_eq(x, y),
            (Snapshot::Object(x), Snapshot::Object(y)) => Rc::ptr_eq(x, y),
            (Snapshot::Array(_), _) | (Snapshot::Object(_), _) => false,
            (_, Snapshot::Array(_)) | (_, Snapshot::Object(_)) => false,
            _ => a == b,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Snapshot::Null)
    }

    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        match self {
            Snapshot::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn at(&self, index: usize) -> Option<&Snapshot> {
        match self {
            Snapshot::Array(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&SnapshotMap> {
        match self {
            Snapshot::Object(map) => Some(map.as_ref()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Snapshot]> {
        match self {
            Snapshot::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Snapshot::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Snapshot::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Snapshot::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// `$modelType` of a model snapshot
    pub fn model_type(&self) -> Option<&str> {
        self.get(MODEL_TYPE_KEY).and_then(Snapshot::as_str)
    }

    /// `$modelId` of a model snapshot
    pub fn model_id(&self) -> Option<&str> {
        self.get(MODEL_ID_KEY).and_then(Snapshot::as_str)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Snapshot::Null => serde_json::Value::Null,
            Snapshot::Bool(b) => serde_json::Value::Bool(*b),
            Snapshot::Number(n) => serde_json::Value::Number(n.clone()),
            Snapshot::String(s) => serde_json::Value::String(s.to_string()),
            Snapshot::Array(items) => {
                serde_json::Value::Array(items.iter().map(Snapshot::to_json).collect())
            }
            Snapshot::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Snapshot::Null,
            serde_json::Value::Bool(b) => Snapshot::Bool(*b),
            serde_json::Value::Number(n) => Snapshot::Number(n.clone()),
            serde_json::Value::String(s) => Snapshot::String(Rc::from(s.as_str())),
            serde_json::Value::Array(items) => {
                Snapshot::array(items.iter().map(Snapshot::from_json).collect())
            }
            serde_json::Value::Object(map) => Snapshot::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Snapshot::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Snapshot::Null, Snapshot::Null) => true,
            (Snapshot::Bool(a), Snapshot::Bool(b)) => a == b,
            (Snapshot::Number(a), Snapshot::Number(b)) => a == b,
            (Snapshot::String(a), Snapshot::String(b)) => a == b,
            (Snapshot::Array(a), Snapshot::Array(b)) => Rc::ptr_eq(a, b) || a == b,
            // Key order is part of the snapshot's identity.
            (Snapshot::Object(a), Snapshot::Object(b)) => {
                Rc::ptr_eq(a, b) || (a.len() == b.len() && a.iter().eq(b.iter()))
            }
            _ => false,
        }
    }
}

impl PartialEq<serde_json::Value> for Snapshot {
    fn eq(&self, other: &serde_json::Value) -> bool {
        self.to_json() == *other
    }
}

impl From<&serde_json::Value> for Snapshot {
    fn from(json: &serde_json::Value) -> Self {
        Snapshot::from_json(json)
    }
}

impl From<serde_json::Value> for Snapshot {
    fn from(json: serde_json::Value) -> Self {
        Snapshot::from_json(&json)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Snapshot::Null => serializer.serialize_unit(),
            Snapshot::Bool(b) => serializer.serialize_bool(*b),
            Snapshot::Number(n) => n.serialize(serializer),
            Snapshot::String(s) => serializer.serialize_str(s),
            Snapshot::Array(items) => serializer.collect_seq(items.iter()),
            Snapshot::Object(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Snapshot::from_json(&json))
    }
}
