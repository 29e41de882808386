//! Node handles, path segments and the values stored inside tree nodes.
//!
//! A tree slot holds either a primitive (null, boolean, number, string) or a
//! handle to another tree node owned by the [`Store`](crate::Store). Plain
//! data handed to the store for the first time travels as an [`Input`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a tree node owned by a [`Store`](crate::Store).
///
/// Handles are cheap to copy. Equality is node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Raw numeric value of the handle
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// One step of a path: an object key / model prop name, or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// Interpret the segment as an array index.
    ///
    /// Numeric string keys (as found in JSON-pointer style paths) are accepted.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(k) => k.parse().ok(),
        }
    }

    /// Interpret the segment as an object key.
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Index(i) => i.to_string(),
            PathSegment::Key(k) => k.clone(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Key(k) => write!(f, "{}", k),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<&String> for PathSegment {
    fn from(key: &String) -> Self {
        PathSegment::Key(key.clone())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A sequence of path segments, read from some root towards a descendant.
pub type Path = Vec<PathSegment>;

/// Render a path as a JSON-pointer-like string (`/todos/0/done`).
pub fn path_to_pointer(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for seg in path {
        out.push('/');
        out.push_str(&seg.as_key().replace('~', "~0").replace('/', "~1"));
    }
    out
}

/// A value held in a tree slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Node(NodeId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// JSON form of a primitive. Node handles have no JSON form without a store.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::Null => Some(serde_json::Value::Null),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Number(n) => Some(serde_json::Value::Number(n.clone())),
            Value::String(s) => Some(serde_json::Value::String(s.clone())),
            Value::Node(_) => None,
        }
    }

    /// Primitive value from JSON. Containers return `None`.
    pub fn from_json_primitive(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => Some(Value::Number(n.clone())),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Node(id) => write!(f, "{}", id),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(serde_json::Number::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(serde_json::Number::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(serde_json::Number::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(serde_json::Number::from(n))
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// Data handed to the store for placement into the tree.
///
/// `Json` inputs are converted ("tweaked") into fresh tree nodes. `Value`
/// inputs are placed as-is: primitives by value, nodes by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Value(Value),
    Json(serde_json::Value),
}

impl From<Value> for Input {
    fn from(v: Value) -> Self {
        Input::Value(v)
    }
}

impl From<NodeId> for Input {
    fn from(id: NodeId) -> Self {
        Input::Value(Value::Node(id))
    }
}

impl From<serde_json::Value> for Input {
    fn from(json: serde_json::Value) -> Self {
        Input::Json(json)
    }
}

impl From<bool> for Input {
    fn from(b: bool) -> Self {
        Input::Value(b.into())
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Value(s.into())
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::Value(s.into())
    }
}

impl From<i32> for Input {
    fn from(n: i32) -> Self {
        Input::Value(n.into())
    }
}

impl From<i64> for Input {
    fn from(n: i64) -> Self {
        Input::Value(n.into())
    }
}

impl From<f64> for Input {
    fn from(n: f64) -> Self {
        Input::Value(n.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segment_untagged_serde() {
        let path: Path = vec!["todos".into(), 0.into(), "done".into()];
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!(["todos", 0, "done"]));

        let back: Path = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_segment_index_from_numeric_key() {
        assert_eq!(PathSegment::from("3").as_index(), Some(3));
        assert_eq!(PathSegment::from("x").as_index(), None);
        assert_eq!(PathSegment::Index(7).as_key(), "7");
    }

    #[test]
    fn test_path_to_pointer_escapes() {
        let path: Path = vec!["a/b".into(), "c~d".into(), 2.into()];
        assert_eq!(path_to_pointer(&path), "/a~1b/c~0d/2");
        assert_eq!(path_to_pointer(&[]), "");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(1234), Value::from(1234i64));
        assert_eq!(Value::from(f64::NAN), Value::Null);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(
            Value::from_json_primitive(&serde_json::json!(true)),
            Some(Value::Bool(true))
        );
        assert_eq!(Value::from_json_primitive(&serde_json::json!([1])), None);
    }
}
