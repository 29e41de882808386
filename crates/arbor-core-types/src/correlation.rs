//! Correlation types for action tracking
//!
//! Every action invocation gets a `CallId`; every flow action gets a `FlowId`
//! that stays stable across all of its suspended segments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single action invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    /// Generate a new CallId using UUIDv7 (time-ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a running flow action
///
/// Flow ids are handed out by the store when a flow is spawned and are used
/// by schedulers to resume the flow later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(String);

impl FlowId {
    /// Generate a new FlowId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_generation() {
        let id1 = CallId::new();
        let id2 = CallId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_call_ids_are_time_ordered() {
        let first = CallId::new();
        let second = CallId::new();
        assert!(first < second);
    }

    #[test]
    fn test_call_id_display() {
        let id = CallId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_flow_id_generation() {
        let id1 = FlowId::new();
        let id2 = FlowId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_serialization() {
        let id = FlowId::from_string("flow-1".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"flow-1\"");
        let deserialized: FlowId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
