//! Snapshot digests.
//!
//! A digest is the hex-encoded SHA256 of the snapshot's JSON serialization.
//! Key order is part of the serialization, so two snapshots with the same
//! content in a different key order have different digests.

use crate::errors::Result;
use crate::ops::Store;
use crate::snapshot::Snapshot;
use crate::value::NodeId;
use sha2::{Digest, Sha256};

/// Digest of a snapshot.
///
/// ## Errors
///
/// Returns `ArborError::Serialization` if JSON serialization fails.
///
/// ## Example
///
/// ```
/// use arbor_core::snapshot::{snapshot_digest, Snapshot};
///
/// let snapshot = Snapshot::from_json(&serde_json::json!({"a": 1}));
/// assert_eq!(snapshot_digest(&snapshot).unwrap().len(), 64);
/// ```
pub fn snapshot_digest(snapshot: &Snapshot) -> Result<String> {
    let canonical = serde_json::to_string(snapshot)?;
    Ok(hash_string(&canonical))
}

/// Digest of snapshot JSON; equal to [`snapshot_digest`] of the same data
///
/// ## Errors
///
/// Returns `ArborError::Serialization` if JSON serialization fails.
pub fn json_digest(json: &serde_json::Value) -> Result<String> {
    let canonical = serde_json::to_string(json)?;
    Ok(hash_string(&canonical))
}

fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

impl Store {
    /// Digest of a node's current snapshot
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn snapshot_digest(&self, node: NodeId) -> Result<String> {
        snapshot_digest(&self.get_snapshot(node)?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::registry::Registry;
    use crate::Value;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn test_digest_is_deterministic() {
        let a = Snapshot::from_json(&json!({"x": [1, 2], "y": "z"}));
        let b = Snapshot::from_json(&json!({"x": [1, 2], "y": "z"}));
        assert_eq!(snapshot_digest(&a).unwrap(), snapshot_digest(&b).unwrap());
        assert_eq!(
            snapshot_digest(&a).unwrap(),
            json_digest(&json!({"x": [1, 2], "y": "z"})).unwrap()
        );
    }

    #[test]
    fn test_digest_is_order_sensitive() {
        let a = Snapshot::from_json(&json!({"x": 1, "y": 2}));
        let b = Snapshot::from_json(&json!({"y": 2, "x": 1}));
        assert_ne!(snapshot_digest(&a).unwrap(), snapshot_digest(&b).unwrap());
    }

    #[test]
    fn test_store_digest_tracks_changes() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store.tweak(json!({"n": 1})).unwrap().as_node().unwrap();
        let before = store.snapshot_digest(root).unwrap();
        store
            .run_in_action(root, "bump", |s| {
                s.set(root, "n", 2)?;
                Ok(Value::Null)
            })
            .unwrap();
        assert_ne!(before, store.snapshot_digest(root).unwrap());
    }
}
