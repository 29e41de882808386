use crate::errors::{ArborError, Result};
use crate::ops::store::Store;
use crate::ops::tweak::IdMode;
use crate::value::{NodeId, Value};

impl Store {
    /// Build a detached tree from snapshot JSON.
    ///
    /// Models keep the `$modelId` found in the snapshot and pass their
    /// props through the class's `from_snapshot` processor.
    ///
    /// # Errors
    ///
    /// `InvalidSnapshot` for a primitive snapshot, plus every creation error
    /// of [`Store::tweak`].
    pub fn from_snapshot(&mut self, snapshot: &serde_json::Value) -> Result<NodeId> {
        match self.create_from_json(snapshot, IdMode::Keep)? {
            Value::Node(node) => Ok(node),
            other => Err(ArborError::InvalidSnapshot {
                reason: format!("expected an object or array snapshot, got {}", other),
            }),
        }
    }

    /// Deep copy of a subtree as a new detached tree.
    ///
    /// With `new_ids` every copied model gets a fresh id, so the copy can be
    /// attached next to the original.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn clone_node(&mut self, node: NodeId, new_ids: bool) -> Result<NodeId> {
        let snapshot = self.get_snapshot_json(node)?;
        let mode = if new_ids {
            IdMode::Regenerate
        } else {
            IdMode::Keep
        };
        match self.create_from_json(&snapshot, mode)? {
            Value::Node(copy) => {
                tracing::debug!(source = %node, copy = %copy, new_ids, "cloned subtree");
                Ok(copy)
            }
            other => Err(ArborError::Internal {
                message: format!("snapshot of {} produced a primitive ({})", node, other),
            }),
        }
    }
}
