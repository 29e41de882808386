//! Replaying patches onto a live tree.
//!
//! Patches are resolved against the tree as it is when each one is applied.
//! A patch that does not fit the tree fails with `ArborError::Patch`; the
//! patches applied before it stay applied.

use crate::action::BUILTIN_APPLY_PATCHES;
use crate::errors::{ArborError, Result};
use crate::ops::store::Store;
use crate::ops::NodeKind;
use crate::patch::Patch;
use crate::value::{Input, NodeId, PathSegment, Value};

fn patch_error(patch: &Patch, reason: impl Into<String>) -> ArborError {
    ArborError::Patch {
        path: patch.pointer(),
        reason: reason.into(),
    }
}

impl Store {
    /// Apply patches to the subtree at `node` as the `$$applyPatches` action.
    ///
    /// With `reverse` the list is applied last to first, which is how the
    /// inverse patches of an event undo it.
    ///
    /// # Errors
    ///
    /// `Patch` when a path does not resolve to a container, a key or index
    /// is missing, or the op does not fit the container. Slot write errors
    /// (`Hierarchy`, `DuplicateId`, `TypeCheck`) pass through.
    pub fn apply_patches(&mut self, node: NodeId, patches: &[Patch], reverse: bool) -> Result<()> {
        self.node(node)?;
        let mut ordered: Vec<Patch> = patches.to_vec();
        if reverse {
            ordered.reverse();
        }
        let count = ordered.len();
        self.run_builtin(node, BUILTIN_APPLY_PATCHES, Vec::new(), move |store| {
            for patch in &ordered {
                store.apply_patch(node, patch)?;
            }
            Ok(Value::Null)
        })?;
        tracing::debug!(node = %node, patches = count, reverse, "applied patches");
        Ok(())
    }

    fn apply_patch(&mut self, node: NodeId, patch: &Patch) -> Result<()> {
        let Some((last, parents)) = patch.path().split_last() else {
            return match patch {
                Patch::Replace { value, .. } if self.can_reconcile(node, value)? => {
                    self.reconcile_node(node, value)
                }
                _ => Err(patch_error(patch, "cannot apply to the subtree root itself")),
            };
        };
        let container = match self.resolve_path(node, parents)? {
            Some(Value::Node(container)) => container,
            Some(_) => return Err(patch_error(patch, "parent path leads to a primitive")),
            None => return Err(patch_error(patch, "parent path does not resolve")),
        };
        let kind = self.kind(container)?;
        let len = self.len(container).unwrap_or(0);

        match (patch, kind) {
            (_, NodeKind::Frozen) => Err(patch_error(patch, "frozen data cannot be patched")),

            (Patch::Add { value, .. }, NodeKind::Array) => {
                let index = array_index(patch, last, len + 1)?;
                self.splice_slots(container, index, 0, vec![Input::Json(value.clone())])
                    .map(|_| ())
            }
            (Patch::Add { value, .. }, _) => {
                self.set_slot(container, last.clone(), Input::Json(value.clone()), true)
            }

            (Patch::Remove { .. }, NodeKind::Array) => {
                let index = array_index(patch, last, len)?;
                self.splice_slots(container, index, 1, Vec::new()).map(|_| ())
            }
            (Patch::Remove { .. }, NodeKind::Object) => {
                match self.delete_slot(container, last.clone())? {
                    Some(_) => Ok(()),
                    None => Err(patch_error(patch, "key does not exist")),
                }
            }
            (Patch::Remove { .. }, NodeKind::Model) => {
                Err(patch_error(patch, "model props cannot be removed"))
            }

            (Patch::Replace { value, .. }, NodeKind::Array) => {
                let index = array_index(patch, last, len)?;
                self.reconcile_slot(container, PathSegment::Index(index), value)
            }
            (Patch::Replace { value, .. }, _) => {
                if !self.has(container, last.clone())? {
                    return Err(patch_error(patch, "key does not exist"));
                }
                self.reconcile_slot(container, last.clone(), value)
            }
        }
    }
}

/// Index named by `segment`, which must be below `bound`
fn array_index(patch: &Patch, segment: &PathSegment, bound: usize) -> Result<usize> {
    segment
        .as_index()
        .filter(|index| *index < bound)
        .ok_or_else(|| patch_error(patch, format!("'{}' is not a valid index here", segment)))
}
