//! Root stores and model lifecycle hooks.

use crate::errors::{ArborError, Result};
use crate::model::HookFn;
use crate::ops::store::Store;
use crate::value::{NodeId, Value};
use crate::WalkOrder;

pub const HOOK_ON_INIT: &str = "$$onInit";
pub const HOOK_ON_ATTACHED_TO_ROOT_STORE: &str = "$$onAttachedToRootStore";
pub const HOOK_ON_DETACHED_FROM_ROOT_STORE: &str = "$$onDetachedFromRootStore";

impl Store {
    /// Mark a tree root as a root store.
    ///
    /// Every model in the tree receives `on_attached_to_root_store`, and so
    /// does every model attached to the tree later on.
    ///
    /// # Errors
    ///
    /// `Hierarchy` when `node` has a parent; errors raised by hooks.
    pub fn register_root_store(&mut self, node: NodeId) -> Result<()> {
        if let Some(link) = &self.node(node)?.parent {
            return Err(ArborError::Hierarchy {
                node,
                reason: format!("a root store must be a tree root (parent: {})", link.parent),
            });
        }
        if !self.root_stores.insert(node) {
            return Ok(());
        }
        tracing::debug!(root = %node, "registered root store");
        self.fire_attached_hooks(&[node])
    }

    /// Unmark a root store, firing `on_detached_from_root_store` for its models.
    ///
    /// # Errors
    ///
    /// Errors raised by hooks.
    pub fn unregister_root_store(&mut self, node: NodeId) -> Result<()> {
        if !self.root_stores.remove(&node) {
            return Ok(());
        }
        tracing::debug!(root = %node, "unregistered root store");
        self.fire_detached_hooks(&[node])
    }

    pub fn is_root_store(&self, node: NodeId) -> bool {
        self.root_stores.contains(&node)
    }

    /// The root store the node currently lives in, if any
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn get_root_store(&self, node: NodeId) -> Result<Option<NodeId>> {
        let root = self.get_root(node)?;
        Ok(self.root_stores.contains(&root).then_some(root))
    }

    pub(crate) fn is_in_root_store(&self, node: NodeId) -> Result<bool> {
        Ok(self.get_root_store(node)?.is_some())
    }

    pub(crate) fn fire_attached_hooks(&mut self, subtrees: &[NodeId]) -> Result<()> {
        let mut pending = Vec::new();
        for root in subtrees {
            for node in self.walk_tree(*root, WalkOrder::ParentFirst) {
                if let Ok(model) = self.model_data(node) {
                    if let Some(hook) = &model.class.on_attached_to_root_store {
                        pending.push((node, hook.clone()));
                    }
                }
            }
        }
        for (node, hook) in pending {
            self.run_hook(node, HOOK_ON_ATTACHED_TO_ROOT_STORE, hook)?;
        }
        Ok(())
    }

    pub(crate) fn fire_detached_hooks(&mut self, subtrees: &[NodeId]) -> Result<()> {
        let mut pending = Vec::new();
        for root in subtrees {
            for node in self.walk_tree(*root, WalkOrder::ChildrenFirst) {
                if let Ok(model) = self.model_data(node) {
                    if let Some(hook) = &model.class.on_detached_from_root_store {
                        pending.push((node, hook.clone()));
                    }
                }
            }
        }
        for (node, hook) in pending {
            self.run_hook(node, HOOK_ON_DETACHED_FROM_ROOT_STORE, hook)?;
        }
        Ok(())
    }

    /// Run a hook as a built-in action on `node`.
    pub(crate) fn run_hook(&mut self, node: NodeId, name: &str, hook: HookFn) -> Result<()> {
        if !self.contains(node) {
            return Ok(());
        }
        self.run_in_action(node, name, move |store| {
            hook(store, node)?;
            Ok(Value::Null)
        })
        .map(|_| ())
    }
}
