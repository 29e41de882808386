//! Undo/redo over the patches of a subtree.
//!
//! Every user call becomes one undo step: nested actions and all segments of
//! a flow share the group id of their root context and are merged.

use crate::action::{BUILTIN_REDO, BUILTIN_UNDO};
use crate::errors::Result;
use crate::ops::store::{ListenerId, Store};
use crate::patch::{Patch, PatchEvent};
use crate::value::{NodeId, Value};
use arbor_core_types::CallId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// One undoable step.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEvent {
    pub action_name: Option<String>,
    pub group_id: Option<CallId>,
    pub patches: Vec<Patch>,
    pub inverse_patches: Vec<Patch>,
}

#[derive(Debug, Default)]
struct UndoState {
    undo: Vec<UndoEvent>,
    redo: Vec<UndoEvent>,
}

impl UndoState {
    fn record(&mut self, event: &PatchEvent) {
        self.redo.clear();
        let root = event.context.as_deref().map(|ctx| ctx.root_context());
        let group_id = root.map(|ctx| ctx.group_id().clone());
        if let Some(last) = self.undo.last_mut() {
            if group_id.is_some() && last.group_id == group_id {
                last.patches.extend(event.patches.iter().cloned());
                last.inverse_patches
                    .extend(event.inverse_patches.iter().cloned());
                return;
            }
        }
        self.undo.push(UndoEvent {
            action_name: root.map(|ctx| ctx.action_name().to_string()),
            group_id,
            patches: event.patches.clone(),
            inverse_patches: event.inverse_patches.clone(),
        });
    }
}

/// Undo and redo stacks for the subtree at `root`.
///
/// Undo and redo run as the `$$undo` and `$$redo` actions on the root, so
/// middlewares see them like any other call.
pub struct UndoManager {
    root: NodeId,
    listener: ListenerId,
    state: Rc<RefCell<UndoState>>,
    skipping: Rc<Cell<bool>>,
}

impl UndoManager {
    /// Start recording undo steps for `root`.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown root.
    pub fn new(store: &mut Store, root: NodeId) -> Result<Self> {
        let state = Rc::new(RefCell::new(UndoState::default()));
        let skipping = Rc::new(Cell::new(false));
        let sink = state.clone();
        let skip = skipping.clone();
        let listener = store.on_patches(root, move |event: &PatchEvent| {
            if !skip.get() {
                sink.borrow_mut().record(event);
            }
        })?;
        Ok(Self {
            root,
            listener,
            state,
            skipping,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn can_undo(&self) -> bool {
        !self.state.borrow().undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.borrow().redo.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.state.borrow().undo.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.state.borrow().redo.len()
    }

    /// Undo steps, oldest first
    pub fn undo_events(&self) -> Vec<UndoEvent> {
        self.state.borrow().undo.clone()
    }

    /// Redo steps, next to redo last
    pub fn redo_events(&self) -> Vec<UndoEvent> {
        self.state.borrow().redo.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.undo.clear();
        state.redo.clear();
    }

    /// Revert the latest step. Returns `false` when there is nothing to undo.
    ///
    /// # Errors
    ///
    /// Patch errors when the tree no longer matches the step; the step is
    /// kept on the undo stack.
    pub fn undo(&self, store: &mut Store) -> Result<bool> {
        let Some(event) = self.state.borrow_mut().undo.pop() else {
            return Ok(false);
        };
        let root = self.root;
        let inverse = event.inverse_patches.clone();
        let result = self.skipped(|| {
            store.run_builtin(root, BUILTIN_UNDO, Vec::new(), move |s| {
                s.apply_patches(root, &inverse, true)?;
                Ok(Value::Null)
            })
        });
        let mut state = self.state.borrow_mut();
        match result {
            Ok(_) => {
                tracing::debug!(root = %root, patches = event.inverse_patches.len(), "undo");
                state.redo.push(event);
                Ok(true)
            }
            Err(err) => {
                state.undo.push(event);
                Err(err)
            }
        }
    }

    /// Reapply the latest undone step. Returns `false` when there is nothing
    /// to redo.
    ///
    /// # Errors
    ///
    /// Patch errors when the tree no longer matches the step; the step is
    /// kept on the redo stack.
    pub fn redo(&self, store: &mut Store) -> Result<bool> {
        let Some(event) = self.state.borrow_mut().redo.pop() else {
            return Ok(false);
        };
        let root = self.root;
        let patches = event.patches.clone();
        let result = self.skipped(|| {
            store.run_builtin(root, BUILTIN_REDO, Vec::new(), move |s| {
                s.apply_patches(root, &patches, false)?;
                Ok(Value::Null)
            })
        });
        let mut state = self.state.borrow_mut();
        match result {
            Ok(_) => {
                tracing::debug!(root = %root, patches = event.patches.len(), "redo");
                state.undo.push(event);
                Ok(true)
            }
            Err(err) => {
                state.redo.push(event);
                Err(err)
            }
        }
    }

    /// Run `body` without recording its changes
    pub fn without_undo<R>(&self, body: impl FnOnce() -> R) -> R {
        self.skipped(body)
    }

    /// Stop recording and unregister from the store
    pub fn dispose(self, store: &mut Store) {
        store.remove_patch_listener(self.listener);
    }

    fn skipped<R>(&self, body: impl FnOnce() -> R) -> R {
        let previous = self.skipping.replace(true);
        let result = body();
        self.skipping.set(previous);
        result
    }
}
