use crate::action::ActionContext;
use crate::errors::Result;
use crate::ops::store::{ListenerId, Store};
use crate::patch::{Patch, PatchEvent};
use crate::value::NodeId;
use arbor_core_types::CallId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Patches recorded during one outermost action.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchGroup {
    /// Call id of the outermost action, `None` for changes made by creation hooks
    pub call_id: Option<CallId>,
    pub action_name: Option<String>,
    pub patches: Vec<Patch>,
    /// In mutation order; apply with `reverse = true` to undo the group
    pub inverse_patches: Vec<Patch>,
}

fn outermost(ctx: &ActionContext) -> &ActionContext {
    match ctx.parent() {
        Some(parent) => outermost(parent),
        None => ctx,
    }
}

/// Collects the patches of a subtree, grouped per outermost action.
///
/// ## Example
///
/// ```
/// use arbor_core::{patch::PatchRecorder, Store, Value};
///
/// let mut store = Store::new();
/// let root = store.tweak(serde_json::json!({"n": 0})).unwrap().as_node().unwrap();
/// let recorder = PatchRecorder::new(&mut store, root).unwrap();
///
/// store.run_in_action(root, "bump", |s| { s.set(root, "n", 1)?; Ok(Value::Null) }).unwrap();
/// assert_eq!(recorder.groups().len(), 1);
/// recorder.dispose(&mut store);
/// ```
pub struct PatchRecorder {
    root: NodeId,
    listener: ListenerId,
    groups: Rc<RefCell<Vec<PatchGroup>>>,
    recording: Rc<Cell<bool>>,
}

impl PatchRecorder {
    /// Start recording patches produced under `root`.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown root.
    pub fn new(store: &mut Store, root: NodeId) -> Result<Self> {
        let groups: Rc<RefCell<Vec<PatchGroup>>> = Rc::new(RefCell::new(Vec::new()));
        let recording = Rc::new(Cell::new(true));
        let sink = groups.clone();
        let active = recording.clone();
        let listener = store.on_patches(root, move |event: &PatchEvent| {
            if active.get() {
                push_event(&mut sink.borrow_mut(), event);
            }
        })?;
        Ok(Self {
            root,
            listener,
            groups,
            recording,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_recording(&self) -> bool {
        self.recording.get()
    }

    /// Pause or resume recording without unregistering
    pub fn set_recording(&self, recording: bool) {
        self.recording.set(recording);
    }

    pub fn groups(&self) -> Vec<PatchGroup> {
        self.groups.borrow().clone()
    }

    /// Every recorded patch in mutation order
    pub fn patches(&self) -> Vec<Patch> {
        self.groups
            .borrow()
            .iter()
            .flat_map(|group| group.patches.iter().cloned())
            .collect()
    }

    /// Every recorded inverse patch in mutation order
    pub fn inverse_patches(&self) -> Vec<Patch> {
        self.groups
            .borrow()
            .iter()
            .flat_map(|group| group.inverse_patches.iter().cloned())
            .collect()
    }

    /// Take the recorded groups, leaving the recorder empty
    pub fn drain(&self) -> Vec<PatchGroup> {
        std::mem::take(&mut *self.groups.borrow_mut())
    }

    pub fn clear(&self) {
        self.groups.borrow_mut().clear();
    }

    /// Stop recording and unregister from the store
    pub fn dispose(self, store: &mut Store) {
        store.remove_patch_listener(self.listener);
    }
}

fn push_event(groups: &mut Vec<PatchGroup>, event: &PatchEvent) {
    let root = event.context.as_deref().map(outermost);
    let call_id = root.map(|ctx| ctx.call_id().clone());
    if let Some(last) = groups.last_mut() {
        if call_id.is_some() && last.call_id == call_id {
            last.patches.extend(event.patches.iter().cloned());
            last.inverse_patches
                .extend(event.inverse_patches.iter().cloned());
            return;
        }
    }
    groups.push(PatchGroup {
        call_id,
        action_name: root.map(|ctx| ctx.action_name().to_string()),
        patches: event.patches.clone(),
        inverse_patches: event.inverse_patches.clone(),
    });
}
