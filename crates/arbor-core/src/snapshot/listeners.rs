use crate::errors::Result;
use crate::ops::store::{ListenerId, Store};
use crate::snapshot::Snapshot;
use crate::value::NodeId;
use std::rc::Rc;

pub(crate) type SnapshotListener = Rc<dyn Fn(&Snapshot, &Snapshot)>;

pub(crate) struct SnapshotListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) node: NodeId,
    last: Snapshot,
    listener: SnapshotListener,
}

impl Store {
    /// Call `listener(new, previous)` after each outermost action that
    /// changed the node's snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn on_snapshot<F>(&mut self, node: NodeId, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Snapshot, &Snapshot) + 'static,
    {
        let last = self.get_snapshot(node)?;
        let id = ListenerId(self.next_handle());
        self.snapshot_listeners.push(SnapshotListenerEntry {
            id,
            node,
            last,
            listener: Rc::new(listener),
        });
        Ok(id)
    }

    /// Returns whether the listener was registered
    pub fn remove_snapshot_listener(&mut self, id: ListenerId) -> bool {
        let before = self.snapshot_listeners.len();
        self.snapshot_listeners.retain(|entry| entry.id != id);
        before != self.snapshot_listeners.len()
    }

    pub(crate) fn notify_snapshot_listeners(&mut self) -> Result<()> {
        if self.snapshot_listeners.is_empty() {
            return Ok(());
        }
        let mut changed = Vec::new();
        for (index, entry) in self.snapshot_listeners.iter().enumerate() {
            if !self.contains(entry.node) {
                continue;
            }
            let current = self.get_snapshot(entry.node)?;
            if !Snapshot::ptr_eq(&current, &entry.last) {
                changed.push((index, current));
            }
        }

        let mut due = Vec::with_capacity(changed.len());
        for (index, current) in changed {
            let entry = &mut self.snapshot_listeners[index];
            let previous = std::mem::replace(&mut entry.last, current.clone());
            due.push((entry.listener.clone(), current, previous));
        }
        for (listener, current, previous) in due {
            listener(&current, &previous);
        }
        Ok(())
    }
}
