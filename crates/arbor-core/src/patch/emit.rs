use crate::action::ActionContext;
use crate::errors::Result;
use crate::ops::store::{ListenerId, Store};
use crate::patch::Patch;
use crate::value::NodeId;
use std::fmt;
use std::rc::Rc;

/// Patches produced by one primitive mutation, as seen by one listener.
#[derive(Clone)]
pub struct PatchEvent {
    /// Innermost action running when the mutation happened
    pub context: Option<Rc<ActionContext>>,
    pub patches: Vec<Patch>,
    /// Undo the event when applied in reverse order
    pub inverse_patches: Vec<Patch>,
}

impl fmt::Debug for PatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchEvent")
            .field("action", &self.context.as_ref().map(|c| c.action_name().to_string()))
            .field("patches", &self.patches)
            .field("inverse_patches", &self.inverse_patches)
            .finish()
    }
}

pub(crate) type PatchListener = Rc<dyn Fn(&PatchEvent)>;

pub(crate) struct PatchListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) root: NodeId,
    listener: PatchListener,
}

impl Store {
    /// Deliver every patch produced inside the subtree of `root` to `listener`.
    ///
    /// Paths are relative to `root`. Listeners run synchronously, right
    /// after the mutation and its lifecycle hooks.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown root.
    pub fn on_patches<F>(&mut self, root: NodeId, listener: F) -> Result<ListenerId>
    where
        F: Fn(&PatchEvent) + 'static,
    {
        self.node(root)?;
        let id = ListenerId(self.next_handle());
        self.patch_listeners.push(PatchListenerEntry {
            id,
            root,
            listener: Rc::new(listener),
        });
        Ok(id)
    }

    /// Returns whether the listener was registered
    pub fn remove_patch_listener(&mut self, id: ListenerId) -> bool {
        let before = self.patch_listeners.len();
        self.patch_listeners.retain(|entry| entry.id != id);
        before != self.patch_listeners.len()
    }

    pub(crate) fn emit_patches(
        &mut self,
        container: NodeId,
        patches: Vec<Patch>,
        inverse: Vec<Patch>,
    ) -> Result<()> {
        if patches.is_empty() || self.patch_listeners.is_empty() {
            return Ok(());
        }
        let root_path = self.get_root_path(container)?;
        let context = self.current_action();

        let mut due = Vec::new();
        for entry in &self.patch_listeners {
            let Some(depth) = root_path.path_nodes.iter().position(|n| *n == entry.root) else {
                continue;
            };
            let prefix = &root_path.path[depth..];
            due.push((
                entry.listener.clone(),
                PatchEvent {
                    context: context.clone(),
                    patches: patches.iter().map(|p| p.with_prefix(prefix)).collect(),
                    inverse_patches: inverse.iter().map(|p| p.with_prefix(prefix)).collect(),
                },
            ));
        }

        tracing::trace!(
            container = %container,
            patches = patches.len(),
            listeners = due.len(),
            "emitting patches"
        );
        for (listener, event) in due {
            listener(&event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::registry::Registry;
    use crate::value::PathSegment;
    use crate::Value;
    use serde_json::json;
    use std::cell::RefCell;

    fn record(store: &mut Store, root: NodeId) -> Rc<RefCell<Vec<PatchEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        store
            .on_patches(root, move |event| sink.borrow_mut().push(event.clone()))
            .unwrap();
        events
    }

    #[test]
    fn test_paths_are_relative_to_listener_root() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store
            .tweak(json!({"list": [{"n": 1}]}))
            .unwrap()
            .as_node()
            .unwrap();
        let list = store.get(root, "list").unwrap().as_node().unwrap();
        let item = store.get(list, 0).unwrap().as_node().unwrap();
        let from_root = record(&mut store, root);
        let from_list = record(&mut store, list);

        store
            .run_in_action(root, "bump", |s| {
                s.set(item, "n", 2)?;
                Ok(Value::Null)
            })
            .unwrap();

        let from_root = from_root.borrow();
        assert_eq!(from_root.len(), 1);
        assert_eq!(from_root[0].patches[0].pointer(), "/list/0/n");
        assert_eq!(from_root[0].context.as_ref().unwrap().action_name(), "bump");
        assert_eq!(from_list.borrow()[0].patches[0].pointer(), "/0/n");
    }

    #[test]
    fn test_splice_removes_highest_index_first() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let list = store.tweak(json!([1, 2, 3, 4])).unwrap().as_node().unwrap();
        let events = record(&mut store, list);

        store
            .run_in_action(list, "splice", |s| {
                s.array_splice(list, 1, 2, vec![json!("a").into()])?;
                Ok(Value::Null)
            })
            .unwrap();

        let events = events.borrow();
        let patches = &events[0].patches;
        assert_eq!(
            patches,
            &vec![
                Patch::Remove {
                    path: vec![PathSegment::Index(2)],
                    old_value: Some(json!(3))
                },
                Patch::Remove {
                    path: vec![PathSegment::Index(1)],
                    old_value: Some(json!(2))
                },
                Patch::Add {
                    path: vec![PathSegment::Index(1)],
                    value: json!("a")
                },
            ]
        );
    }

    #[test]
    fn test_unrelated_listener_not_called() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let a = store.tweak(json!({"x": 1})).unwrap().as_node().unwrap();
        let b = store.tweak(json!({"y": 1})).unwrap().as_node().unwrap();
        let events = record(&mut store, b);

        store
            .run_in_action(a, "set", |s| {
                s.set(a, "x", 2)?;
                Ok(Value::Null)
            })
            .unwrap();
        assert!(events.borrow().is_empty());
    }
}
