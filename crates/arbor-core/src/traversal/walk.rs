use crate::ops::store::Store;
use crate::value::NodeId;

/// Visiting order for [`Store::walk_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// A node before its descendants
    ParentFirst,
    /// A node after all of its descendants
    ChildrenFirst,
}

/// Lazy depth-first iterator over a subtree.
///
/// Children are listed when their parent is expanded, in tree order.
/// Cloning the iterator before use gives an independent walk.
#[derive(Clone)]
pub struct WalkTree<'a> {
    store: &'a Store,
    order: WalkOrder,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> WalkTree<'a> {
    fn push_children(&mut self, node: NodeId) {
        if let Ok(children) = self.store.get_children(node) {
            self.stack
                .extend(children.into_iter().rev().map(|child| (child, false)));
        }
    }
}

impl<'a> Iterator for WalkTree<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some((node, expanded)) = self.stack.pop() {
            match self.order {
                WalkOrder::ParentFirst => {
                    self.push_children(node);
                    return Some(node);
                }
                WalkOrder::ChildrenFirst if expanded => return Some(node),
                WalkOrder::ChildrenFirst => {
                    self.stack.push((node, true));
                    self.push_children(node);
                }
            }
        }
        None
    }
}

impl Store {
    /// Iterate over `root` and all of its descendant nodes.
    ///
    /// An unknown root yields nothing.
    pub fn walk_tree(&self, root: NodeId, order: WalkOrder) -> WalkTree<'_> {
        let stack = if self.contains(root) {
            vec![(root, false)]
        } else {
            Vec::new()
        };
        WalkTree {
            store: self,
            order,
            stack,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::registry::Registry;
    use serde_json::json;
    use std::rc::Rc;

    fn labels(store: &Store, nodes: impl Iterator<Item = NodeId>) -> Vec<String> {
        nodes
            .map(|n| {
                store
                    .get(n, "name")
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "-".to_string())
            })
            .collect()
    }

    fn tree() -> (Store, NodeId) {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store
            .tweak(json!({
                "name": "root",
                "a": {"name": "a", "a1": {"name": "a1"}},
                "b": {"name": "b"}
            }))
            .unwrap()
            .as_node()
            .unwrap();
        (store, root)
    }

    #[test]
    fn test_parent_first_order() {
        let (store, root) = tree();
        let order = labels(&store, store.walk_tree(root, WalkOrder::ParentFirst));
        assert_eq!(order, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_children_first_order() {
        let (store, root) = tree();
        let order = labels(&store, store.walk_tree(root, WalkOrder::ChildrenFirst));
        assert_eq!(order, ["a1", "a", "b", "root"]);
    }

    #[test]
    fn test_walk_is_lazy_and_restartable() {
        let (store, root) = tree();
        let walk = store.walk_tree(root, WalkOrder::ParentFirst);
        let first_two: Vec<NodeId> = walk.clone().take(2).collect();
        let all: Vec<NodeId> = walk.collect();
        assert_eq!(&all[..2], &first_two[..]);
        assert_eq!(all.len(), 4);
    }
}
