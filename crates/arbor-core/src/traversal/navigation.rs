use crate::errors::{ArborError, Result};
use crate::ops::store::{NodeData, ParentLink, Store};
use crate::value::{NodeId, Path, PathSegment, Value};

/// Path from a tree root down to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPath {
    pub root: NodeId,
    /// Keys from `root` to the node; empty when the node is the root
    pub path: Path,
    /// Nodes visited from `root` to the node, both inclusive
    pub path_nodes: Vec<NodeId>,
}

impl Store {
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn get_parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(node)?.parent.as_ref().map(|link| link.parent))
    }

    /// Parent node and the key under which `node` hangs there
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn get_parent_path(&self, node: NodeId) -> Result<Option<ParentLink>> {
        Ok(self.node(node)?.parent.clone())
    }

    /// Walk parent links up to the tree root.
    ///
    /// # Errors
    /// * `NodeNotFound` - If `node` doesn't exist
    /// * `Internal` - If a parent link points at a missing node
    pub fn get_root(&self, node: NodeId) -> Result<NodeId> {
        let mut current = node;
        loop {
            let link = &self
                .nodes
                .get(&current)
                .ok_or_else(|| {
                    if current == node {
                        ArborError::NodeNotFound { node }
                    } else {
                        ArborError::Internal {
                            message: format!("parent chain of {} is broken at {}", node, current),
                        }
                    }
                })?
                .parent;
            match link {
                Some(link) => current = link.parent,
                None => return Ok(current),
            }
        }
    }

    /// Compute the root-to-node path.
    ///
    /// # Arguments
    /// * `node` - Node to locate
    ///
    /// # Returns
    /// The root, the keys leading down from it and the nodes visited on the way
    ///
    /// # Errors
    /// * `NodeNotFound` - If `node` doesn't exist
    pub fn get_root_path(&self, node: NodeId) -> Result<RootPath> {
        let mut path = Vec::new();
        let mut path_nodes = vec![node];
        let mut current = self.node(node)?;
        while let Some(link) = &current.parent {
            path.push(link.key.clone());
            path_nodes.push(link.parent);
            current = self.node(link.parent)?;
        }
        path.reverse();
        path_nodes.reverse();
        Ok(RootPath {
            root: path_nodes[0],
            path,
            path_nodes,
        })
    }

    /// Whether `ancestor` is `node` or lies on its parent chain
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown `node`.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        let mut current = Some(node);
        self.node(node)?;
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.nodes.get(&id).and_then(|n| n.parent.as_ref()).map(|l| l.parent);
        }
        Ok(false)
    }

    /// Whether `child` is a strict descendant of `parent`
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown `child`.
    pub fn is_child_of(&self, child: NodeId, parent: NodeId) -> Result<bool> {
        Ok(child != parent && self.is_ancestor_or_self(parent, child)?)
    }

    /// Whether `parent` is a strict ancestor of `child`
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown `child`.
    pub fn is_parent_of(&self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.is_child_of(child, parent)
    }

    /// Nearest strict ancestor matching `predicate`.
    ///
    /// # Arguments
    /// * `max_depth` - How many levels to climb; `0` means unlimited
    ///
    /// # Errors
    /// * `NodeNotFound` - If `node` doesn't exist
    pub fn find_parent<F>(&self, node: NodeId, predicate: F, max_depth: usize) -> Result<Option<NodeId>>
    where
        F: Fn(&Store, NodeId) -> bool,
    {
        let mut current = self.get_parent(node)?;
        let mut depth = 1;
        while let Some(id) = current {
            if max_depth != 0 && depth > max_depth {
                break;
            }
            if predicate(self, id) {
                return Ok(Some(id));
            }
            current = self.get_parent(id)?;
            depth += 1;
        }
        Ok(None)
    }

    /// Child nodes of a container in tree order (primitives are skipped)
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn get_children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .node(node)?
            .data
            .slot_values()
            .into_iter()
            .filter_map(|v| v.as_node())
            .collect())
    }

    /// Follow `path` down from `root`.
    ///
    /// Returns `None` when a segment does not resolve. Model props resolve by
    /// name, arrays accept numeric segments, frozen nodes are opaque.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown root.
    pub fn resolve_path(&self, root: NodeId, path: &[PathSegment]) -> Result<Option<Value>> {
        self.node(root)?;
        let mut current = Value::Node(root);
        for segment in path {
            let Value::Node(id) = current else {
                return Ok(None);
            };
            let next = match &self.node(id)?.data {
                NodeData::Object(map) => map.get(&segment.as_key()).cloned(),
                NodeData::Model(model) => model.props.get(&segment.as_key()).cloned(),
                NodeData::Array(items) => segment.as_index().and_then(|i| items.get(i).cloned()),
                NodeData::Frozen(_) => None,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Path from `ancestor` down to `node`, or `None` when unrelated
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown `node`.
    pub fn get_path_from(&self, ancestor: NodeId, node: NodeId) -> Result<Option<Path>> {
        let root_path = self.get_root_path(node)?;
        Ok(root_path
            .path_nodes
            .iter()
            .position(|n| *n == ancestor)
            .map(|idx| root_path.path[idx..].to_vec()))
    }
}
