//! Protected mutation primitives.
//!
//! Every primitive requires a running action. A successful mutation
//! invalidates cached snapshots on the path to the root, then fires
//! root-store lifecycle hooks for attached and detached subtrees, then emits
//! patches to listeners.

use crate::errors::{ArborError, Result};
use crate::ops::store::{ModelData, NodeData, NodeKind, ParentLink, Store};
use crate::ops::tweak::IdMode;
use crate::patch::Patch;
use crate::value::{Input, NodeId, PathSegment, Value};
use std::collections::HashSet;

/// What a primitive changed, with patch paths relative to the mutated container.
#[derive(Default)]
pub(crate) struct SlotChange {
    pub(crate) patches: Vec<Patch>,
    pub(crate) inverse: Vec<Patch>,
    pub(crate) attached: Vec<NodeId>,
    pub(crate) detached: Vec<NodeId>,
}

enum SlotTarget {
    Existing { key: PathSegment, old: Value },
    NewKey(PathSegment),
    Append(usize),
}

impl Store {
    pub(crate) fn ensure_in_action(&self, operation: &str) -> Result<()> {
        if self.action_stack.is_empty() {
            return Err(ArborError::ActionContext {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Write a value into a container slot.
    ///
    /// Models accept declared props only. Objects add missing keys. Arrays
    /// replace in range and append at `len`.
    ///
    /// # Errors
    ///
    /// `ActionContext` outside an action, `UnknownProp`, `TypeCheck`,
    /// `Hierarchy`, `DuplicateId`, `IndexOutOfBounds` or `WrongNodeKind`.
    pub fn set(
        &mut self,
        node: NodeId,
        key: impl Into<PathSegment>,
        value: impl Into<Input>,
    ) -> Result<()> {
        self.ensure_in_action("set")?;
        self.set_slot(node, key.into(), value.into(), true)
    }

    /// Remove a key from an object or an element from an array.
    ///
    /// Returns the removed value, or `None` for a missing object key.
    ///
    /// # Errors
    ///
    /// `ActionContext` outside an action; `WrongNodeKind` for models and frozen nodes.
    pub fn delete(&mut self, node: NodeId, key: impl Into<PathSegment>) -> Result<Option<Value>> {
        self.ensure_in_action("delete")?;
        self.delete_slot(node, key.into())
    }

    /// # Errors
    ///
    /// Fails like [`Store::array_splice`].
    pub fn array_push(&mut self, node: NodeId, value: impl Into<Input>) -> Result<usize> {
        self.ensure_in_action("array_push")?;
        let index = self.array_len(node)?;
        self.splice_slots(node, index, 0, vec![value.into()])?;
        Ok(index)
    }

    /// # Errors
    ///
    /// Fails like [`Store::array_splice`].
    pub fn array_insert(&mut self, node: NodeId, index: usize, value: impl Into<Input>) -> Result<()> {
        self.ensure_in_action("array_insert")?;
        self.splice_slots(node, index, 0, vec![value.into()])
            .map(|_| ())
    }

    /// # Errors
    ///
    /// `IndexOutOfBounds` for an index past the end, otherwise like [`Store::array_splice`].
    pub fn array_remove(&mut self, node: NodeId, index: usize) -> Result<Value> {
        self.ensure_in_action("array_remove")?;
        let len = self.array_len(node)?;
        if index >= len {
            return Err(ArborError::IndexOutOfBounds { node, index, len });
        }
        let mut removed = self.splice_slots(node, index, 1, Vec::new())?;
        removed.pop().ok_or_else(|| ArborError::Internal {
            message: "splice removed nothing".to_string(),
        })
    }

    /// # Errors
    ///
    /// Fails like [`Store::array_splice`].
    pub fn array_clear(&mut self, node: NodeId) -> Result<Vec<Value>> {
        self.ensure_in_action("array_clear")?;
        let len = self.array_len(node)?;
        self.splice_slots(node, 0, len, Vec::new())
    }

    /// Remove `delete_count` elements at `start` and insert `items` there.
    ///
    /// Patches list the removals from the highest index down, then the
    /// insertions in ascending order.
    ///
    /// # Errors
    ///
    /// `ActionContext` outside an action, `IndexOutOfBounds` when `start`
    /// is past the end, `Hierarchy` or `DuplicateId` for unattachable items.
    pub fn array_splice(
        &mut self,
        node: NodeId,
        start: usize,
        delete_count: usize,
        items: Vec<Input>,
    ) -> Result<Vec<Value>> {
        self.ensure_in_action("array_splice")?;
        self.splice_slots(node, start, delete_count, items)
    }

    /// Remove `node` from its parent as the `$$detach` action.
    ///
    /// Array elements are spliced out and object keys deleted. A model prop
    /// is set to null without type checking. A node without a parent is
    /// left alone.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for an unknown handle; middleware errors pass through.
    pub fn detach(&mut self, node: NodeId) -> Result<()> {
        let Some(link) = self.node(node)?.parent.clone() else {
            return Ok(());
        };
        let ParentLink { parent, key } = link;
        self.run_builtin(node, crate::action::BUILTIN_DETACH, Vec::new(), move |store| {
            store.with_deferred_type_checks(|store| {
                match store.node(parent)?.data.kind() {
                    NodeKind::Model => store.set_slot(parent, key, Input::Value(Value::Null), false)?,
                    NodeKind::Array => {
                        let index = key.as_index().ok_or_else(|| ArborError::Internal {
                            message: format!("array child under key '{}'", key),
                        })?;
                        store.splice_slots(parent, index, 1, Vec::new())?;
                    }
                    _ => {
                        store.delete_slot(parent, key)?;
                    }
                }
                Ok(Value::Null)
            })
        })?;
        tracing::debug!(node = %node, parent = %parent, "detached node");
        Ok(())
    }

    fn array_len(&self, node: NodeId) -> Result<usize> {
        match &self.node(node)?.data {
            NodeData::Array(items) => Ok(items.len()),
            other => Err(ArborError::WrongNodeKind {
                node,
                expected: "array".to_string(),
                actual: other.kind().as_str().to_string(),
            }),
        }
    }

    pub(crate) fn is_recording_patches(&self) -> bool {
        !self.patch_listeners.is_empty()
    }

    /// Run `f` with [`Store::check_enclosing_types`] suspended.
    pub(crate) fn with_deferred_type_checks<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.deferred_type_checks += 1;
        let result = f(self);
        self.deferred_type_checks -= 1;
        result
    }

    /// Check a plain container against the declared type of the nearest
    /// typed model prop holding it.
    ///
    /// Untyped props are passed through, so items of a collection model are
    /// checked by the prop holding the collection. Model containers are
    /// skipped; their own prop writes are checked directly. The error path
    /// starts at the model owning the typed prop.
    pub(crate) fn check_enclosing_types(&self, container: NodeId) -> Result<()> {
        if self.deferred_type_checks > 0
            || !self.config.type_checking_enabled()
            || self.is_model(container)
        {
            return Ok(());
        }
        self.invalidate_snapshots(container);
        let mut current = container;
        while let Some(link) = &self.node(current)?.parent {
            if let NodeData::Model(model) = &self.node(link.parent)?.data {
                let prop_type = model
                    .class
                    .prop(&link.key.as_key())
                    .and_then(|def| def.prop_type.clone());
                let Some(prop_type) = prop_type else {
                    current = link.parent;
                    continue;
                };
                return match prop_type.check(self, &Value::Node(current), std::slice::from_ref(&link.key)) {
                    Some(err) => Err(ArborError::TypeCheck(err)),
                    None => Ok(()),
                };
            }
            current = link.parent;
        }
        Ok(())
    }

    fn resolve_slot(&self, node: NodeId, key: PathSegment) -> Result<(SlotTarget, Option<crate::Type>)> {
        match &self.node(node)?.data {
            NodeData::Model(model) => {
                let name = key.as_key();
                let def = model
                    .class
                    .prop(&name)
                    .ok_or_else(|| ArborError::UnknownProp {
                        model_type: model.class.name.clone(),
                        prop: name.clone(),
                    })?;
                let old = model.props.get(&name).cloned().unwrap_or(Value::Null);
                Ok((
                    SlotTarget::Existing {
                        key: PathSegment::Key(name),
                        old,
                    },
                    def.prop_type.clone(),
                ))
            }
            NodeData::Object(map) => {
                let name = key.as_key();
                let target = match map.get(&name) {
                    Some(old) => SlotTarget::Existing {
                        key: PathSegment::Key(name),
                        old: old.clone(),
                    },
                    None => SlotTarget::NewKey(PathSegment::Key(name)),
                };
                Ok((target, None))
            }
            NodeData::Array(items) => {
                let index = key.as_index().ok_or_else(|| ArborError::WrongNodeKind {
                    node,
                    expected: "object".to_string(),
                    actual: "array".to_string(),
                })?;
                let target = match items.get(index) {
                    Some(old) => SlotTarget::Existing {
                        key: PathSegment::Index(index),
                        old: old.clone(),
                    },
                    None if index == items.len() => SlotTarget::Append(index),
                    None => {
                        return Err(ArborError::IndexOutOfBounds {
                            node,
                            index,
                            len: items.len(),
                        })
                    }
                };
                Ok((target, None))
            }
            NodeData::Frozen(_) => Err(ArborError::WrongNodeKind {
                node,
                expected: "container".to_string(),
                actual: "frozen".to_string(),
            }),
        }
    }

    pub(crate) fn set_slot(
        &mut self,
        node: NodeId,
        key: PathSegment,
        input: Input,
        check_types: bool,
    ) -> Result<()> {
        let (target, prop_type) = self.resolve_slot(node, key)?;
        let (key, old) = match target {
            SlotTarget::Append(index) => {
                return self.splice_slots(node, index, 0, vec![input]).map(|_| ());
            }
            SlotTarget::Existing { key, old } => (key, Some(old)),
            SlotTarget::NewKey(key) => (key, None),
        };

        let (value, created) = self.prepare_input(input, IdMode::Keep)?;
        if old.as_ref() == Some(&value) {
            return Ok(());
        }

        if check_types && self.config.type_checking_enabled() {
            if let Some(prop_type) = &prop_type {
                if let Some(err) = prop_type.check(self, &value, std::slice::from_ref(&key)) {
                    return self.reject_input(&value, created, ArborError::TypeCheck(err));
                }
            }
        }
        if let Value::Node(child) = &value {
            let replaced: Vec<Value> = old.iter().cloned().collect();
            if let Err(e) = self.check_attachable(*child, node, &replaced) {
                return self.reject_input(&value, created, e);
            }
        }

        let recording = self.is_recording_patches();
        let old_json = match (&old, recording) {
            (Some(old), true) => Some(self.value_json(old)?),
            _ => None,
        };
        let new_json = if recording {
            Some(self.value_json(&value)?)
        } else {
            None
        };
        let in_root_store = self.is_in_root_store(node)?;

        self.write_slot(node, &key, value.clone())?;

        let mut change = SlotChange::default();
        if let Some(Value::Node(old_child)) = &old {
            self.node_mut(*old_child)?.parent = None;
            change.detached.push(*old_child);
        }
        if let Value::Node(child) = &value {
            self.node_mut(*child)?.parent = Some(ParentLink {
                parent: node,
                key: key.clone(),
            });
            change.attached.push(*child);
        }
        if let Err(e) = self.check_enclosing_types(node) {
            self.restore_slot(node, &key, old, &value)?;
            return self.reject_input(&value, created, e);
        }
        if let Some(new_json) = new_json {
            let path = vec![key];
            match old_json {
                Some(old_json) => {
                    change.patches.push(Patch::Replace {
                        path: path.clone(),
                        value: new_json.clone(),
                        old_value: Some(old_json.clone()),
                    });
                    change.inverse.push(Patch::Replace {
                        path,
                        value: old_json,
                        old_value: Some(new_json),
                    });
                }
                None => {
                    change.patches.push(Patch::Add {
                        path: path.clone(),
                        value: new_json.clone(),
                    });
                    change.inverse.push(Patch::Remove {
                        path,
                        old_value: Some(new_json),
                    });
                }
            }
        }
        self.finish_mutation(node, change, in_root_store)
    }

    /// Put `old` back into a slot that rejected `rejected`.
    fn restore_slot(
        &mut self,
        node: NodeId,
        key: &PathSegment,
        old: Option<Value>,
        rejected: &Value,
    ) -> Result<()> {
        if let Value::Node(child) = rejected {
            self.node_mut(*child)?.parent = None;
        }
        match old {
            Some(old) => {
                if let Value::Node(old_child) = &old {
                    self.node_mut(*old_child)?.parent = Some(ParentLink {
                        parent: node,
                        key: key.clone(),
                    });
                }
                self.write_slot(node, key, old)?;
            }
            None => {
                if let NodeData::Object(map) = &mut self.node_mut(node)?.data {
                    map.shift_remove(&key.as_key());
                }
            }
        }
        self.invalidate_snapshots(node);
        Ok(())
    }

    fn write_slot(&mut self, node: NodeId, key: &PathSegment, value: Value) -> Result<()> {
        match &mut self.node_mut(node)?.data {
            NodeData::Object(map) => {
                map.insert(key.as_key(), value);
            }
            NodeData::Model(model) => {
                model.props.insert(key.as_key(), value);
            }
            NodeData::Array(items) => {
                let len = items.len();
                let slot = key
                    .as_index()
                    .and_then(|i| items.get_mut(i))
                    .ok_or(ArborError::IndexOutOfBounds {
                        node,
                        index: key.as_index().unwrap_or(len),
                        len,
                    })?;
                *slot = value;
            }
            NodeData::Frozen(_) => {
                return Err(ArborError::WrongNodeKind {
                    node,
                    expected: "container".to_string(),
                    actual: "frozen".to_string(),
                })
            }
        }
        Ok(())
    }

    pub(crate) fn delete_slot(&mut self, node: NodeId, key: PathSegment) -> Result<Option<Value>> {
        match self.kind(node)? {
            crate::NodeKind::Object => {}
            crate::NodeKind::Array => {
                let len = self.array_len(node)?;
                let index = key
                    .as_index()
                    .filter(|i| *i < len)
                    .ok_or(ArborError::IndexOutOfBounds {
                        node,
                        index: key.as_index().unwrap_or(len),
                        len,
                    })?;
                let mut removed = self.splice_slots(node, index, 1, Vec::new())?;
                return Ok(removed.pop());
            }
            other => {
                return Err(ArborError::WrongNodeKind {
                    node,
                    expected: "object or array".to_string(),
                    actual: other.as_str().to_string(),
                })
            }
        }
        let name = key.as_key();

        let old = match &self.node(node)?.data {
            NodeData::Object(map) => map.get(&name).cloned(),
            _ => None,
        };
        let Some(old) = old else {
            return Ok(None);
        };

        let old_json = if self.is_recording_patches() {
            Some(self.value_json(&old)?)
        } else {
            None
        };
        let in_root_store = self.is_in_root_store(node)?;

        let position = match &mut self.node_mut(node)?.data {
            NodeData::Object(map) => map.shift_remove_full(&name).map(|(index, _, _)| index),
            _ => None,
        };
        if let Value::Node(child) = &old {
            self.node_mut(*child)?.parent = None;
        }
        if let Err(e) = self.check_enclosing_types(node) {
            if let NodeData::Object(map) = &mut self.node_mut(node)?.data {
                map.shift_insert(position.unwrap_or(map.len()), name.clone(), old.clone());
            }
            if let Value::Node(child) = &old {
                self.node_mut(*child)?.parent = Some(ParentLink {
                    parent: node,
                    key: PathSegment::Key(name),
                });
            }
            self.invalidate_snapshots(node);
            return Err(e);
        }
        let mut change = SlotChange::default();
        if let Value::Node(child) = &old {
            change.detached.push(*child);
        }
        if let Some(old_json) = old_json {
            let path = vec![PathSegment::Key(name)];
            change.patches.push(Patch::Remove {
                path: path.clone(),
                old_value: Some(old_json.clone()),
            });
            change.inverse.push(Patch::Add {
                path,
                value: old_json,
            });
        }
        self.finish_mutation(node, change, in_root_store)?;
        Ok(Some(old))
    }

    pub(crate) fn splice_slots(
        &mut self,
        node: NodeId,
        start: usize,
        delete_count: usize,
        items: Vec<Input>,
    ) -> Result<Vec<Value>> {
        let len = self.array_len(node)?;
        if start > len {
            return Err(ArborError::IndexOutOfBounds {
                node,
                index: start,
                len,
            });
        }
        let end = start + delete_count.min(len - start);
        let outgoing: Vec<Value> = match &self.node(node)?.data {
            NodeData::Array(current) => current[start..end].to_vec(),
            _ => Vec::new(),
        };

        let mut incoming = Vec::with_capacity(items.len());
        let mut created = Vec::with_capacity(items.len());
        for input in items {
            match self.prepare_input(input, IdMode::Keep) {
                Ok((value, fresh)) => {
                    incoming.push(value);
                    created.push(fresh);
                }
                Err(e) => {
                    self.discard_fresh(&incoming, &created);
                    return Err(e);
                }
            }
        }
        if let Err(e) = self.check_splice_items(node, &incoming, &outgoing) {
            self.discard_fresh(&incoming, &created);
            return Err(e);
        }

        let recording = self.is_recording_patches();
        let (removed_json, added_json) = if recording {
            (
                outgoing
                    .iter()
                    .map(|v| self.value_json(v))
                    .collect::<Result<Vec<_>>>()?,
                incoming
                    .iter()
                    .map(|v| self.value_json(v))
                    .collect::<Result<Vec<_>>>()?,
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let in_root_store = self.is_in_root_store(node)?;

        let removed: Vec<Value> = match &mut self.node_mut(node)?.data {
            NodeData::Array(current) => current.splice(start..end, incoming.iter().cloned()).collect(),
            _ => Vec::new(),
        };

        let mut change = SlotChange::default();
        for value in &removed {
            if let Value::Node(child) = value {
                if !incoming.contains(value) {
                    self.node_mut(*child)?.parent = None;
                }
                change.detached.push(*child);
            }
        }
        self.relink_from(node, start)?;
        if let Err(e) = self.check_enclosing_types(node) {
            if let NodeData::Array(current) = &mut self.node_mut(node)?.data {
                current
                    .splice(start..start + incoming.len(), removed.iter().cloned())
                    .for_each(drop);
            }
            for child in incoming.iter().filter_map(Value::as_node) {
                if !removed.contains(&Value::Node(child)) {
                    self.node_mut(child)?.parent = None;
                }
            }
            self.relink_from(node, start)?;
            self.invalidate_snapshots(node);
            self.discard_fresh(&incoming, &created);
            return Err(e);
        }
        change
            .attached
            .extend(incoming.iter().filter_map(Value::as_node));

        if recording {
            for (offset, old_json) in removed_json.into_iter().enumerate().rev() {
                let path = vec![PathSegment::Index(start + offset)];
                change.patches.push(Patch::Remove {
                    path: path.clone(),
                    old_value: Some(old_json.clone()),
                });
                change.inverse.push(Patch::Add {
                    path,
                    value: old_json,
                });
            }
            for (offset, new_json) in added_json.into_iter().enumerate() {
                let path = vec![PathSegment::Index(start + offset)];
                change.patches.push(Patch::Add {
                    path: path.clone(),
                    value: new_json.clone(),
                });
                change.inverse.push(Patch::Remove {
                    path,
                    old_value: Some(new_json),
                });
            }
        }
        self.finish_mutation(node, change, in_root_store)?;
        Ok(removed)
    }

    /// Point the parent links of array children at `start..` to their indices.
    fn relink_from(&mut self, node: NodeId, start: usize) -> Result<()> {
        let shifted: Vec<(usize, NodeId)> = match &self.node(node)?.data {
            NodeData::Array(current) => current
                .iter()
                .enumerate()
                .skip(start)
                .filter_map(|(i, v)| v.as_node().map(|child| (i, child)))
                .collect(),
            _ => Vec::new(),
        };
        for (index, child) in shifted {
            self.node_mut(child)?.parent = Some(ParentLink {
                parent: node,
                key: PathSegment::Index(index),
            });
        }
        Ok(())
    }

    fn discard_fresh(&mut self, values: &[Value], created: &[bool]) {
        for (value, fresh) in values.iter().zip(created) {
            if *fresh {
                self.discard_value(value);
            }
        }
    }

    fn check_splice_items(&self, node: NodeId, incoming: &[Value], outgoing: &[Value]) -> Result<()> {
        let mut seen_nodes = HashSet::new();
        let mut seen_ids = HashSet::new();
        for child in incoming.iter().filter_map(Value::as_node) {
            if !seen_nodes.insert(child) {
                return Err(ArborError::Hierarchy {
                    node: child,
                    reason: "the same node cannot be inserted twice".to_string(),
                });
            }
            self.check_attachable(child, node, outgoing)?;
            for (model_id, model_type) in self.model_ids_in(child) {
                if !seen_ids.insert(model_id.clone()) {
                    return Err(ArborError::DuplicateId {
                        model_id,
                        model_type,
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that `child` may be placed under `container`.
    ///
    /// `replaced` are values leaving the destination slots in the same
    /// operation; a child may be one of them, and their model ids do not count
    /// as taken.
    pub(crate) fn check_attachable(
        &self,
        child: NodeId,
        container: NodeId,
        replaced: &[Value],
    ) -> Result<()> {
        if let Some(link) = &self.node(child)?.parent {
            let moving_within = link.parent == container && replaced.contains(&Value::Node(child));
            if !moving_within {
                return Err(ArborError::Hierarchy {
                    node: child,
                    reason: format!(
                        "already attached to {} at '{}'; detach it or pass a snapshot instead",
                        link.parent, link.key
                    ),
                });
            }
        }
        if self.is_ancestor_or_self(child, container)? {
            return Err(ArborError::Hierarchy {
                node: child,
                reason: format!("cannot attach a node inside its own subtree ({})", container),
            });
        }
        self.check_unique_ids(child, container, replaced)
    }

    fn check_unique_ids(&self, child: NodeId, container: NodeId, replaced: &[Value]) -> Result<()> {
        let dest_root = self.get_root(container)?;
        for (model_id, model_type) in self.model_ids_in(child) {
            let Some(owners) = self.ids.get(&model_id) else {
                continue;
            };
            for owner in owners {
                if self.get_root(*owner)? != dest_root || self.is_ancestor_or_self(child, *owner)? {
                    continue;
                }
                let leaving = replaced
                    .iter()
                    .filter_map(Value::as_node)
                    .any(|r| self.is_ancestor_or_self(r, *owner).unwrap_or(false));
                if !leaving {
                    return Err(ArborError::DuplicateId {
                        model_id,
                        model_type,
                    });
                }
            }
        }
        Ok(())
    }

    /// `(model id, model type)` of every id-bearing model in a subtree
    pub(crate) fn model_ids_in(&self, root: NodeId) -> Vec<(String, String)> {
        self.walk_tree(root, crate::WalkOrder::ParentFirst)
            .filter_map(|n| match self.model_data(n) {
                Ok(ModelData {
                    id: Some(model_id),
                    class,
                    ..
                }) => Some((model_id.clone(), class.name.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn finish_mutation(
        &mut self,
        container: NodeId,
        change: SlotChange,
        in_root_store: bool,
    ) -> Result<()> {
        self.invalidate_snapshots(container);
        self.invalidate_ref_cache(container);
        if !change.attached.is_empty() || !change.detached.is_empty() {
            self.structure_version += 1;
        }
        if in_root_store {
            let left: Vec<NodeId> = change
                .detached
                .iter()
                .filter(|n| !change.attached.contains(n))
                .copied()
                .collect();
            let entered: Vec<NodeId> = change
                .attached
                .iter()
                .filter(|n| !change.detached.contains(n))
                .copied()
                .collect();
            self.fire_detached_hooks(&left)?;
            self.fire_attached_hooks(&entered)?;
        }
        self.emit_patches(container, change.patches, change.inverse)
    }

    /// Drop cached snapshots from `from` up to its root.
    pub(crate) fn invalidate_snapshots(&self, from: NodeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(&id) else {
                break;
            };
            let was_cached = node.snapshot.borrow_mut().take().is_some();
            // An uncached node never has a cached ancestor.
            if !was_cached && id != from {
                break;
            }
            current = node.parent.as_ref().map(|link| link.parent);
        }
    }

    fn invalidate_ref_cache(&self, container: NodeId) {
        let mut cache = self.ref_cache.borrow_mut();
        cache.remove(&container);
        if let Some(link) = self.nodes.get(&container).and_then(|n| n.parent.as_ref()) {
            cache.remove(&link.parent);
        }
    }
}
