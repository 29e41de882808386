//! The store: an arena owning every tree node, plus the runtime state
//! (action stack, middlewares, listeners, flows) that operates on it.

use crate::action::context::ActionContext;
use crate::action::flow::FlowState;
use crate::action::middleware::MiddlewareEntry;
use crate::config::Config;
use crate::errors::{ArborError, Result};
use crate::model::ModelClass;
use crate::patch::emit::PatchListenerEntry;
use crate::registry::Registry;
use crate::snapshot::listeners::SnapshotListenerEntry;
use crate::snapshot::Snapshot;
use crate::value::{NodeId, PathSegment, Value};
use arbor_core_types::FlowId;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Shape of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    Model,
    Frozen,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::Model => "model",
            NodeKind::Frozen => "frozen",
        }
    }
}

/// Where a node hangs in its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: NodeId,
    pub key: PathSegment,
}

pub(crate) struct ModelData {
    pub(crate) class: Rc<ModelClass>,
    pub(crate) id: Option<String>,
    pub(crate) props: IndexMap<String, Value>,
}

pub(crate) enum NodeData {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
    Model(ModelData),
    /// Opaque data; never converted into child nodes
    Frozen(Snapshot),
}

impl NodeData {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            NodeData::Object(_) => NodeKind::Object,
            NodeData::Array(_) => NodeKind::Array,
            NodeData::Model(_) => NodeKind::Model,
            NodeData::Frozen(_) => NodeKind::Frozen,
        }
    }

    /// Child slot values in tree order
    pub(crate) fn slot_values(&self) -> Vec<Value> {
        match self {
            NodeData::Object(map) => map.values().cloned().collect(),
            NodeData::Array(items) => items.clone(),
            NodeData::Model(model) => model.props.values().cloned().collect(),
            NodeData::Frozen(_) => Vec::new(),
        }
    }
}

pub(crate) struct Node {
    pub(crate) data: NodeData,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) snapshot: RefCell<Option<Snapshot>>,
}

/// Handle to a registered patch or snapshot listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Arena of tree nodes and the runtime operating on them.
pub struct Store {
    pub(crate) nodes: HashMap<NodeId, Node>,
    next_node: u64,
    pub(crate) registry: Rc<Registry>,
    pub(crate) config: Config,
    /// Model id -> every live node carrying it (unique per tree, not per store)
    pub(crate) ids: HashMap<String, Vec<NodeId>>,
    /// Bumped on every attach/detach; keys the reference cache
    pub(crate) structure_version: u64,
    pub(crate) action_stack: Vec<Rc<ActionContext>>,
    pub(crate) middlewares: Vec<MiddlewareEntry>,
    pub(crate) next_handle: u64,
    pub(crate) patch_listeners: Vec<PatchListenerEntry>,
    pub(crate) snapshot_listeners: Vec<SnapshotListenerEntry>,
    pub(crate) flows: HashMap<FlowId, FlowState>,
    pub(crate) root_stores: HashSet<NodeId>,
    pub(crate) ref_cache: RefCell<HashMap<NodeId, (u64, Option<NodeId>)>>,
    /// While non-zero, writes below a model skip the check of its prop type
    pub(crate) deferred_type_checks: usize,
}

impl Store {
    /// A store using the thread's global registry and default config
    pub fn new() -> Self {
        Self::with_registry_and_config(Registry::global(), Config::default())
    }

    pub fn with_registry(registry: Rc<Registry>) -> Self {
        Self::with_registry_and_config(registry, Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_registry_and_config(Registry::global(), config)
    }

    pub fn with_registry_and_config(registry: Rc<Registry>, config: Config) -> Self {
        Self {
            nodes: HashMap::new(),
            next_node: 1,
            registry,
            config,
            ids: HashMap::new(),
            structure_version: 0,
            action_stack: Vec::new(),
            middlewares: Vec::new(),
            next_handle: 1,
            patch_listeners: Vec::new(),
            snapshot_listeners: Vec::new(),
            flows: HashMap::new(),
            root_stores: HashSet::new(),
            ref_cache: RefCell::new(HashMap::new()),
            deferred_type_checks: 0,
        }
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    // ===== Arena primitives =====

    pub(crate) fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        if let NodeData::Model(ModelData { id: Some(model_id), .. }) = &data {
            self.ids.entry(model_id.clone()).or_default().push(id);
        }
        self.nodes.insert(
            id,
            Node {
                data,
                parent: None,
                snapshot: RefCell::new(None),
            },
        );
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or(ArborError::NodeNotFound { node: id })
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or(ArborError::NodeNotFound { node: id })
    }

    pub(crate) fn model_data(&self, id: NodeId) -> Result<&ModelData> {
        match &self.node(id)?.data {
            NodeData::Model(model) => Ok(model),
            _ => Err(ArborError::NotAModel { node: id }),
        }
    }

    /// Remove a detached subtree from the arena.
    ///
    /// Used to roll back nodes created by a failed operation and by
    /// [`Store::release`].
    pub(crate) fn discard_subtree(&mut self, root: NodeId) {
        let doomed: Vec<NodeId> = self.walk_tree(root, crate::WalkOrder::ParentFirst).collect();
        for id in doomed {
            if let Some(node) = self.nodes.remove(&id) {
                if let NodeData::Model(ModelData {
                    id: Some(model_id), ..
                }) = &node.data
                {
                    if let Some(owners) = self.ids.get_mut(model_id) {
                        owners.retain(|owner| *owner != id);
                        if owners.is_empty() {
                            self.ids.remove(model_id);
                        }
                    }
                }
                self.ref_cache.borrow_mut().remove(&id);
            }
        }
    }

    pub(crate) fn discard_value(&mut self, value: &Value) {
        if let Value::Node(id) = value {
            self.discard_subtree(*id);
        }
    }

    /// Free a detached tree and everything registered on it.
    ///
    /// Nodes stay in the arena after they are detached or replaced, so a
    /// caller holding the handle can re-attach them. Releasing hands them
    /// back: the nodes are removed together with middlewares and listeners
    /// rooted inside the tree and flows targeting it. Handles into the tree
    /// fail with `NodeNotFound` afterwards. Releasing an unknown handle is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// `Hierarchy` if `node` still has a parent, is a registered root store,
    /// or the tree is the target of a running action.
    pub fn release(&mut self, node: NodeId) -> Result<()> {
        let Some(root) = self.nodes.get(&node) else {
            return Ok(());
        };
        if let Some(link) = &root.parent {
            return Err(ArborError::Hierarchy {
                node,
                reason: format!("still attached to {} at '{}'; detach it first", link.parent, link.key),
            });
        }
        if self.root_stores.contains(&node) {
            return Err(ArborError::Hierarchy {
                node,
                reason: "registered as a root store; unregister it first".to_string(),
            });
        }
        let doomed: HashSet<NodeId> = self.walk_tree(node, crate::WalkOrder::ParentFirst).collect();
        if let Some(ctx) = self.action_stack.iter().find(|ctx| doomed.contains(&ctx.target())) {
            return Err(ArborError::Hierarchy {
                node,
                reason: format!("action '{}' is running on {}", ctx.action_name(), ctx.target()),
            });
        }

        self.middlewares.retain(|entry| !doomed.contains(&entry.root));
        self.patch_listeners.retain(|entry| !doomed.contains(&entry.root));
        self.snapshot_listeners.retain(|entry| !doomed.contains(&entry.node));
        self.flows.retain(|_, flow| !doomed.contains(&flow.target));
        self.discard_subtree(node);
        tracing::debug!(node = %node, released = doomed.len(), "released detached tree");
        Ok(())
    }

    // ===== Read API =====

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Number of nodes currently held by the arena
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn kind(&self, node: NodeId) -> Result<NodeKind> {
        Ok(self.node(node)?.data.kind())
    }

    /// Read the value held at `key` of a container node.
    ///
    /// Missing object keys read as `Null`.
    ///
    /// # Errors
    ///
    /// `UnknownProp` for undeclared model props, `IndexOutOfBounds` for
    /// arrays and `WrongNodeKind` for frozen nodes.
    pub fn get(&self, node: NodeId, key: impl Into<PathSegment>) -> Result<Value> {
        let key = key.into();
        match &self.node(node)?.data {
            NodeData::Object(map) => Ok(map.get(&key.as_key()).cloned().unwrap_or(Value::Null)),
            NodeData::Model(model) => {
                model
                    .props
                    .get(&key.as_key())
                    .cloned()
                    .ok_or_else(|| ArborError::UnknownProp {
                        model_type: model.class.name.clone(),
                        prop: key.as_key(),
                    })
            }
            NodeData::Array(items) => {
                let index = key.as_index().ok_or_else(|| ArborError::WrongNodeKind {
                    node,
                    expected: "object".to_string(),
                    actual: "array".to_string(),
                })?;
                items
                    .get(index)
                    .cloned()
                    .ok_or(ArborError::IndexOutOfBounds {
                        node,
                        index,
                        len: items.len(),
                    })
            }
            NodeData::Frozen(_) => Err(ArborError::WrongNodeKind {
                node,
                expected: "container".to_string(),
                actual: "frozen".to_string(),
            }),
        }
    }

    /// Whether a container has a value at `key`
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn has(&self, node: NodeId, key: impl Into<PathSegment>) -> Result<bool> {
        let key = key.into();
        Ok(match &self.node(node)?.data {
            NodeData::Object(map) => map.contains_key(&key.as_key()),
            NodeData::Model(model) => model.props.contains_key(&key.as_key()),
            NodeData::Array(items) => key.as_index().is_some_and(|i| i < items.len()),
            NodeData::Frozen(_) => false,
        })
    }

    /// Object keys or model prop names, in order
    ///
    /// # Errors
    ///
    /// `WrongNodeKind` for arrays and frozen nodes.
    pub fn keys(&self, node: NodeId) -> Result<Vec<String>> {
        match &self.node(node)?.data {
            NodeData::Object(map) => Ok(map.keys().cloned().collect()),
            NodeData::Model(model) => Ok(model.props.keys().cloned().collect()),
            other => Err(ArborError::WrongNodeKind {
                node,
                expected: "object".to_string(),
                actual: other.kind().as_str().to_string(),
            }),
        }
    }

    /// Number of slots of a container node
    ///
    /// # Errors
    ///
    /// `WrongNodeKind` for frozen nodes.
    pub fn len(&self, node: NodeId) -> Result<usize> {
        match &self.node(node)?.data {
            NodeData::Object(map) => Ok(map.len()),
            NodeData::Array(items) => Ok(items.len()),
            NodeData::Model(model) => Ok(model.props.len()),
            NodeData::Frozen(_) => Err(ArborError::WrongNodeKind {
                node,
                expected: "container".to_string(),
                actual: "frozen".to_string(),
            }),
        }
    }

    /// Slot values of a container in tree order
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown handle.
    pub fn values(&self, node: NodeId) -> Result<Vec<Value>> {
        Ok(self.node(node)?.data.slot_values())
    }

    /// Data held by a frozen node
    ///
    /// # Errors
    ///
    /// `WrongNodeKind` when the node is not frozen.
    pub fn frozen_data(&self, node: NodeId) -> Result<Snapshot> {
        match &self.node(node)?.data {
            NodeData::Frozen(data) => Ok(data.clone()),
            other => Err(ArborError::WrongNodeKind {
                node,
                expected: "frozen".to_string(),
                actual: other.kind().as_str().to_string(),
            }),
        }
    }

    /// # Errors
    ///
    /// `NotAModel` when the node is not a model instance.
    pub fn model_class(&self, node: NodeId) -> Result<Rc<ModelClass>> {
        Ok(self.model_data(node)?.class.clone())
    }

    /// # Errors
    ///
    /// `NotAModel` when the node is not a model instance.
    pub fn model_type(&self, node: NodeId) -> Result<String> {
        Ok(self.model_data(node)?.class.name.clone())
    }

    /// # Errors
    ///
    /// `NotAModel` when the node is not a model instance.
    pub fn model_id(&self, node: NodeId) -> Result<Option<String>> {
        Ok(self.model_data(node)?.id.clone())
    }

    pub fn is_model(&self, node: NodeId) -> bool {
        self.model_data(node).is_ok()
    }

    /// Find the model with `model_id` inside the tree rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown root.
    pub fn find_by_id(&self, root: NodeId, model_id: &str) -> Result<Option<NodeId>> {
        self.node(root)?;
        let Some(owners) = self.ids.get(model_id) else {
            return Ok(None);
        };
        for owner in owners {
            if self.is_ancestor_or_self(root, *owner)? {
                return Ok(Some(*owner));
            }
        }
        Ok(None)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("nodes", &self.nodes.len())
            .field("action_depth", &self.action_stack.len())
            .field("middlewares", &self.middlewares.len())
            .field("flows", &self.flows.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
