//! References
//!
//! A reference is a small model node that names another node instead of
//! owning it: by model id (`id` prop) or by path from a root (`path` prop).
//! Resolution is lazy and cached per reference node. The cache entry is
//! dropped when the reference itself changes and ignored after any attach
//! or detach anywhere in the store.

use crate::errors::{ArborError, Result};
use crate::model::{ModelClass, PropDef};
use crate::ops::store::Store;
use crate::ops::tweak::Props;
use crate::types;
use crate::value::{path_to_pointer, NodeId, Path, PathSegment, Value};
use crate::WalkOrder;
use std::fmt;
use std::rc::Rc;

pub const REF_ID_PROP: &str = "id";
pub const REF_PATH_PROP: &str = "path";

/// Finds the root a reference resolves against, given the reference node
pub type RootFn = Rc<dyn Fn(&Store, NodeId) -> Option<NodeId>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    ById,
    ByPath,
}

/// Resolution settings carried by a reference model class.
#[derive(Clone)]
pub struct RefSpec {
    pub(crate) kind: RefKind,
    pub(crate) get_root: Option<RootFn>,
}

impl RefSpec {
    pub fn kind(&self) -> RefKind {
        self.kind
    }

    fn root(&self, store: &Store, reference: NodeId) -> Result<Option<NodeId>> {
        match &self.get_root {
            Some(get_root) => Ok(get_root(store, reference)),
            None => store.get_root(reference).map(Some),
        }
    }
}

impl fmt::Debug for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSpec")
            .field("kind", &self.kind)
            .field("custom_root", &self.get_root.is_some())
            .finish()
    }
}

/// Declaration of a reference type, registered with
/// [`Registry::register_ref`](crate::Registry::register_ref).
#[derive(Debug, Clone)]
pub struct RefType {
    name: String,
    spec: RefSpec,
}

impl RefType {
    /// References storing the target's model id
    pub fn by_id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: RefSpec {
                kind: RefKind::ById,
                get_root: None,
            },
        }
    }

    /// References storing the target's path from its root
    pub fn by_path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: RefSpec {
                kind: RefKind::ByPath,
                get_root: None,
            },
        }
    }

    /// Resolve against the node returned by `get_root` instead of the
    /// root of the reference's own tree.
    pub fn with_root<F>(mut self, get_root: F) -> Self
    where
        F: Fn(&Store, NodeId) -> Option<NodeId> + 'static,
    {
        self.spec.get_root = Some(Rc::new(get_root));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_class(self) -> ModelClass {
        let builder = ModelClass::builder(self.name).without_id();
        let builder = match self.spec.kind {
            RefKind::ById => builder.prop(REF_ID_PROP, PropDef::new().typed(types::string())),
            RefKind::ByPath => builder.prop(
                REF_PATH_PROP,
                PropDef::with_default(serde_json::json!([]))
                    .typed(types::array(types::or(vec![types::string(), types::integer()]))),
            ),
        };
        builder.reference(self.spec).build()
    }
}

/// What a reference points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Id(String),
    Path(Path),
}

impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Id(id) => write!(f, "{}", id),
            RefTarget::Path(path) => write!(f, "{}", path_to_pointer(path)),
        }
    }
}

impl Store {
    /// Create a detached reference of type `ref_type` pointing at `target`.
    ///
    /// By-id references need an id-bearing model target. By-path
    /// references record the target's path from its tree root.
    ///
    /// # Errors
    /// * `NotAReferenceType` - If `ref_type` is not a reference type
    /// * `ReferenceResolution` - If a by-id target has no model id
    pub fn create_ref(&mut self, ref_type: &str, target: NodeId) -> Result<NodeId> {
        let spec = self.ref_spec_of_type(ref_type)?;
        match spec.kind {
            RefKind::ById => {
                let id = self.model_id(target)?.ok_or_else(|| ArborError::ReferenceResolution {
                    ref_type: ref_type.to_string(),
                    target: target.to_string(),
                })?;
                self.create_ref_by_id(ref_type, &id)
            }
            RefKind::ByPath => {
                let path = self.get_root_path(target)?.path;
                self.create_ref_by_path(ref_type, &path)
            }
        }
    }

    /// Create a by-id reference from a raw id; the target need not exist yet.
    ///
    /// # Errors
    ///
    /// `NotAReferenceType`, or `ReferenceResolution` for a by-path type.
    pub fn create_ref_by_id(&mut self, ref_type: &str, id: &str) -> Result<NodeId> {
        let spec = self.ref_spec_of_type(ref_type)?;
        if spec.kind != RefKind::ById {
            return Err(ArborError::ReferenceResolution {
                ref_type: ref_type.to_string(),
                target: id.to_string(),
            });
        }
        self.create_model(ref_type, Props::new().set(REF_ID_PROP, id))
    }

    /// Create a by-path reference from a raw path.
    ///
    /// # Errors
    ///
    /// `NotAReferenceType`, or `ReferenceResolution` for a by-id type.
    pub fn create_ref_by_path(&mut self, ref_type: &str, path: &[PathSegment]) -> Result<NodeId> {
        let spec = self.ref_spec_of_type(ref_type)?;
        if spec.kind != RefKind::ByPath {
            return Err(ArborError::ReferenceResolution {
                ref_type: ref_type.to_string(),
                target: path_to_pointer(path),
            });
        }
        let json = serde_json::to_value(path)?;
        self.create_model(ref_type, Props::new().set(REF_PATH_PROP, json))
    }

    fn ref_spec_of_type(&self, ref_type: &str) -> Result<RefSpec> {
        self.registry
            .require(ref_type)?
            .reference
            .clone()
            .ok_or_else(|| ArborError::NotAReferenceType {
                name: ref_type.to_string(),
            })
    }

    fn ref_spec(&self, node: NodeId) -> Result<RefSpec> {
        self.model_data(node)?
            .class
            .reference
            .clone()
            .ok_or(ArborError::NotAReference { node })
    }

    pub fn is_ref(&self, node: NodeId) -> bool {
        self.model_data(node)
            .is_ok_and(|model| model.class.reference.is_some())
    }

    /// The id or path a reference names
    ///
    /// # Errors
    ///
    /// `NotAReference` when `node` is not a reference.
    pub fn ref_target(&self, node: NodeId) -> Result<RefTarget> {
        match self.ref_spec(node)?.kind {
            RefKind::ById => {
                let id = self.get(node, REF_ID_PROP)?;
                Ok(RefTarget::Id(id.as_str().unwrap_or_default().to_string()))
            }
            RefKind::ByPath => {
                let path = match self.get(node, REF_PATH_PROP)? {
                    Value::Node(list) => serde_json::from_value(self.get_snapshot_json(list)?)?,
                    _ => Vec::new(),
                };
                Ok(RefTarget::Path(path))
            }
        }
    }

    /// Resolve a reference; `None` when its target is not reachable.
    ///
    /// # Errors
    ///
    /// `NotAReference` when `node` is not a reference.
    pub fn resolve_ref(&self, node: NodeId) -> Result<Option<NodeId>> {
        let spec = self.ref_spec(node)?;
        if let Some((version, cached)) = self.ref_cache.borrow().get(&node) {
            if *version == self.structure_version {
                return Ok(*cached);
            }
        }

        let resolved = match spec.root(self, node)? {
            None => None,
            Some(root) if !self.contains(root) => None,
            Some(root) => match self.ref_target(node)? {
                RefTarget::Id(id) => self.find_by_id(root, &id)?,
                RefTarget::Path(path) => self.resolve_path(root, &path)?.and_then(|v| v.as_node()),
            },
        };
        self.ref_cache
            .borrow_mut()
            .insert(node, (self.structure_version, resolved));
        Ok(resolved)
    }

    /// Resolve a reference that must point at a live node.
    ///
    /// # Errors
    /// * `NotAReference` - If `node` is not a reference
    /// * `ReferenceResolution` - If the target cannot be reached
    pub fn resolve_ref_strict(&self, node: NodeId) -> Result<NodeId> {
        match self.resolve_ref(node)? {
            Some(target) => Ok(target),
            None => Err(ArborError::ReferenceResolution {
                ref_type: self.model_type(node)?,
                target: self.ref_target(node)?.to_string(),
            }),
        }
    }

    /// Every reference inside `root` that currently resolves to `target`
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown root.
    pub fn get_refs_resolving_to(&self, target: NodeId, root: NodeId) -> Result<Vec<NodeId>> {
        self.node(root)?;
        let mut found = Vec::new();
        for node in self.walk_tree(root, WalkOrder::ParentFirst) {
            if self.is_ref(node) && self.resolve_ref(node)? == Some(target) {
                found.push(node);
            }
        }
        Ok(found)
    }
}
