//! Model class definitions: declared props, actions, hooks and snapshot processors.

use crate::action::flow::Flow;
use crate::errors::Result;
use crate::ops::Store;
use crate::reference::RefSpec;
use crate::snapshot::SnapshotMap;
use crate::types::Type;
use crate::value::{Input, NodeId, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Body of a synchronous model action
pub type ActionFn = Rc<dyn Fn(&mut Store, NodeId, &[Value]) -> Result<Value>>;

/// Creates the state machine for one run of a flow action
pub type FlowFactory = Rc<dyn Fn(NodeId, &[Value]) -> Box<dyn Flow>>;

/// Lifecycle hook body
pub type HookFn = Rc<dyn Fn(&mut Store, NodeId) -> Result<()>>;

/// Rewrites the prop map of a model snapshot on the way out
pub type ToSnapshotFn = Rc<dyn Fn(SnapshotMap) -> SnapshotMap>;

/// Rewrites an incoming model snapshot before it is read
pub type FromSnapshotFn =
    Rc<dyn Fn(serde_json::Map<String, serde_json::Value>) -> serde_json::Map<String, serde_json::Value>>;

/// Default for a prop that was not provided at creation.
#[derive(Clone)]
pub enum PropDefault {
    Literal(serde_json::Value),
    /// Called once per created model, so containers are never shared
    Factory(Rc<dyn Fn() -> serde_json::Value>),
}

impl PropDefault {
    pub(crate) fn to_input(&self) -> Input {
        match self {
            PropDefault::Literal(json) => Input::Json(json.clone()),
            PropDefault::Factory(make) => Input::Json(make()),
        }
    }
}

/// Declaration of one model prop.
#[derive(Clone, Default)]
pub struct PropDef {
    pub(crate) default: Option<PropDefault>,
    pub(crate) prop_type: Option<Type>,
}

impl PropDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(value: impl Into<serde_json::Value>) -> Self {
        Self {
            default: Some(PropDefault::Literal(value.into())),
            prop_type: None,
        }
    }

    pub fn with_default_fn(make: impl Fn() -> serde_json::Value + 'static) -> Self {
        Self {
            default: Some(PropDefault::Factory(Rc::new(make))),
            prop_type: None,
        }
    }

    /// Attach a runtime type, checked on every write when type checking is on
    pub fn typed(mut self, prop_type: Type) -> Self {
        self.prop_type = Some(prop_type);
        self
    }

    pub fn default_value(&self) -> Option<&PropDefault> {
        self.default.as_ref()
    }

    pub fn prop_type(&self) -> Option<&Type> {
        self.prop_type.as_ref()
    }
}

/// An action declared on a model class.
#[derive(Clone)]
pub enum ActionKind {
    Sync(ActionFn),
    Flow(FlowFactory),
}

/// A registered model type.
pub struct ModelClass {
    pub(crate) name: String,
    pub(crate) has_id: bool,
    pub(crate) props: IndexMap<String, PropDef>,
    pub(crate) actions: HashMap<String, ActionKind>,
    pub(crate) on_init: Option<HookFn>,
    pub(crate) on_attached_to_root_store: Option<HookFn>,
    pub(crate) on_detached_from_root_store: Option<HookFn>,
    pub(crate) to_snapshot: Option<ToSnapshotFn>,
    pub(crate) from_snapshot: Option<FromSnapshotFn>,
    pub(crate) reference: Option<RefSpec>,
}

impl ModelClass {
    pub fn builder(name: impl Into<String>) -> ModelClassBuilder {
        ModelClassBuilder {
            class: ModelClass {
                name: name.into(),
                has_id: true,
                props: IndexMap::new(),
                actions: HashMap::new(),
                on_init: None,
                on_attached_to_root_store: None,
                on_detached_from_root_store: None,
                to_snapshot: None,
                from_snapshot: None,
                reference: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether instances carry a `$modelId`
    pub fn has_id(&self) -> bool {
        self.has_id
    }

    /// Declared props in declaration order
    pub fn props(&self) -> impl Iterator<Item = (&str, &PropDef)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn prop(&self, name: &str) -> Option<&PropDef> {
        self.props.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&ActionKind> {
        self.actions.get(name)
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&String> = self.actions.keys().collect();
        actions.sort();
        f.debug_struct("ModelClass")
            .field("name", &self.name)
            .field("has_id", &self.has_id)
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .field("actions", &actions)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ModelClass`].
pub struct ModelClassBuilder {
    class: ModelClass,
}

impl ModelClassBuilder {
    pub fn prop(mut self, name: impl Into<String>, def: PropDef) -> Self {
        self.class.props.insert(name.into(), def);
        self
    }

    /// Instances of this class carry no `$modelId`
    pub fn without_id(mut self) -> Self {
        self.class.has_id = false;
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Store, NodeId, &[Value]) -> Result<Value> + 'static,
    {
        self.class
            .actions
            .insert(name.into(), ActionKind::Sync(Rc::new(body)));
        self
    }

    pub fn flow<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(NodeId, &[Value]) -> Box<dyn Flow> + 'static,
    {
        self.class
            .actions
            .insert(name.into(), ActionKind::Flow(Rc::new(factory)));
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Store, NodeId) -> Result<()> + 'static,
    {
        self.class.on_init = Some(Rc::new(hook));
        self
    }

    pub fn on_attached_to_root_store<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Store, NodeId) -> Result<()> + 'static,
    {
        self.class.on_attached_to_root_store = Some(Rc::new(hook));
        self
    }

    pub fn on_detached_from_root_store<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Store, NodeId) -> Result<()> + 'static,
    {
        self.class.on_detached_from_root_store = Some(Rc::new(hook));
        self
    }

    pub fn to_snapshot<F>(mut self, processor: F) -> Self
    where
        F: Fn(SnapshotMap) -> SnapshotMap + 'static,
    {
        self.class.to_snapshot = Some(Rc::new(processor));
        self
    }

    pub fn from_snapshot<F>(mut self, processor: F) -> Self
    where
        F: Fn(
                serde_json::Map<String, serde_json::Value>,
            ) -> serde_json::Map<String, serde_json::Value>
            + 'static,
    {
        self.class.from_snapshot = Some(Rc::new(processor));
        self
    }

    pub(crate) fn reference(mut self, spec: RefSpec) -> Self {
        self.class.reference = Some(spec);
        self
    }

    pub fn build(self) -> ModelClass {
        self.class
    }
}
