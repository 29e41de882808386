use crate::value::{NodeId, Value};
use arbor_core_types::{CallId, FlowId};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Sync,
    Flow,
}

/// Which segment of a flow an action context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncStepType {
    /// Runs the flow up to its first suspension
    Spawn,
    /// Continues after an awaited operation succeeded
    Resume,
    /// Continues after an awaited operation failed
    ResumeError,
    /// Delivers the flow's result
    Return,
    /// Delivers the flow's error
    Throw,
}

impl AsyncStepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsyncStepType::Spawn => "spawn",
            AsyncStepType::Resume => "resume",
            AsyncStepType::ResumeError => "resume_error",
            AsyncStepType::Return => "return",
            AsyncStepType::Throw => "throw",
        }
    }
}

/// Description of one running action call.
///
/// Contexts are immutable apart from the data bag, which middlewares use to
/// pass values between their before and after halves or between flow segments.
pub struct ActionContext {
    pub(crate) call_id: CallId,
    pub(crate) action_name: String,
    pub(crate) action_type: ActionType,
    pub(crate) async_step: Option<AsyncStepType>,
    pub(crate) flow_id: Option<FlowId>,
    pub(crate) target: NodeId,
    pub(crate) args: Vec<Value>,
    pub(crate) parent: Option<Rc<ActionContext>>,
    /// Spawn context of the flow this segment belongs to
    pub(crate) spawn: Option<Rc<ActionContext>>,
    pub(crate) previous_async_step: Option<Rc<ActionContext>>,
    data: RefCell<HashMap<&'static str, Box<dyn Any>>>,
}

impl ActionContext {
    pub(crate) fn new(
        target: NodeId,
        action_name: &str,
        action_type: ActionType,
        args: Vec<Value>,
        parent: Option<Rc<ActionContext>>,
    ) -> Self {
        Self {
            call_id: CallId::new(),
            action_name: action_name.to_string(),
            action_type,
            async_step: None,
            flow_id: None,
            target,
            args,
            parent,
            spawn: None,
            previous_async_step: None,
            data: RefCell::new(HashMap::new()),
        }
    }

    /// Turn a fresh context into the spawn segment of a new flow
    pub(crate) fn spawning(mut self, flow_id: FlowId) -> Self {
        self.async_step = Some(AsyncStepType::Spawn);
        self.flow_id = Some(flow_id);
        self
    }

    /// Context for a later segment of the flow started by `spawn`
    pub(crate) fn flow_segment(
        spawn: &Rc<ActionContext>,
        step: AsyncStepType,
        args: Vec<Value>,
        previous: Rc<ActionContext>,
        parent: Option<Rc<ActionContext>>,
    ) -> Self {
        let mut ctx = Self::new(
            spawn.target,
            &spawn.action_name,
            ActionType::Flow,
            args,
            parent,
        );
        ctx.async_step = Some(step);
        ctx.flow_id = spawn.flow_id.clone();
        ctx.spawn = Some(spawn.clone());
        ctx.previous_async_step = Some(previous);
        ctx
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn async_step(&self) -> Option<AsyncStepType> {
        self.async_step
    }

    pub fn flow_id(&self) -> Option<&FlowId> {
        self.flow_id.as_ref()
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn parent(&self) -> Option<&ActionContext> {
        self.parent.as_deref()
    }

    pub fn spawn_context(&self) -> Option<&ActionContext> {
        self.spawn.as_deref()
    }

    pub fn previous_async_step(&self) -> Option<&ActionContext> {
        self.previous_async_step.as_deref()
    }

    /// Whether no other action was running when this one started
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// The outermost context of this call chain.
    ///
    /// Every segment of a flow shares the root of its spawn context.
    pub fn root_context(&self) -> &ActionContext {
        if let Some(spawn) = &self.spawn {
            return spawn.root_context();
        }
        match &self.parent {
            Some(parent) => parent.root_context(),
            None => self,
        }
    }

    /// Call id of the root context; groups every action of one user call
    pub fn group_id(&self) -> &CallId {
        &self.root_context().call_id
    }

    pub fn set_data<T: Any>(&self, key: &'static str, value: T) {
        self.data.borrow_mut().insert(key, Box::new(value));
    }

    pub fn data<T: Any + Clone>(&self, key: &'static str) -> Option<T> {
        self.data
            .borrow()
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn take_data<T: Any>(&self, key: &'static str) -> Option<T> {
        let boxed = self.data.borrow_mut().remove(key)?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("call_id", &self.call_id)
            .field("action_name", &self.action_name)
            .field("action_type", &self.action_type)
            .field("async_step", &self.async_step)
            .field("target", &self.target)
            .field("top_level", &self.is_top_level())
            .finish_non_exhaustive()
    }
}
