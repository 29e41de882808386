//! Action pipeline
//!
//! Every mutation runs inside an action. An action call builds an
//! [`ActionContext`], threads it through the middlewares registered on the
//! target's ancestors and finally runs the action body.
//!
//! Flow actions are resumable state machines; each step of a flow runs as its
//! own action segment (spawn, resume, return, throw) sharing one root context.

pub mod context;
pub mod flow;
pub mod middleware;
pub mod pipeline;
pub mod scheduler;

pub use context::{ActionContext, ActionType, AsyncStepType};
pub use flow::{flow_fn, Flow, FlowInput, FlowStatus, FlowStep};
pub use middleware::{middleware_fn, ActionMiddleware, MiddlewareId, Next};
pub use scheduler::FlowScheduler;

pub const BUILTIN_APPLY_SNAPSHOT: &str = "$$applySnapshot";
pub const BUILTIN_APPLY_PATCHES: &str = "$$applyPatches";
pub const BUILTIN_DETACH: &str = "$$detach";
pub const BUILTIN_UNDO: &str = "$$undo";
pub const BUILTIN_REDO: &str = "$$redo";

/// Whether `name` is reserved for a built-in action
pub fn is_builtin_action(name: &str) -> bool {
    name.starts_with("$$")
}
