//! Built-in middlewares and patch-driven helpers.
//!
//! - [`TransactionMiddleware`]: rolls a failed action's changes back
//! - [`ActionTrackingMiddleware`]: start/suspend/resume/finish callbacks,
//!   with flows reported as one call
//! - [`UndoManager`]: undo/redo stacks fed by patches

pub mod action_tracking;
pub mod transaction;
pub mod undo;

pub use action_tracking::{ActionTracker, ActionTrackingMiddleware, TrackingDecision};
pub use transaction::TransactionMiddleware;
pub use undo::{UndoEvent, UndoManager};
