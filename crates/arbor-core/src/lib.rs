//! Arbor Core - Reactive state-tree runtime
//!
//! This crate keeps application state as a tree of plain objects, arrays,
//! typed models and frozen blobs, and provides:
//! - A node arena with parent tracking and single-parent enforcement
//! - Protected mutation through actions, with a middleware pipeline and
//!   resumable flows
//! - Immutable, structurally shared snapshots with reconciliation on apply
//! - JSON-patch style change streams with inverse patches, replay and undo
//! - Runtime type checking, references by id or path, and built-in
//!   collection models
//!
//! A [`Store`] is single-threaded; handles ([`NodeId`]) are only meaningful
//! for the store that issued them.

pub mod action;
pub mod collections;
pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod middlewares;
pub mod model;
pub mod ops;
pub mod patch;
pub mod reference;
pub mod registry;
pub mod snapshot;
pub mod traversal;
pub mod types;
pub mod value;

pub use arbor_core_types;

// Re-export commonly used types
pub use action::{
    flow_fn, middleware_fn, ActionContext, ActionMiddleware, AsyncStepType, FlowInput, FlowStatus,
    FlowStep, Next,
};
pub use config::{AutoTypeChecking, Config};
pub use errors::{ArborError, ExError, ExErrorKind, Result};
pub use model::{ModelClass, PropDef};
pub use ops::{ListenerId, NodeKind, ParentLink, Props, Store};
pub use patch::{Patch, PatchEvent};
pub use reference::{RefTarget, RefType};
pub use registry::Registry;
pub use snapshot::Snapshot;
pub use traversal::{RootPath, WalkOrder};
pub use types::{Type, TypeCheckError};
pub use value::{path_to_pointer, Input, NodeId, Path, PathSegment, Value};
