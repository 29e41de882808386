//! Core types shared across Arbor facilities
//!
//! This crate provides foundational types used by the action pipeline, the
//! error facility and the logging facility:
//!
//! - **Correlation types**: CallId, FlowId
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{CallId, FlowId};
