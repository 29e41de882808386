//! Snapshot engine
//!
//! Snapshots are immutable images of a subtree. They are computed lazily,
//! cached per node and dropped from the cache when the node or a descendant
//! changes, so unchanged subtrees keep returning the same allocation.
//!
//! ## Wire format
//!
//! - Model snapshots carry `$modelType` and, for id-bearing types, `$modelId`
//! - Frozen data is `{ "$frozen": true, "data": ... }`
//! - Plain objects and arrays map to JSON objects and arrays

pub mod apply;
pub mod digest;
pub mod from;
pub mod get;
pub mod listeners;
pub mod value;

pub use digest::{json_digest, snapshot_digest};
pub use value::{Snapshot, SnapshotMap};

pub const MODEL_TYPE_KEY: &str = "$modelType";
pub const MODEL_ID_KEY: &str = "$modelId";
pub const FROZEN_KEY: &str = "$frozen";
