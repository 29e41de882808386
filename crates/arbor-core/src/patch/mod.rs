//! Patch engine
//!
//! Every primitive mutation produces one patch per changed slot, together
//! with the patch that undoes it. Listeners registered on a subtree receive
//! both lists with paths relative to their subtree root.
//!
//! ## Wire format
//!
//! ```json
//! { "op": "replace", "path": ["todos", 0, "done"], "value": true, "oldValue": false }
//! ```

pub mod apply;
pub mod emit;
pub mod recorder;
pub mod types;

pub use emit::PatchEvent;
pub use recorder::{PatchGroup, PatchRecorder};
pub use types::Patch;
