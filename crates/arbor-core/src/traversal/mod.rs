//! Read-only tree navigation: parents, roots, paths and subtree walks.

pub mod navigation;
pub mod walk;

pub use navigation::RootPath;
pub use walk::{WalkOrder, WalkTree};
