pub mod lifecycle;
pub mod mutate;
pub mod store;
pub mod tweak;

pub use lifecycle::{
    HOOK_ON_ATTACHED_TO_ROOT_STORE, HOOK_ON_DETACHED_FROM_ROOT_STORE, HOOK_ON_INIT,
};
pub use store::{ListenerId, NodeKind, ParentLink, Store};
pub use tweak::Props;
