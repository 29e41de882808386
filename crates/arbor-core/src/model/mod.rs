//! Model classes and prop transforms.

pub mod class;
pub mod transforms;

pub use class::{
    ActionFn, ActionKind, FlowFactory, FromSnapshotFn, HookFn, ModelClass, ModelClassBuilder,
    PropDef, PropDefault, ToSnapshotFn,
};
pub use transforms::{IsoStringToDate, PropTransform, StringToBigInt, TimestampToDate};
