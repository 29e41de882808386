//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_CALL_ID: &str = "call_id";
pub const FIELD_FLOW_ID: &str = "flow_id";

// Tree identifiers
pub const FIELD_TARGET: &str = "target";
pub const FIELD_MODEL_TYPE: &str = "model_type";
pub const FIELD_FLOW_STEP: &str = "flow_step";

// Collection sizes
pub const FIELD_PATCH_COUNT: &str = "patch_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
