use crate::types::TypeCheckError;
use crate::value::NodeId;
use arbor_core_types::{CallId, FlowId};
use thiserror::Error;

/// Result type alias using ArborError
pub type Result<T> = std::result::Result<T, ArborError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers can match on without
/// depending on the shape of [`ArborError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Tree structure
    Hierarchy,
    DuplicateId,
    NotFound,
    WrongNodeKind,
    IndexOutOfBounds,

    // Protection
    ActionContext,

    // Validation
    TypeCheck,
    InvalidInput,
    InvalidSnapshot,

    // Registry
    DuplicateModelType,
    UnknownModelType,

    // Patches and references
    Patch,
    ReferenceResolution,

    // Actions and flows
    ActionFailed,
    Flow,

    // Integration
    Config,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Hierarchy => "ERR_HIERARCHY",
            ExErrorKind::DuplicateId => "ERR_DUPLICATE_ID",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::WrongNodeKind => "ERR_WRONG_NODE_KIND",
            ExErrorKind::IndexOutOfBounds => "ERR_INDEX_OUT_OF_BOUNDS",
            ExErrorKind::ActionContext => "ERR_ACTION_CONTEXT",
            ExErrorKind::TypeCheck => "ERR_TYPE_CHECK",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidSnapshot => "ERR_INVALID_SNAPSHOT",
            ExErrorKind::DuplicateModelType => "ERR_DUPLICATE_MODEL_TYPE",
            ExErrorKind::UnknownModelType => "ERR_UNKNOWN_MODEL_TYPE",
            ExErrorKind::Patch => "ERR_PATCH",
            ExErrorKind::ReferenceResolution => "ERR_REFERENCE_RESOLUTION",
            ExErrorKind::ActionFailed => "ERR_ACTION_FAILED",
            ExErrorKind::Flow => "ERR_FLOW",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields for programmatic handling plus context for
/// debugging. Built from an [`ArborError`] at logging and API boundaries.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    node: Option<String>,
    model_type: Option<String>,
    path: Option<String>,
    call_id: Option<CallId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            node: None,
            model_type: None,
            path: None,
            call_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add node context
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Add model type context
    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self
    }

    /// Add path context
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add action call correlation
    pub fn with_call_id(mut self, call_id: CallId) -> Self {
        self.call_id = Some(call_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn model_type(&self) -> Option<&str> {
        self.model_type.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.call_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(node) = &self.node {
            write!(f, " (node: {})", node)?;
        }
        if let Some(model_type) = &self.model_type {
            write!(f, " (model_type: {})", model_type)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for tree, action and snapshot operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArborError {
    // ===== Structural Errors =====
    /// Attaching the node would give it two parents or make it its own ancestor
    #[error("Hierarchy violation for {node}: {reason}")]
    Hierarchy { node: NodeId, reason: String },

    /// Two models with the same id would share one tree
    #[error("Duplicate model id '{model_id}' ({model_type}) within one tree")]
    DuplicateId { model_id: String, model_type: String },

    #[error("Node not found: {node}")]
    NodeNotFound { node: NodeId },

    #[error("Expected {expected} node at {node}, found {actual}")]
    WrongNodeKind {
        node: NodeId,
        expected: String,
        actual: String,
    },

    #[error("Index {index} out of bounds for {node} (len {len})")]
    IndexOutOfBounds {
        node: NodeId,
        index: usize,
        len: usize,
    },

    // ===== Protection =====
    /// A tree mutation was attempted outside any running action
    #[error("Data changes must be performed inside an action (operation: {operation})")]
    ActionContext { operation: String },

    // ===== Validation =====
    #[error("Type check failed: {0}")]
    TypeCheck(TypeCheckError),

    #[error("Invalid snapshot: {reason}")]
    InvalidSnapshot { reason: String },

    #[error("Unknown prop '{prop}' for model type {model_type}")]
    UnknownProp { model_type: String, prop: String },

    #[error("Node {node} is not a model")]
    NotAModel { node: NodeId },

    // ===== Registry =====
    #[error("Model type already registered: {name}")]
    DuplicateModelType { name: String },

    #[error("Unknown model type: {name}")]
    UnknownModelType { name: String },

    // ===== Patches =====
    #[error("Cannot apply patch at '{path}': {reason}")]
    Patch { path: String, reason: String },

    // ===== References =====
    #[error("Node {node} is not a reference")]
    NotAReference { node: NodeId },

    #[error("Model type {name} is not a reference type")]
    NotAReferenceType { name: String },

    #[error("Reference {ref_type} to '{target}' could not be resolved")]
    ReferenceResolution { ref_type: String, target: String },

    // ===== Actions and Flows =====
    #[error("Unknown action '{action}' for model type {model_type}")]
    UnknownAction { model_type: String, action: String },

    /// Raised by action bodies (and middlewares) to fail an action
    #[error("Action '{action}' failed: {reason}")]
    ActionFailed { action: String, reason: String },

    #[error("Flow not found: {flow_id}")]
    FlowNotFound { flow_id: FlowId },

    #[error("Flow {flow_id} is not suspended")]
    FlowNotSuspended { flow_id: FlowId },

    // ===== Integration =====
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ArborError {
    /// Shorthand for failing an action body with a reason
    pub fn action_failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        ArborError::ActionFailed {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ExErrorKind {
        ExError::from(self.clone()).kind()
    }
}

impl From<ArborError> for ExError {
    fn from(err: ArborError) -> Self {
        let message = err.to_string();
        match err {
            ArborError::Hierarchy { node, .. } => ExError::new(ExErrorKind::Hierarchy)
                .with_node(node.to_string())
                .with_message(message),

            ArborError::DuplicateId { model_type, .. } => ExError::new(ExErrorKind::DuplicateId)
                .with_model_type(model_type)
                .with_message(message),

            ArborError::NodeNotFound { node } => ExError::new(ExErrorKind::NotFound)
                .with_node(node.to_string())
                .with_message("Node not found"),

            ArborError::WrongNodeKind { node, .. } | ArborError::NotAModel { node } => {
                ExError::new(ExErrorKind::WrongNodeKind)
                    .with_node(node.to_string())
                    .with_message(message)
            }

            ArborError::NotAReference { node } => ExError::new(ExErrorKind::WrongNodeKind)
                .with_node(node.to_string())
                .with_message(message),

            ArborError::NotAReferenceType { name } => ExError::new(ExErrorKind::InvalidInput)
                .with_model_type(name)
                .with_message(message),

            ArborError::IndexOutOfBounds { node, .. } => {
                ExError::new(ExErrorKind::IndexOutOfBounds)
                    .with_node(node.to_string())
                    .with_message(message)
            }

            ArborError::ActionContext { operation } => ExError::new(ExErrorKind::ActionContext)
                .with_op(operation)
                .with_message(message),

            ArborError::TypeCheck(ref check) => ExError::new(ExErrorKind::TypeCheck)
                .with_path(crate::value::path_to_pointer(&check.path))
                .with_message(message),

            ArborError::InvalidSnapshot { .. } => {
                ExError::new(ExErrorKind::InvalidSnapshot).with_message(message)
            }

            ArborError::UnknownProp { model_type, .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_model_type(model_type)
                .with_message(message),

            ArborError::DuplicateModelType { name } => {
                ExError::new(ExErrorKind::DuplicateModelType)
                    .with_model_type(name)
                    .with_message(message)
            }

            ArborError::UnknownModelType { name } => ExError::new(ExErrorKind::UnknownModelType)
                .with_model_type(name)
                .with_message(message),

            ArborError::Patch { path, .. } => ExError::new(ExErrorKind::Patch)
                .with_path(path)
                .with_message(message),

            ArborError::ReferenceResolution { ref_type, .. } => {
                ExError::new(ExErrorKind::ReferenceResolution)
                    .with_model_type(ref_type)
                    .with_message(message)
            }

            ArborError::UnknownAction { model_type, action } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_model_type(model_type)
                    .with_op(action)
                    .with_message(message)
            }

            ArborError::ActionFailed { action, .. } => ExError::new(ExErrorKind::ActionFailed)
                .with_op(action)
                .with_message(message),

            ArborError::FlowNotFound { .. } | ArborError::FlowNotSuspended { .. } => {
                ExError::new(ExErrorKind::Flow).with_message(message)
            }

            ArborError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }

            ArborError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            ArborError::Internal { .. } => ExError::new(ExErrorKind::Internal).with_message(message),
        }
    }
}

impl From<serde_json::Error> for ArborError {
    fn from(err: serde_json::Error) -> Self {
        ArborError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::Hierarchy, "ERR_HIERARCHY"),
            (ExErrorKind::ActionContext, "ERR_ACTION_CONTEXT"),
            (ExErrorKind::TypeCheck, "ERR_TYPE_CHECK"),
            (ExErrorKind::Patch, "ERR_PATCH"),
            (ExErrorKind::ReferenceResolution, "ERR_REFERENCE_RESOLUTION"),
            (ExErrorKind::DuplicateModelType, "ERR_DUPLICATE_MODEL_TYPE"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_hierarchy_maps_to_kind_with_node() {
        let err = ArborError::Hierarchy {
            node: NodeId(4),
            reason: "node already has a parent".to_string(),
        };
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::Hierarchy);
        assert_eq!(ex.node(), Some("node#4"));
        assert!(ex.message().contains("already has a parent"));
    }

    #[test]
    fn test_display_includes_code_and_op() {
        let ex: ExError = ArborError::ActionContext {
            operation: "set".to_string(),
        }
        .into();
        let rendered = ex.to_string();
        assert!(rendered.starts_with("[ERR_ACTION_CONTEXT]"));
        assert!(rendered.contains("'set'"));
    }

    #[test]
    fn test_serde_json_error_converts() {
        let err: ArborError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ExErrorKind::Serialization);
    }
}
