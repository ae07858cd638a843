use thiserror::Error;

/// The outward error taxonomy for the data capture engine.
///
/// Every component returns one of these kinds; the facade is responsible for
/// making sure no lower-level storage detail leaks past this boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown field '{field}' for application '{application}'")]
    UnknownField { application: String, field: String },

    #[error("field '{field}' for application '{application}' is inactive")]
    InactiveField { application: String, field: String },

    #[error("invalid context: {0}")]
    InvalidContext(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl CaptureError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CaptureError::Conflict(_))
    }
}
