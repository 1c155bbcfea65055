use thiserror::Error;

/// Errors produced by type parsing and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("invalid status '{0}': expected one of queued, processing, completed")]
    InvalidStatus(String),

    #[error("invalid sort '{0}': expected asc or desc")]
    InvalidSort(String),

    #[error("'{field}' expected to be a non-negative integer, '{value}' received")]
    InvalidInteger { field: &'static str, value: String },
}
