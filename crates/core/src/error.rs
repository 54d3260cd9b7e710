//! Unified error types for the telemetry engine.
//!
//! Error codes:
//! - VALID_001-002: Validation errors
//! - STORE_001: Event/heatmap store errors
//! - NOT_FOUND: Referenced entity absent
//! - EMBED_001-002: Embedding comparison errors
//! - AUTH_001: Dashboard access denied
//! - RATE_001: Rate limit errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes exposed to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// VALID_001: Malformed or incomplete input
    InvalidInput,
    /// VALID_002: Payload exceeds a size limit
    PayloadTooLarge,
    /// STORE_001: Collaborator read/write failure
    StoreFailed,
    /// NOT_FOUND: Referenced entity absent
    NotFound,
    /// EMBED_001: Embeddings of differing length compared
    DimensionMismatch,
    /// EMBED_002: Embeddings from different models compared
    ModelMismatch,
    /// AUTH_001: Missing or wrong dashboard token
    Unauthorized,
    /// RATE_001: Rate limit exceeded
    RateLimited,
    /// INTERNAL: Anything else
    Internal,
}

impl ErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput => "VALID_001",
            Self::PayloadTooLarge => "VALID_002",
            Self::StoreFailed => "STORE_001",
            Self::NotFound => "NOT_FOUND",
            Self::DimensionMismatch => "EMBED_001",
            Self::ModelMismatch => "EMBED_002",
            Self::Unauthorized => "AUTH_001",
            Self::RateLimited => "RATE_001",
            Self::Internal => "INTERNAL",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::PayloadTooLarge => 413,
            Self::StoreFailed => 500,
            Self::NotFound => 404,
            Self::DimensionMismatch | Self::ModelMismatch => 422,
            Self::Unauthorized => 401,
            Self::RateLimited => 429,
            Self::Internal => 500,
        }
    }
}

/// Unified error type for the telemetry engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any side effect.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Event or heatmap store unreachable or failed. Never retried here.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding model mismatch: expected {expected}, got {actual}")]
    ModelMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::PayloadTooLarge(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) | Self::Serialization(_) => ErrorCode::InvalidInput,
            Self::PayloadTooLarge(_) => ErrorCode::PayloadTooLarge,
            Self::Storage(_) => ErrorCode::StoreFailed,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            Self::ModelMismatch { .. } => ErrorCode::ModelMismatch,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        self.code().http_status()
    }

    /// True for failures of an external collaborator rather than of the input.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
