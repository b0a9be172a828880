//! Error taxonomy shared by every request-handling layer

use thiserror::Error;

/// Errors surfaced at the request boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArborError {
    /// Malformed patch or request body
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing or unknown identity
    #[error("authentication required: {0}")]
    Auth(String),

    /// Missing capability, or not the owner
    #[error("permission denied: {0}")]
    Permission(String),

    /// Unknown tree or node
    #[error("not found: {0}")]
    NotFound(String),

    /// The external completion provider failed
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Anything unexpected
    #[error("internal error: {0}")]
    Internal(String),
}

impl ArborError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ArborError::Validation(_) => "validation_error",
            ArborError::Auth(_) => "auth_error",
            ArborError::Permission(_) => "permission_error",
            ArborError::NotFound(_) => "not_found",
            ArborError::Upstream(_) => "upstream_error",
            ArborError::Internal(_) => "internal_error",
        }
    }
}

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, ArborError>;
