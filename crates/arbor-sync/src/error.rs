//! Error types for document and sync operations

use arbor_core::{ArborError, TreeId};
use thiserror::Error;

/// Errors raised by the registry, patch applier and gateway
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to decode {0}")]
    Decode(String),

    #[error("failed to apply update: {0}")]
    Apply(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("tree not found: {0}")]
    NotFound(TreeId),

    #[error("tree already exists: {0}")]
    AlreadyExists(TreeId),

    #[error("connection refused for target {0:?}")]
    Refused(String),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

impl From<SyncError> for ArborError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::InvalidPatch(msg) => ArborError::Validation(msg),
            SyncError::NotFound(id) => ArborError::NotFound(format!("tree {id}")),
            other => ArborError::Internal(other.to_string()),
        }
    }
}
