//! Unit workspace (read/write/enumerate) errors.

use super::error_code::{self, CanonErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Unit not found: {unit}")]
    NotFound { unit: String },

    #[error("Failed to read {unit}: {message}")]
    ReadFailed { unit: String, message: String },

    #[error("Failed to write {unit}: {message}")]
    WriteFailed { unit: String, message: String },

    #[error("Walk failed under {root}: {message}")]
    WalkFailed { root: String, message: String },
}

impl CanonErrorCode for WorkspaceError {
    fn error_code(&self) -> &'static str {
        error_code::WORKSPACE_ERROR
    }
}
