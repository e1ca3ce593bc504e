//! Checkpoint / commit provider errors.

use super::error_code::{self, CanonErrorCode};

/// Failure of the checkpoint provider. Save and restore failures are the
/// only unrecoverable condition of a refactor run.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint save failed for {unit}: {message}")]
    SaveFailed { unit: String, message: String },

    #[error("Checkpoint restore failed for token {token}: {message}")]
    RestoreFailed { token: String, message: String },

    #[error("Unknown checkpoint token {token}")]
    UnknownToken { token: String },

    #[error("Commit failed for {unit}: {message}")]
    CommitFailed { unit: String, message: String },
}

impl CanonErrorCode for CheckpointError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::CommitFailed { .. } => error_code::COMMIT_FAILED,
            _ => error_code::CHECKPOINT_FAILURE,
        }
    }
}
