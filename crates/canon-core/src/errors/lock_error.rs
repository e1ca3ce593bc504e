//! Working-tree lock errors.

use super::error_code::{self, CanonErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Working tree lock {path} is held by another run")]
    Held { path: String },

    #[error("Lock I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl CanonErrorCode for LockError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Held { .. } => error_code::LOCK_HELD,
            Self::Io { .. } => error_code::LOCK_ERROR,
        }
    }
}
