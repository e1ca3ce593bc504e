//! Pattern registry errors.

use super::error_code::{self, CanonErrorCode};
use crate::types::PatternStatus;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Pattern not found: {id}")]
    NotFound { id: String },

    #[error("Pattern {id} already exists")]
    Duplicate { id: String },

    #[error("Cannot promote {id} from {from} to {to}: {reason}")]
    PromotionRejected {
        id: String,
        from: PatternStatus,
        to: PatternStatus,
        reason: String,
    },

    #[error("Pattern store error: {message}")]
    Store { message: String },
}

impl CanonErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PromotionRejected { .. } => error_code::PROMOTION_REJECTED,
            _ => error_code::REGISTRY_ERROR,
        }
    }
}
