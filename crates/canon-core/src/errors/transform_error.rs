//! Transformation errors.

use super::error_code::{self, CanonErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Unknown transform: {id}")]
    UnknownTransform { id: String },

    #[error("Transform {id} does not apply to {unit}: {message}")]
    NotApplicable {
        id: String,
        unit: String,
        message: String,
    },

    #[error("Transform {id} panicked on {unit}")]
    Panicked { id: String, unit: String },
}

impl CanonErrorCode for TransformError {
    fn error_code(&self) -> &'static str {
        error_code::TRANSFORM_ERROR
    }
}
