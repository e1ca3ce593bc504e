//! Configuration errors.

use super::error_code::{self, CanonErrorCode};

/// Errors raised while loading config or the Fix Catalog. Always surfaced
/// before any mutation of the working tree.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse config at {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    ValidationFailed { field: String, message: String },

    #[error("Invalid catalog entry {kind}: {message}")]
    InvalidCatalogEntry { kind: String, message: String },

    #[error("Invalid rule {kind}: {message}")]
    InvalidRule { kind: String, message: String },
}

impl CanonErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        error_code::CONFIG_ERROR
    }
}
