//! Storage errors.

use super::error_code::{self, CanonErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("Migration to version {version} failed: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Database busy")]
    DbBusy,

    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },

    #[error("Snapshots are append-only: {message}")]
    ImmutableSnapshot { message: String },
}

impl CanonErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        error_code::STORAGE_ERROR
    }
}
