//! SQLite persistence for canon: the append-only metric snapshot series,
//! refactor attempts, the run audit log, patterns and violations.

pub mod connection;
pub mod migrations;
pub mod pattern_store;
pub mod queries;

pub use connection::DatabaseManager;
pub use pattern_store::SqlitePatternStore;

use canon_core::errors::StorageError;

pub(crate) fn sqlite_err(e: rusqlite::Error) -> StorageError {
    if let rusqlite::Error::SqliteFailure(err, message) = &e {
        if err.code == rusqlite::ErrorCode::DatabaseBusy {
            return StorageError::DbBusy;
        }
        if let Some(message) = message.as_deref().filter(|m| m.contains("append-only")) {
            return StorageError::ImmutableSnapshot {
                message: message.to_string(),
            };
        }
    }
    StorageError::SqliteError {
        message: e.to_string(),
    }
}

/// Unix seconds stored as INTEGER.
pub(crate) fn to_sql_ts(ts: u64) -> i64 {
    i64::try_from(ts).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_ts(ts: i64) -> u64 {
    u64::try_from(ts).unwrap_or(0)
}
