//! Connection pragmas.

use std::time::Duration;

use canon_core::errors::StorageError;
use rusqlite::Connection;

use crate::sqlite_err;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Writer pragmas: WAL, NORMAL sync, foreign keys, busy timeout.
pub fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    // journal_mode reports the resulting mode as a row.
    let _mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(sqlite_err)?;
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA temp_store = MEMORY;",
    )
    .map_err(sqlite_err)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(sqlite_err)
}

/// Reader pragmas: query-only plus the busy timeout.
pub fn apply_read_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch("PRAGMA query_only = ON;")
        .map_err(sqlite_err)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(sqlite_err)
}
