//! Schema migrations tracked through `PRAGMA user_version`.

pub mod v001_initial;

use canon_core::errors::StorageError;
use rusqlite::Connection;

use crate::sqlite_err;

/// Ordered (version, sql). Versions are contiguous from 1.
const MIGRATIONS: &[(u32, &str)] = &[(1, v001_initial::MIGRATION_SQL)];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(sqlite_err)
}

/// Apply every migration newer than the database's `user_version`, each in
/// its own transaction. Returns the number applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, StorageError> {
    let current = current_version(conn)?;
    let mut applied = 0;
    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let failed = |e: rusqlite::Error| StorageError::MigrationFailed {
            version: *version,
            message: e.to_string(),
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.execute_batch(&format!("PRAGMA user_version = {version};"))
            .map_err(failed)?;
        tx.commit().map_err(failed)?;
        tracing::info!(version, "migration applied");
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 1);
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn test_all_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        for table in ["metric_snapshots", "refactor_attempts", "audit_log", "patterns", "violations"] {
            let n: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(n, 1, "{table} missing");
        }
    }
}
