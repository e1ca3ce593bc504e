//! Queries for the audit_log table: run lifecycle events and non-fatal
//! issues.

use canon_core::errors::{CanonErrorCode, RunIssue, StorageError};
use rusqlite::{params, Connection};

use crate::{from_sql_ts, sqlite_err, to_sql_ts};

pub const EVENT_RUN_STARTED: &str = "run_started";
pub const EVENT_RUN_COMPLETE: &str = "run_complete";
pub const EVENT_RUN_ABORTED: &str = "run_aborted";
pub const EVENT_ISSUE: &str = "issue";

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub run_id: String,
    pub timestamp: u64,
    pub event: String,
    pub unit: Option<String>,
    pub code: Option<String>,
    /// JSON payload.
    pub detail: String,
}

pub fn insert_entry(
    conn: &Connection,
    run_id: &str,
    timestamp: u64,
    event: &str,
    unit: Option<&str>,
    code: Option<&str>,
    detail: &str,
) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO audit_log (run_id, timestamp, event, unit, code, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![run_id, to_sql_ts(timestamp), event, unit, code, detail],
    )
    .map_err(sqlite_err)?;
    Ok(conn.last_insert_rowid())
}

/// Record a non-fatal issue with its error code and serialized form.
pub fn insert_issue(
    conn: &Connection,
    run_id: &str,
    timestamp: u64,
    issue: &RunIssue,
) -> Result<i64, StorageError> {
    let detail = serde_json::to_string(issue).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    insert_entry(
        conn,
        run_id,
        timestamp,
        EVENT_ISSUE,
        Some(issue.unit()),
        Some(issue.error_code()),
        &detail,
    )
}

pub fn query_by_run(conn: &Connection, run_id: &str) -> Result<Vec<AuditEntry>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, run_id, timestamp, event, unit, code, detail
             FROM audit_log WHERE run_id = ?1 ORDER BY id ASC",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![run_id], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                run_id: row.get(1)?,
                timestamp: from_sql_ts(row.get(2)?),
                event: row.get(3)?,
                unit: row.get(4)?,
                code: row.get(5)?,
                detail: row.get(6)?,
            })
        })
        .map_err(sqlite_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sqlite_err)
}

/// Issues of one run, decoded back from their stored JSON.
pub fn query_issues(conn: &Connection, run_id: &str) -> Result<Vec<RunIssue>, StorageError> {
    query_by_run(conn, run_id)?
        .into_iter()
        .filter(|e| e.event == EVENT_ISSUE)
        .map(|e| {
            serde_json::from_str(&e.detail).map_err(|err| StorageError::CorruptRow {
                table: "audit_log".to_string(),
                message: format!("entry {}: {err}", e.id),
            })
        })
        .collect()
}
