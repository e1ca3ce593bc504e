//! Queries for the violations table.
//!
//! Resolution is one-way: an upsert may close a pending violation but never
//! reopens or rewrites a resolved one.

use canon_core::errors::StorageError;
use canon_core::types::{Resolution, RiskTier, Severity, UnitRef, Violation};
use rusqlite::{params, Connection, Row};

use crate::{from_sql_ts, sqlite_err, to_sql_ts};

const COLUMNS: &str = "id, unit, kind, pattern_id, line, message, severity, risk_tier,
     detected_at, resolved_at, resolution";

struct RawViolation {
    id: String,
    unit: String,
    kind: String,
    pattern_id: Option<String>,
    line: i64,
    message: String,
    severity: String,
    risk_tier: String,
    detected_at: i64,
    resolved_at: Option<i64>,
    resolution: Option<String>,
}

impl RawViolation {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            unit: row.get(1)?,
            kind: row.get(2)?,
            pattern_id: row.get(3)?,
            line: row.get(4)?,
            message: row.get(5)?,
            severity: row.get(6)?,
            risk_tier: row.get(7)?,
            detected_at: row.get(8)?,
            resolved_at: row.get(9)?,
            resolution: row.get(10)?,
        })
    }

    fn into_violation(self) -> Result<Violation, StorageError> {
        let corrupt = |message: String| StorageError::CorruptRow {
            table: "violations".to_string(),
            message: format!("{}: {message}", self.id),
        };
        let severity = Severity::parse_str(&self.severity)
            .ok_or_else(|| corrupt(format!("unknown severity '{}'", self.severity)))?;
        let risk_tier = RiskTier::parse_str(&self.risk_tier)
            .ok_or_else(|| corrupt(format!("unknown risk tier '{}'", self.risk_tier)))?;
        let resolution: Option<Resolution> = self
            .resolution
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;
        Ok(Violation {
            id: self.id,
            unit: UnitRef::new(self.unit),
            kind: self.kind,
            pattern_id: self.pattern_id,
            line: u32::try_from(self.line).unwrap_or(0),
            message: self.message,
            severity,
            risk_tier,
            detected_at: from_sql_ts(self.detected_at),
            resolved_at: self.resolved_at.map(from_sql_ts),
            resolution,
        })
    }
}

/// Insert new violations and record resolutions of pending ones.
pub fn upsert_violations(conn: &Connection, violations: &[Violation]) -> Result<usize, StorageError> {
    let tx = conn.unchecked_transaction().map_err(sqlite_err)?;
    {
        let mut stmt = tx
            .prepare_cached(&format!(
                "INSERT INTO violations ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                   resolved_at = excluded.resolved_at,
                   resolution = excluded.resolution
                 WHERE violations.resolved_at IS NULL AND excluded.resolved_at IS NOT NULL"
            ))
            .map_err(sqlite_err)?;
        for v in violations {
            let resolution = v
                .resolution
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| StorageError::SqliteError {
                    message: e.to_string(),
                })?;
            stmt.execute(params![
                v.id,
                v.unit.as_str(),
                v.kind,
                v.pattern_id,
                v.line,
                v.message,
                v.severity.name(),
                v.risk_tier.name(),
                to_sql_ts(v.detected_at),
                v.resolved_at.map(to_sql_ts),
                resolution,
            ])
            .map_err(sqlite_err)?;
        }
    }
    tx.commit().map_err(sqlite_err)?;
    Ok(violations.len())
}

fn query(conn: &Connection, sql: &str) -> Result<Vec<Violation>, StorageError> {
    let mut stmt = conn.prepare_cached(sql).map_err(sqlite_err)?;
    let raw = stmt
        .query_map([], RawViolation::from_row)
        .map_err(sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_err)?;
    raw.into_iter().map(RawViolation::into_violation).collect()
}

/// Every known violation ordered by id. Rebuilds the ledger between runs.
pub fn query_all(conn: &Connection) -> Result<Vec<Violation>, StorageError> {
    query(conn, &format!("SELECT {COLUMNS} FROM violations ORDER BY id ASC"))
}

pub fn query_pending(conn: &Connection) -> Result<Vec<Violation>, StorageError> {
    query(
        conn,
        &format!("SELECT {COLUMNS} FROM violations WHERE resolved_at IS NULL ORDER BY unit ASC, line ASC"),
    )
}

pub fn count_pending(conn: &Connection) -> Result<i64, StorageError> {
    conn.query_row(
        "SELECT count(*) FROM violations WHERE resolved_at IS NULL",
        [],
        |row| row.get(0),
    )
    .map_err(sqlite_err)
}
