//! Queries for the append-only metric_snapshots series.

use std::collections::BTreeMap;

use canon_core::errors::StorageError;
use canon_core::types::{HealthComponents, MetricSnapshot, PatternStatus, Severity};
use rusqlite::{params, Connection, Row};

use crate::{from_sql_ts, sqlite_err, to_sql_ts};

const COLUMNS: &str = "timestamp, health_score, consistency_score, coverage_pct, debt_hours_estimate,
     total_violations, refactors_applied, refactors_rolled_back,
     violations_by_severity, patterns_by_status, components";

struct RawSnapshot {
    timestamp: i64,
    health_score: f64,
    consistency_score: f64,
    coverage_pct: f64,
    debt_hours_estimate: f64,
    total_violations: i64,
    refactors_applied: i64,
    refactors_rolled_back: i64,
    by_severity: String,
    by_status: String,
    components: String,
}

impl RawSnapshot {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            timestamp: row.get(0)?,
            health_score: row.get(1)?,
            consistency_score: row.get(2)?,
            coverage_pct: row.get(3)?,
            debt_hours_estimate: row.get(4)?,
            total_violations: row.get(5)?,
            refactors_applied: row.get(6)?,
            refactors_rolled_back: row.get(7)?,
            by_severity: row.get(8)?,
            by_status: row.get(9)?,
            components: row.get(10)?,
        })
    }

    fn into_snapshot(self) -> Result<MetricSnapshot, StorageError> {
        let by_severity = decode_counts(&self.by_severity, Severity::parse_str)?;
        let by_status = decode_counts(&self.by_status, PatternStatus::parse_str)?;
        let components: HealthComponents =
            serde_json::from_str(&self.components).map_err(|e| corrupt(e.to_string()))?;
        Ok(MetricSnapshot {
            timestamp: from_sql_ts(self.timestamp),
            consistency_score: self.consistency_score,
            violation_counts_by_severity: by_severity,
            debt_hours_estimate: self.debt_hours_estimate,
            health_score: self.health_score,
            coverage_pct: self.coverage_pct,
            total_violations: count(self.total_violations),
            patterns_by_status: by_status,
            refactors_applied: count(self.refactors_applied),
            refactors_rolled_back: count(self.refactors_rolled_back),
            components,
        })
    }
}

fn count(v: i64) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

fn corrupt(message: String) -> StorageError {
    StorageError::CorruptRow {
        table: "metric_snapshots".to_string(),
        message,
    }
}

/// Enum-keyed counts are stored as a JSON object keyed by the enum's name.
fn encode_counts<K: Copy>(counts: &BTreeMap<K, u32>, name: fn(&K) -> &'static str) -> Result<String, StorageError> {
    let named: BTreeMap<&str, u32> = counts.iter().map(|(k, v)| (name(k), *v)).collect();
    serde_json::to_string(&named).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })
}

fn decode_counts<K: Ord>(json: &str, parse: fn(&str) -> Option<K>) -> Result<BTreeMap<K, u32>, StorageError> {
    let named: BTreeMap<String, u32> = serde_json::from_str(json).map_err(|e| corrupt(e.to_string()))?;
    named
        .into_iter()
        .map(|(k, v)| {
            parse(&k)
                .map(|key| (key, v))
                .ok_or_else(|| corrupt(format!("unknown key '{k}'")))
        })
        .collect()
}

/// Append one snapshot. Returns the row id.
pub fn insert_snapshot(conn: &Connection, s: &MetricSnapshot) -> Result<i64, StorageError> {
    let components = serde_json::to_string(&s.components).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    conn.execute(
        &format!("INSERT INTO metric_snapshots ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            to_sql_ts(s.timestamp),
            s.health_score,
            s.consistency_score,
            s.coverage_pct,
            s.debt_hours_estimate,
            s.total_violations,
            s.refactors_applied,
            s.refactors_rolled_back,
            encode_counts(&s.violation_counts_by_severity, Severity::name)?,
            encode_counts(&s.patterns_by_status, PatternStatus::name)?,
            components,
        ],
    )
    .map_err(sqlite_err)?;
    Ok(conn.last_insert_rowid())
}

/// Snapshots at or after `since`, oldest first.
pub fn query_since(conn: &Connection, since: u64) -> Result<Vec<MetricSnapshot>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {COLUMNS} FROM metric_snapshots WHERE timestamp >= ?1 ORDER BY timestamp ASC, id ASC"
        ))
        .map_err(sqlite_err)?;
    let raw = stmt
        .query_map(params![to_sql_ts(since)], RawSnapshot::from_row)
        .map_err(sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_err)?;
    raw.into_iter().map(RawSnapshot::into_snapshot).collect()
}

/// The full series, oldest first.
pub fn query_all(conn: &Connection) -> Result<Vec<MetricSnapshot>, StorageError> {
    query_since(conn, 0)
}

/// The most recent `limit` snapshots, oldest first. Seeds the trend window.
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<MetricSnapshot>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {COLUMNS} FROM metric_snapshots ORDER BY timestamp DESC, id DESC LIMIT ?1"
        ))
        .map_err(sqlite_err)?;
    let raw = stmt
        .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], RawSnapshot::from_row)
        .map_err(sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_err)?;
    let mut snapshots = raw
        .into_iter()
        .map(RawSnapshot::into_snapshot)
        .collect::<Result<Vec<_>, _>>()?;
    snapshots.reverse();
    Ok(snapshots)
}

pub fn count_snapshots(conn: &Connection) -> Result<i64, StorageError> {
    conn.query_row("SELECT count(*) FROM metric_snapshots", [], |row| row.get(0))
        .map_err(sqlite_err)
}
