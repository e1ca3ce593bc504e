//! Queries for refactor_attempts.

use canon_core::errors::StorageError;
use canon_core::types::{AttemptOutcome, RefactorAttempt, TestVerdict, UnitRef};
use rusqlite::{params, Connection, Row};

use crate::{from_sql_ts, sqlite_err, to_sql_ts};

const COLUMNS: &str = "id, run_id, unit, fix_rule_id, violation_ids, pre_test_result, post_test_result,
     coverage_before, coverage_after, outcome, reason, checkpoint_token, commit_ref,
     dry_run, started_at, finished_at";

struct RawAttempt {
    id: String,
    run_id: String,
    unit: String,
    fix_rule_id: String,
    violation_ids: String,
    pre: String,
    post: String,
    coverage_before: Option<f64>,
    coverage_after: Option<f64>,
    outcome: String,
    reason: Option<String>,
    checkpoint_token: Option<String>,
    commit_ref: Option<String>,
    dry_run: bool,
    started_at: i64,
    finished_at: i64,
}

impl RawAttempt {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            run_id: row.get(1)?,
            unit: row.get(2)?,
            fix_rule_id: row.get(3)?,
            violation_ids: row.get(4)?,
            pre: row.get(5)?,
            post: row.get(6)?,
            coverage_before: row.get(7)?,
            coverage_after: row.get(8)?,
            outcome: row.get(9)?,
            reason: row.get(10)?,
            checkpoint_token: row.get(11)?,
            commit_ref: row.get(12)?,
            dry_run: row.get(13)?,
            started_at: row.get(14)?,
            finished_at: row.get(15)?,
        })
    }

    fn into_attempt(self) -> Result<RefactorAttempt, StorageError> {
        let corrupt = |message: String| StorageError::CorruptRow {
            table: "refactor_attempts".to_string(),
            message: format!("{}: {message}", self.id),
        };
        let verdict = |s: &str| {
            TestVerdict::parse_str(s).ok_or_else(|| corrupt(format!("unknown test verdict '{s}'")))
        };
        let pre_test_result = verdict(&self.pre)?;
        let post_test_result = verdict(&self.post)?;
        let outcome = AttemptOutcome::parse_str(&self.outcome)
            .ok_or_else(|| corrupt(format!("unknown outcome '{}'", self.outcome)))?;
        let violation_ids: Vec<String> =
            serde_json::from_str(&self.violation_ids).map_err(|e| corrupt(e.to_string()))?;

        Ok(RefactorAttempt {
            id: self.id,
            run_id: self.run_id,
            unit: UnitRef::new(self.unit),
            fix_rule_id: self.fix_rule_id,
            violation_ids,
            pre_test_result,
            post_test_result,
            coverage_before: self.coverage_before,
            coverage_after: self.coverage_after,
            outcome,
            reason: self.reason,
            checkpoint_token: self.checkpoint_token,
            commit_ref: self.commit_ref,
            dry_run: self.dry_run,
            started_at: from_sql_ts(self.started_at),
            finished_at: from_sql_ts(self.finished_at),
        })
    }
}

pub fn insert_attempt(conn: &Connection, a: &RefactorAttempt) -> Result<(), StorageError> {
    let violation_ids = serde_json::to_string(&a.violation_ids).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    conn.execute(
        &format!(
            "INSERT INTO refactor_attempts ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            a.id,
            a.run_id,
            a.unit.as_str(),
            a.fix_rule_id,
            violation_ids,
            a.pre_test_result.name(),
            a.post_test_result.name(),
            a.coverage_before,
            a.coverage_after,
            a.outcome.name(),
            a.reason,
            a.checkpoint_token,
            a.commit_ref,
            a.dry_run,
            to_sql_ts(a.started_at),
            to_sql_ts(a.finished_at),
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

/// Insert every attempt of a run in one transaction.
pub fn insert_attempts(conn: &Connection, attempts: &[RefactorAttempt]) -> Result<usize, StorageError> {
    let tx = conn.unchecked_transaction().map_err(sqlite_err)?;
    for a in attempts {
        insert_attempt(&tx, a)?;
    }
    tx.commit().map_err(sqlite_err)?;
    Ok(attempts.len())
}

fn query(conn: &Connection, sql: &str, param: rusqlite::types::Value) -> Result<Vec<RefactorAttempt>, StorageError> {
    let mut stmt = conn.prepare_cached(sql).map_err(sqlite_err)?;
    let raw = stmt
        .query_map([param], RawAttempt::from_row)
        .map_err(sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_err)?;
    raw.into_iter().map(RawAttempt::into_attempt).collect()
}

/// Attempts of one run in execution order.
pub fn query_by_run(conn: &Connection, run_id: &str) -> Result<Vec<RefactorAttempt>, StorageError> {
    query(
        conn,
        &format!("SELECT {COLUMNS} FROM refactor_attempts WHERE run_id = ?1 ORDER BY id ASC"),
        run_id.to_string().into(),
    )
}

/// Attempts finished at or after `since`. Feeds the throughput component.
pub fn query_finished_since(conn: &Connection, since: u64) -> Result<Vec<RefactorAttempt>, StorageError> {
    query(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM refactor_attempts WHERE finished_at >= ?1 ORDER BY finished_at ASC, id ASC"
        ),
        to_sql_ts(since).into(),
    )
}

/// History of one unit, newest first.
pub fn query_by_unit(conn: &Connection, unit: &UnitRef) -> Result<Vec<RefactorAttempt>, StorageError> {
    query(
        conn,
        &format!("SELECT {COLUMNS} FROM refactor_attempts WHERE unit = ?1 ORDER BY finished_at DESC, id DESC"),
        unit.as_str().to_string().into(),
    )
}

/// Units with at least one rolled-back attempt. Marks regression history
/// for the learner's quality gate.
pub fn units_with_rollbacks(conn: &Connection) -> Result<Vec<UnitRef>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT DISTINCT unit FROM refactor_attempts WHERE outcome = ?1 AND dry_run = 0 ORDER BY unit",
        )
        .map_err(sqlite_err)?;
    let units = stmt
        .query_map([AttemptOutcome::RolledBack.name()], |row| row.get::<_, String>(0))
        .map_err(sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_err)?;
    Ok(units.into_iter().map(UnitRef::new).collect())
}
