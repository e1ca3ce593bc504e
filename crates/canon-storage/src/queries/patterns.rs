//! Queries for the patterns table.

use canon_core::errors::StorageError;
use canon_core::types::{Pattern, PatternStatus, UnitRef};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{from_sql_ts, sqlite_err, to_sql_ts};

const COLUMNS: &str = "id, name, description, exemplars, status, instance_count, fingerprint,
     skeleton, deviations, created_at, updated_at";

struct RawPattern {
    id: String,
    name: String,
    description: String,
    exemplars: String,
    status: String,
    instance_count: i64,
    fingerprint: Option<String>,
    skeleton: Option<String>,
    deviations: String,
    created_at: i64,
    updated_at: i64,
}

impl RawPattern {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            exemplars: row.get(3)?,
            status: row.get(4)?,
            instance_count: row.get(5)?,
            fingerprint: row.get(6)?,
            skeleton: row.get(7)?,
            deviations: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_pattern(self) -> Result<Pattern, StorageError> {
        let corrupt = |message: String| StorageError::CorruptRow {
            table: "patterns".to_string(),
            message: format!("{}: {message}", self.id),
        };
        let status = PatternStatus::parse_str(&self.status)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", self.status)))?;
        let exemplars: Vec<String> =
            serde_json::from_str(&self.exemplars).map_err(|e| corrupt(e.to_string()))?;
        let deviations: Vec<String> =
            serde_json::from_str(&self.deviations).map_err(|e| corrupt(e.to_string()))?;
        Ok(Pattern {
            id: self.id,
            name: self.name,
            description: self.description,
            exemplars: exemplars.into_iter().map(UnitRef::new).collect(),
            status,
            instance_count: u32::try_from(self.instance_count).unwrap_or(0),
            fingerprint: self.fingerprint,
            skeleton: self.skeleton,
            deviations,
            created_at: from_sql_ts(self.created_at),
            updated_at: from_sql_ts(self.updated_at),
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })
}

/// Insert or replace by id.
pub fn upsert_pattern(conn: &Connection, p: &Pattern) -> Result<(), StorageError> {
    let exemplars: Vec<&str> = p.exemplars.iter().map(|e| e.as_str()).collect();
    conn.execute(
        &format!(
            "INSERT INTO patterns ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               description = excluded.description,
               exemplars = excluded.exemplars,
               status = excluded.status,
               instance_count = excluded.instance_count,
               fingerprint = excluded.fingerprint,
               skeleton = excluded.skeleton,
               deviations = excluded.deviations,
               updated_at = excluded.updated_at"
        ),
        params![
            p.id,
            p.name,
            p.description,
            to_json(&exemplars)?,
            p.status.name(),
            p.instance_count,
            p.fingerprint,
            p.skeleton,
            to_json(&p.deviations)?,
            to_sql_ts(p.created_at),
            to_sql_ts(p.updated_at),
        ],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn get_pattern(conn: &Connection, id: &str) -> Result<Option<Pattern>, StorageError> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM patterns WHERE id = ?1"),
            params![id],
            RawPattern::from_row,
        )
        .optional()
        .map_err(sqlite_err)?;
    raw.map(RawPattern::into_pattern).transpose()
}

/// All patterns ordered by id.
pub fn query_all(conn: &Connection) -> Result<Vec<Pattern>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!("SELECT {COLUMNS} FROM patterns ORDER BY id ASC"))
        .map_err(sqlite_err)?;
    let raw = stmt
        .query_map([], RawPattern::from_row)
        .map_err(sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_err)?;
    raw.into_iter().map(RawPattern::into_pattern).collect()
}

pub fn query_by_status(conn: &Connection, status: PatternStatus) -> Result<Vec<Pattern>, StorageError> {
    let mut stmt = conn
        .prepare_cached(&format!("SELECT {COLUMNS} FROM patterns WHERE status = ?1 ORDER BY id ASC"))
        .map_err(sqlite_err)?;
    let raw = stmt
        .query_map(params![status.name()], RawPattern::from_row)
        .map_err(sqlite_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_err)?;
    raw.into_iter().map(RawPattern::into_pattern).collect()
}
