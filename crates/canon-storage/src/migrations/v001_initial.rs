//! V001: initial schema.
//! metric_snapshots, refactor_attempts, audit_log, patterns, violations.

pub const MIGRATION_SQL: &str = r#"
-- One row per scan cycle. Rows are never rewritten.
CREATE TABLE IF NOT EXISTS metric_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    health_score REAL NOT NULL,
    consistency_score REAL NOT NULL,
    coverage_pct REAL NOT NULL,
    debt_hours_estimate REAL NOT NULL,
    total_violations INTEGER NOT NULL,
    refactors_applied INTEGER NOT NULL,
    refactors_rolled_back INTEGER NOT NULL,
    violations_by_severity TEXT NOT NULL,
    patterns_by_status TEXT NOT NULL,
    components TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_metric_snapshots_timestamp
    ON metric_snapshots(timestamp);

CREATE TRIGGER IF NOT EXISTS metric_snapshots_no_update
    BEFORE UPDATE ON metric_snapshots
BEGIN
    SELECT RAISE(ABORT, 'metric_snapshots is append-only');
END;

CREATE TRIGGER IF NOT EXISTS metric_snapshots_no_delete
    BEFORE DELETE ON metric_snapshots
BEGIN
    SELECT RAISE(ABORT, 'metric_snapshots is append-only');
END;

CREATE TABLE IF NOT EXISTS refactor_attempts (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL,
    unit TEXT NOT NULL,
    fix_rule_id TEXT NOT NULL,
    violation_ids TEXT NOT NULL,
    pre_test_result TEXT NOT NULL,
    post_test_result TEXT NOT NULL,
    coverage_before REAL,
    coverage_after REAL,
    outcome TEXT NOT NULL,
    reason TEXT,
    checkpoint_token TEXT,
    commit_ref TEXT,
    dry_run INTEGER NOT NULL DEFAULT 0,
    started_at INTEGER NOT NULL,
    finished_at INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_refactor_attempts_run
    ON refactor_attempts(run_id);
CREATE INDEX IF NOT EXISTS idx_refactor_attempts_unit
    ON refactor_attempts(unit, finished_at);

-- Run-level events and non-fatal issues.
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    event TEXT NOT NULL,
    unit TEXT,
    code TEXT,
    detail TEXT NOT NULL DEFAULT '{}'
) STRICT;

CREATE INDEX IF NOT EXISTS idx_audit_log_run ON audit_log(run_id);
CREATE INDEX IF NOT EXISTS idx_audit_log_event ON audit_log(event);

CREATE TABLE IF NOT EXISTS patterns (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    exemplars TEXT NOT NULL,
    status TEXT NOT NULL,
    instance_count INTEGER NOT NULL,
    fingerprint TEXT,
    skeleton TEXT,
    deviations TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_patterns_status ON patterns(status);

CREATE TABLE IF NOT EXISTS violations (
    id TEXT PRIMARY KEY,
    unit TEXT NOT NULL,
    kind TEXT NOT NULL,
    pattern_id TEXT,
    line INTEGER NOT NULL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL,
    risk_tier TEXT NOT NULL,
    detected_at INTEGER NOT NULL,
    resolved_at INTEGER,
    resolution TEXT
) STRICT;

CREATE INDEX IF NOT EXISTS idx_violations_unit ON violations(unit);
CREATE INDEX IF NOT EXISTS idx_violations_pending
    ON violations(unit) WHERE resolved_at IS NULL;
"#;
