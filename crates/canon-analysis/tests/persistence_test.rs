//! Learner, engine and metrics wired to SQLite storage across two cycles.

use std::fs;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use canon_analysis::backends::{FsCheckpointStore, FsUnitEnumerator, FsWorkspace};
use canon_analysis::engine::{Collaborators, RefactorEngine};
use canon_analysis::learner::propose_all;
use canon_analysis::metrics::Observation;
use canon_analysis::oracle::{scan_all, RuleOracle, ViolationLedger};
use canon_analysis::{FixCatalog, MetricsEngine, PatternLearner, PatternRegistry, TransformRegistry};
use canon_core::config::{LearningConfig, MetricsConfig, RefactorConfig, RunMode};
use canon_core::errors::TestRunError;
use canon_core::events::EventDispatcher;
use canon_core::lock::WorkTreeLock;
use canon_core::traits::{TestOutcome, TestRunner, UnitEnumerator};
use canon_core::types::{AttemptOutcome, PatternStatus, UnitProfile, UnitRef, Violation};
use canon_storage::queries::{attempts, audit, snapshots, violations};
use canon_storage::{DatabaseManager, SqlitePatternStore};

const T0: u64 = 1_700_000_000;

struct Passing;

impl TestRunner for Passing {
    fn run_tests(&self, _unit: &UnitRef) -> Result<TestOutcome, TestRunError> {
        Ok(TestOutcome::passed(90.0))
    }
}

fn service(name: &str, debug: bool) -> String {
    let log = if debug { "  console.log(id);\n" } else { "" };
    format!("export function {name}(id: string) {{\n{log}  return repo.find(id);\n}}\n")
}

#[test]
fn test_two_cycles_persist_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    for (name, debug) in [
        ("users", true),
        ("orders", true),
        ("items", false),
        ("posts", false),
        ("tags", false),
    ] {
        fs::write(root.join(format!("src/{name}.ts")), service(name, debug)).unwrap();
    }

    let db = Arc::new(DatabaseManager::open(&root.join(".canon/canon.db")).unwrap());
    let catalog = FixCatalog::builtin().unwrap();
    let mut lock = WorkTreeLock::open(root).unwrap();

    // Cycle 1: scan and persist the ledger.
    let units = FsUnitEnumerator::new(root).enumerate().unwrap();
    let oracle = RuleOracle::builtin(&catalog).unwrap().with_cycle_timestamp(T0);
    let scan = scan_all(&oracle, &units, &[], &EventDispatcher::new());
    let mut ledger = ViolationLedger::new();
    ledger.reconcile(&scan.data.violations, &scan.data.scanned, T0);
    let all: Vec<Violation> = ledger.all().cloned().collect();
    db.with_writer(|conn| violations::upsert_violations(conn, &all)).unwrap();

    // Learn from the clean units' shape.
    {
        let lease = lock.try_read().unwrap();
        let profiles: Vec<UnitProfile> = units
            .iter()
            .map(|u| UnitProfile {
                unit: u.clone(),
                coverage_pct: 90.0,
                covered_lines: 3,
                has_regression_history: false,
                modified_at: T0 - 3_600,
                modification_count: 1,
            })
            .collect();
        let report = PatternLearner::new(&LearningConfig::default())
            .learn(&profiles, T0, &lease)
            .data;
        let registry = PatternRegistry::new(Arc::new(SqlitePatternStore::new(db.clone())));
        assert_eq!(propose_all(&registry, &report.candidates, T0).unwrap(), 1);
    }
    // Only the three clean services form a cluster large enough to propose.
    let reloaded = PatternRegistry::new(Arc::new(SqlitePatternStore::new(db.clone())));
    let proposed = reloaded.all().unwrap();
    assert_eq!(proposed.len(), 1);
    assert_eq!(proposed[0].status, PatternStatus::Proposed);
    assert_eq!(proposed[0].instance_count, 3);

    // Refactor with the ledger reloaded from storage.
    let mut ledger = ViolationLedger::from_violations(db.with_reader(violations::query_all).unwrap());
    let report = {
        let lease = lock.try_write().unwrap();
        let engine = RefactorEngine::new(
            RefactorConfig {
                mode: Some(RunMode::Auto),
                ..Default::default()
            },
            catalog.clone(),
            TransformRegistry::with_builtins().unwrap(),
            Collaborators {
                workspace: Arc::new(FsWorkspace::new(root)),
                tests: Arc::new(Passing),
                checkpoints: Arc::new(FsCheckpointStore::new(root)),
                oracle: Arc::new(RuleOracle::builtin(&FixCatalog::builtin().unwrap()).unwrap()),
            },
        )
        .unwrap();
        engine.run(&mut ledger, &lease)
    };
    assert_eq!(report.counts.applied, 2);

    db.with_writer(|conn| {
        attempts::insert_attempts(conn, &report.attempts)?;
        for issue in &report.issues {
            audit::insert_issue(conn, &report.run_id, T0 + 10, issue)?;
        }
        let all: Vec<Violation> = ledger.all().cloned().collect();
        violations::upsert_violations(conn, &all)?;
        Ok(())
    })
    .unwrap();

    // Cycle 2: metrics over persisted state. Attempts carry wall-clock
    // timestamps, so the snapshot does too.
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 1;
    let units = FsUnitEnumerator::new(root).enumerate().unwrap();
    let refs: Vec<UnitRef> = units.iter().map(|u| u.unit_ref.clone()).collect();
    let stored = db.with_reader(violations::query_all).unwrap();
    let recent = db
        .with_reader(|conn| attempts::query_finished_since(conn, 0))
        .unwrap();
    assert!(recent.iter().all(|a| a.outcome == AttemptOutcome::Applied));

    let mut metrics = MetricsEngine::new(MetricsConfig::default(), catalog)
        .with_history(db.with_reader(|conn| snapshots::query_recent(conn, 5)).unwrap());
    let snapshot = {
        let lease = lock.try_read().unwrap();
        metrics.collect(
            &Observation {
                timestamp: now,
                units: &refs,
                violations: &stored,
                coverage_pct: 90.0,
                patterns: &[],
                attempts: &recent,
            },
            &lease,
        )
    };
    db.with_writer(|conn| snapshots::insert_snapshot(conn, &snapshot)).unwrap();

    assert_eq!(snapshot.total_violations, 0);
    assert_eq!(snapshot.consistency_score, 100.0);
    assert_eq!(snapshot.refactors_applied, 2);
    assert_eq!(db.with_reader(violations::count_pending).unwrap(), 0);
    assert_eq!(db.with_reader(snapshots::query_all).unwrap(), vec![snapshot]);
}
