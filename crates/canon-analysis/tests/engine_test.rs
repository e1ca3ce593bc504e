//! Auto-Refactor Engine: transactional protocol, modes, budget, and fatal abort.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use canon_analysis::engine::{Collaborators, RefactorEngine, RunStatus};
use canon_analysis::oracle::{violation_id, RuleOracle, ViolationLedger};
use canon_analysis::{FixCatalog, TransformRegistry};
use canon_core::config::{RefactorConfig, RiskTolerance, RunMode};
use canon_core::errors::{CheckpointError, RunIssue, TestRunError, WorkspaceError};
use canon_core::lock::WorkTreeLock;
use canon_core::traits::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, Cancellable, CheckpointStore,
    CheckpointToken, CommitRef, TestOutcome, TestRunner, UnitWorkspace,
};
use canon_core::types::{
    AttemptOutcome, Resolution, RiskTier, Severity, TestVerdict, UnitRef, Violation,
};
use rustc_hash::FxHashMap;

const CLEAN: &str = "export const a = 1;\n";
const DIRTY: &str = "console.log('debug');\nexport const a = 1;\n";

// ---- fakes -------------------------------------------------------------

#[derive(Default)]
struct MemWorkspace {
    files: Mutex<FxHashMap<UnitRef, String>>,
}

impl MemWorkspace {
    fn with_units(units: &[(&str, &str)]) -> Arc<Self> {
        let ws = Self::default();
        {
            let mut files = ws.files.lock().unwrap();
            for (path, content) in units {
                files.insert(UnitRef::new(*path), content.to_string());
            }
        }
        Arc::new(ws)
    }

    fn get(&self, unit: &str) -> String {
        self.files.lock().unwrap()[&UnitRef::new(unit)].clone()
    }
}

impl UnitWorkspace for MemWorkspace {
    fn read(&self, unit: &UnitRef) -> Result<String, WorkspaceError> {
        self.files
            .lock()
            .unwrap()
            .get(unit)
            .cloned()
            .ok_or_else(|| WorkspaceError::NotFound { unit: unit.to_string() })
    }

    fn write(&self, unit: &UnitRef, content: &str) -> Result<(), WorkspaceError> {
        self.files.lock().unwrap().insert(unit.clone(), content.to_string());
        Ok(())
    }
}

type Script = dyn Fn(&str, &str) -> Result<TestOutcome, TestRunError> + Send + Sync;

/// Test runner whose verdict is a function of (unit, current content).
struct ScriptedTests {
    workspace: Arc<MemWorkspace>,
    script: Box<Script>,
    calls: AtomicUsize,
}

impl ScriptedTests {
    fn new(
        workspace: Arc<MemWorkspace>,
        script: impl Fn(&str, &str) -> Result<TestOutcome, TestRunError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            workspace,
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    fn always_pass(workspace: Arc<MemWorkspace>) -> Arc<Self> {
        Self::new(workspace, |_, _| Ok(TestOutcome::passed(85.0)))
    }
}

impl TestRunner for ScriptedTests {
    fn run_tests(&self, unit: &UnitRef) -> Result<TestOutcome, TestRunError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self.workspace.get(unit.as_str());
        (self.script)(unit.as_str(), &content)
    }
}

/// Checkpoints held in memory. `fail_save_on` makes the n-th save (1-based) fail.
struct MemCheckpoints {
    workspace: Arc<MemWorkspace>,
    saved: Mutex<Vec<(UnitRef, String)>>,
    commits: Mutex<Vec<(UnitRef, String)>>,
    fail_save_on: Option<usize>,
    fail_restore: bool,
    fail_commit: bool,
}

impl MemCheckpoints {
    fn new(workspace: Arc<MemWorkspace>) -> Self {
        Self {
            workspace,
            saved: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            fail_save_on: None,
            fail_restore: false,
            fail_commit: false,
        }
    }

    fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }
}

impl CheckpointStore for MemCheckpoints {
    fn save(&self, unit: &UnitRef) -> Result<CheckpointToken, CheckpointError> {
        let mut saved = self.saved.lock().unwrap();
        if self.fail_save_on == Some(saved.len() + 1) {
            return Err(CheckpointError::SaveFailed {
                unit: unit.to_string(),
                message: "disk full".into(),
            });
        }
        saved.push((unit.clone(), self.workspace.get(unit.as_str())));
        Ok(CheckpointToken((saved.len() - 1).to_string()))
    }

    fn restore(&self, token: &CheckpointToken) -> Result<(), CheckpointError> {
        if self.fail_restore {
            return Err(CheckpointError::RestoreFailed {
                token: token.0.clone(),
                message: "backend gone".into(),
            });
        }
        let idx: usize = token.0.parse().map_err(|_| CheckpointError::UnknownToken {
            token: token.0.clone(),
        })?;
        let (unit, content) = self.saved.lock().unwrap()[idx].clone();
        self.workspace.write(&unit, &content).unwrap();
        Ok(())
    }

    fn commit(&self, unit: &UnitRef, message: &str) -> Result<CommitRef, CheckpointError> {
        if self.fail_commit {
            return Err(CheckpointError::CommitFailed {
                unit: unit.to_string(),
                message: "hook rejected".into(),
            });
        }
        let mut commits = self.commits.lock().unwrap();
        commits.push((unit.clone(), message.to_string()));
        Ok(CommitRef(format!("c{}", commits.len())))
    }
}

struct Scripted(ApprovalDecision);

impl ApprovalGate for Scripted {
    fn confirm(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        self.0
    }
}

// ---- helpers -----------------------------------------------------------

fn violation(unit: &str, kind: &str, severity: Severity, tier: RiskTier) -> Violation {
    violation_at(unit, kind, 1, severity, tier)
}

fn violation_at(unit: &str, kind: &str, line: u32, severity: Severity, tier: RiskTier) -> Violation {
    let unit_ref = UnitRef::new(unit);
    Violation {
        id: violation_id(&unit_ref, kind, line),
        unit: unit_ref,
        kind: kind.to_string(),
        pattern_id: None,
        line,
        message: format!("{kind} in {unit}"),
        severity,
        risk_tier: tier,
        detected_at: 100,
        resolved_at: None,
        resolution: None,
    }
}

fn oracle() -> Arc<RuleOracle> {
    Arc::new(RuleOracle::builtin(&FixCatalog::builtin().unwrap()).unwrap())
}

fn console_units(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("src/u{i:02}.ts")).collect()
}

fn setup(n: usize) -> (Arc<MemWorkspace>, ViolationLedger) {
    let units = console_units(n);
    let pairs: Vec<(&str, &str)> = units.iter().map(|u| (u.as_str(), DIRTY)).collect();
    let ws = MemWorkspace::with_units(&pairs);
    let ledger = ViolationLedger::from_violations(
        units
            .iter()
            .map(|u| violation(u, "console_log", Severity::Low, RiskTier::Low)),
    );
    (ws, ledger)
}

fn config(mode: RunMode, budget: u32) -> RefactorConfig {
    RefactorConfig {
        mode: Some(mode),
        max_units_per_run: Some(budget),
        ..Default::default()
    }
}

fn engine(
    config: RefactorConfig,
    ws: &Arc<MemWorkspace>,
    tests: Arc<ScriptedTests>,
    checkpoints: Arc<MemCheckpoints>,
) -> RefactorEngine {
    RefactorEngine::new(
        config,
        FixCatalog::builtin().unwrap(),
        TransformRegistry::with_builtins().unwrap(),
        Collaborators {
            workspace: ws.clone(),
            tests,
            checkpoints,
            oracle: oracle(),
        },
    )
    .unwrap()
}

// ---- scenarios ---------------------------------------------------------

#[test]
fn test_ten_low_risk_units_all_applied() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(10);
    let checkpoints = Arc::new(MemCheckpoints::new(ws.clone()));
    let engine = engine(
        config(RunMode::Auto, 10),
        &ws,
        ScriptedTests::always_pass(ws.clone()),
        checkpoints.clone(),
    );

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counts.applied, 10);
    assert_eq!(report.counts.rolled_back, 0);
    assert_eq!(checkpoints.commit_count(), 10);
    for unit in console_units(10) {
        assert_eq!(ws.get(&unit), CLEAN);
    }
    assert!(ledger.pending().is_empty());
    for v in ledger.all() {
        assert!(matches!(v.resolution, Some(Resolution::AutoRefactor { .. })));
    }
    assert!(report.attempts.iter().all(|a| a.satisfies_safety(1.0)));
    assert!((report.hours_saved - 1.0).abs() < 1e-9);
    let (_, message) = &checkpoints.commits.lock().unwrap()[0];
    assert!(message.starts_with("fix(console_log): auto-refactor src/u00.ts"));
}

#[test]
fn test_breaking_fix_is_rolled_back_and_violation_stays_pending() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(1);
    // Tests depend on the debug line existing.
    let tests = ScriptedTests::new(ws.clone(), |_, content| {
        if content.contains("console.log") {
            Ok(TestOutcome::passed(85.0))
        } else {
            Ok(TestOutcome::failed(85.0))
        }
    });
    let checkpoints = Arc::new(MemCheckpoints::new(ws.clone()));
    let engine = engine(config(RunMode::Auto, 10), &ws, tests, checkpoints.clone());

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.counts.rolled_back, 1);
    assert_eq!(report.counts.applied, 0);
    let attempt = &report.attempts[0];
    assert_eq!(attempt.outcome, AttemptOutcome::RolledBack);
    assert_eq!(attempt.pre_test_result, TestVerdict::Pass);
    assert_eq!(attempt.post_test_result, TestVerdict::Fail);
    assert_eq!(ws.get("src/u00.ts"), DIRTY);
    assert_eq!(ledger.pending().len(), 1);
    assert_eq!(checkpoints.commit_count(), 0);
    assert!(matches!(report.issues[0], RunIssue::RegressionDetected { .. }));
}

#[test]
fn test_coverage_drop_beyond_tolerance_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(2);
    let tests = ScriptedTests::new(ws.clone(), |unit, content| {
        let after = content == CLEAN;
        let coverage = match (unit, after) {
            ("src/u00.ts", true) => 79.5,
            ("src/u01.ts", true) => 78.0,
            _ => 80.0,
        };
        Ok(TestOutcome::passed(coverage))
    });
    let engine = engine(
        config(RunMode::Auto, 10),
        &ws,
        tests,
        Arc::new(MemCheckpoints::new(ws.clone())),
    );

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.attempts[0].outcome, AttemptOutcome::Applied);
    assert_eq!(report.attempts[1].outcome, AttemptOutcome::RolledBack);
    assert_eq!(ws.get("src/u01.ts"), DIRTY);
    assert!(report.attempts[1]
        .reason
        .as_deref()
        .unwrap()
        .contains("coverage dropped"));
}

#[test]
fn test_checkpoint_failure_on_fourth_unit_halts_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(10);
    let tests = ScriptedTests::always_pass(ws.clone());
    let mut checkpoints = MemCheckpoints::new(ws.clone());
    checkpoints.fail_save_on = Some(4);
    let engine = engine(config(RunMode::Auto, 10), &ws, tests.clone(), Arc::new(checkpoints));

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.status, RunStatus::Fatal);
    assert!(report.is_fatal());
    assert_eq!(report.counts.applied, 3);
    assert_eq!(report.counts.fatal_aborted, 1);
    assert_eq!(report.fatal.as_ref().unwrap().unit, "src/u03.ts");
    for unit in &console_units(10)[3..] {
        assert_eq!(ws.get(unit), DIRTY, "{unit} must be untouched");
    }
    // Pre-checks ran for units 1-4 only.
    assert_eq!(tests.calls.load(Ordering::SeqCst), 3 * 2 + 1);
    assert_eq!(ledger.pending().len(), 7);
}

#[test]
fn test_restore_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(3);
    let tests = ScriptedTests::new(ws.clone(), |_, content| {
        Ok(if content == CLEAN {
            TestOutcome::failed(80.0)
        } else {
            TestOutcome::passed(80.0)
        })
    });
    let mut checkpoints = MemCheckpoints::new(ws.clone());
    checkpoints.fail_restore = true;
    let engine = engine(config(RunMode::Auto, 10), &ws, tests, Arc::new(checkpoints));

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.status, RunStatus::Fatal);
    assert!(report.attempts.is_empty());
    assert_eq!(ws.get("src/u01.ts"), DIRTY);
}

#[test]
fn test_pre_existing_failure_skips_without_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(3);
    let tests = ScriptedTests::new(ws.clone(), |unit, _| {
        if unit == "src/u00.ts" {
            Ok(TestOutcome::failed(80.0))
        } else {
            Ok(TestOutcome::passed(80.0))
        }
    });
    let engine = engine(
        config(RunMode::Auto, 2),
        &ws,
        tests,
        Arc::new(MemCheckpoints::new(ws.clone())),
    );

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.counts.skipped, 1);
    assert_eq!(report.counts.applied, 2);
    assert_eq!(report.attempts[0].reason.as_deref(), Some("pre-existing failure"));
    assert_eq!(report.status, RunStatus::Completed);
}

#[test]
fn test_budget_bounds_applied_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(6);
    let tests = ScriptedTests::new(ws.clone(), |unit, content| {
        let broken = content == CLEAN && unit == "src/u01.ts";
        Ok(if broken { TestOutcome::failed(80.0) } else { TestOutcome::passed(80.0) })
    });
    let engine = engine(
        config(RunMode::Auto, 4),
        &ws,
        tests,
        Arc::new(MemCheckpoints::new(ws.clone())),
    );

    let report = engine.run(&mut ledger, &lease);

    let consumed = report
        .attempts
        .iter()
        .filter(|a| a.consumes_budget())
        .count();
    assert_eq!(consumed, 4);
    assert_eq!(report.status, RunStatus::BudgetExhausted);
    assert_eq!(ws.get("src/u05.ts"), DIRTY);
}

#[test]
fn test_dry_run_leaves_tree_and_ledger_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(3);
    let tests = ScriptedTests::always_pass(ws.clone());
    let checkpoints = Arc::new(MemCheckpoints::new(ws.clone()));
    let engine = engine(config(RunMode::DryRun, 10), &ws, tests.clone(), checkpoints.clone());

    let report = engine.run(&mut ledger, &lease);

    assert!(report.dry_run);
    assert_eq!(report.counts.skipped, 3);
    assert_eq!(report.counts.applied, 0);
    assert!(report
        .attempts
        .iter()
        .all(|a| a.dry_run && a.reason.as_deref() == Some("dry run: would apply")));
    assert!(report.attempts.iter().all(|a| a.post_test_result == TestVerdict::Pass));
    for unit in console_units(3) {
        assert_eq!(ws.get(&unit), DIRTY);
    }
    assert_eq!(ledger.pending().len(), 3);
    assert!(checkpoints.saved.lock().unwrap().is_empty());
    assert_eq!(checkpoints.commit_count(), 0);
    assert_eq!(tests.calls.load(Ordering::SeqCst), 6);
}

#[test]
fn test_cancellation_is_observed_between_units() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(5);
    let cancel = canon_core::traits::CancellationToken::new();
    let trigger = cancel.clone();
    let tests = ScriptedTests::new(ws.clone(), move |unit, content| {
        // Cancel while unit 2 is mid-protocol; it must still finish.
        if unit == "src/u01.ts" && content == CLEAN {
            trigger.cancel();
        }
        Ok(TestOutcome::passed(80.0))
    });
    let engine = engine(
        config(RunMode::Auto, 10),
        &ws,
        tests,
        Arc::new(MemCheckpoints::new(ws.clone())),
    )
    .with_cancellation(cancel);

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.counts.applied, 2);
    assert_eq!(ws.get("src/u01.ts"), CLEAN);
    assert_eq!(ws.get("src/u02.ts"), DIRTY);
}

#[test]
fn test_commit_failure_restores_unit() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(1);
    let mut checkpoints = MemCheckpoints::new(ws.clone());
    checkpoints.fail_commit = true;
    let engine = engine(
        config(RunMode::Auto, 10),
        &ws,
        ScriptedTests::always_pass(ws.clone()),
        Arc::new(checkpoints),
    );

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.counts.rolled_back, 1);
    assert_eq!(ws.get("src/u00.ts"), DIRTY);
    assert!(matches!(report.issues[0], RunIssue::CommitFailed { .. }));
    assert_eq!(ledger.pending().len(), 1);
}

#[test]
fn test_post_check_timeout_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(1);
    // The fixed unit hangs its test subset.
    let tests = ScriptedTests::new(ws.clone(), |unit, content| {
        if content == CLEAN {
            Err(TestRunError::Timeout {
                unit: unit.to_string(),
                timeout_secs: 1,
            })
        } else {
            Ok(TestOutcome::passed(85.0))
        }
    });
    let checkpoints = Arc::new(MemCheckpoints::new(ws.clone()));
    let engine = engine(config(RunMode::Auto, 10), &ws, tests, checkpoints.clone());

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.counts.rolled_back, 1);
    let attempt = &report.attempts[0];
    assert_eq!(attempt.outcome, AttemptOutcome::RolledBack);
    assert_eq!(attempt.post_test_result, TestVerdict::TimedOut);
    assert_eq!(attempt.coverage_after, None);
    assert_eq!(ws.get("src/u00.ts"), DIRTY);
    assert_eq!(ledger.pending().len(), 1);
    assert_eq!(checkpoints.commit_count(), 0);
    assert!(matches!(report.issues[0], RunIssue::RegressionDetected { .. }));
}

#[test]
fn test_missing_coverage_baseline_skips_unit() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(1);
    let tests = ScriptedTests::new(ws.clone(), |_, _| Ok(TestOutcome::passed_without_coverage()));
    let engine = engine(
        config(RunMode::Auto, 10),
        &ws,
        tests,
        Arc::new(MemCheckpoints::new(ws.clone())),
    );

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.counts.skipped, 1);
    assert_eq!(report.budget_used, 0);
    assert!(matches!(report.issues[0], RunIssue::PreconditionFailure { .. }));
    assert_eq!(ws.get("src/u00.ts"), DIRTY);
}

#[test]
fn test_missing_post_check_coverage_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger) = setup(1);
    let tests = ScriptedTests::new(ws.clone(), |_, content| {
        Ok(if content == CLEAN {
            TestOutcome::passed_without_coverage()
        } else {
            TestOutcome::passed(85.0)
        })
    });
    let engine = engine(
        config(RunMode::Auto, 10),
        &ws,
        tests,
        Arc::new(MemCheckpoints::new(ws.clone())),
    );

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.counts.rolled_back, 1);
    assert_eq!(ws.get("src/u00.ts"), DIRTY);
    match &report.issues[0] {
        RunIssue::RegressionDetected { message, .. } => assert!(message.contains("no coverage")),
        other => panic!("unexpected issue {other:?}"),
    }
}

/// Removes only the first line, however many debug calls the unit has.
struct FirstLineOnly;

impl canon_analysis::Transform for FirstLineOnly {
    fn id(&self) -> &str {
        "remove_console_log"
    }

    fn apply(&self, unit: &canon_core::types::Unit) -> Result<String, canon_core::errors::TransformError> {
        Ok(unit
            .content
            .split_once('\n')
            .map_or_else(String::new, |(_, rest)| rest.to_string()))
    }
}

#[test]
fn test_partial_fix_resolves_only_what_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let ws = MemWorkspace::with_units(&[(
        "src/two.ts",
        "console.log('a');\nconsole.log('b');\nexport const a = 1;\n",
    )]);
    let mut ledger = ViolationLedger::from_violations([
        violation_at("src/two.ts", "console_log", 1, Severity::Low, RiskTier::Low),
        violation_at("src/two.ts", "console_log", 2, Severity::Low, RiskTier::Low),
    ]);
    let mut transforms = TransformRegistry::with_builtins().unwrap();
    transforms.register(Arc::new(FirstLineOnly));
    let engine = RefactorEngine::new(
        config(RunMode::Auto, 10),
        FixCatalog::builtin().unwrap(),
        transforms,
        Collaborators {
            workspace: ws.clone(),
            tests: ScriptedTests::always_pass(ws.clone()),
            checkpoints: Arc::new(MemCheckpoints::new(ws.clone())),
            oracle: oracle(),
        },
    )
    .unwrap();

    let report = engine.run(&mut ledger, &lease);

    assert_eq!(report.counts.applied, 1);
    assert_eq!(ws.get("src/two.ts"), "console.log('b');\nexport const a = 1;\n");
    // One call is still in the unit: one violation stays pending.
    let pending = ledger.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].line, 1);
    let resolved: Vec<_> = ledger.all().filter(|v| !v.is_pending()).collect();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].line, 2);
    assert!(matches!(resolved[0].resolution, Some(Resolution::AutoRefactor { .. })));
    assert!((report.hours_saved - 0.1).abs() < 1e-9);
}

// ---- MEDIUM risk and approval ------------------------------------------

struct SseMigration;

impl canon_analysis::Transform for SseMigration {
    fn id(&self) -> &str {
        "migrate_to_sse"
    }

    fn apply(&self, unit: &canon_core::types::Unit) -> Result<String, canon_core::errors::TransformError> {
        Ok(unit.content.replace("setInterval(poll, 1000);", "subscribe(onEvent);"))
    }
}

/// Stand-in for an embedder-provided migration that is never queued here.
struct Unused(&'static str);

impl canon_analysis::Transform for Unused {
    fn id(&self) -> &str {
        self.0
    }

    fn apply(&self, unit: &canon_core::types::Unit) -> Result<String, canon_core::errors::TransformError> {
        Ok(unit.content.clone())
    }
}

fn medium_engine(mode: RunMode, pre_approved: &[&str], gate: ApprovalDecision) -> (Arc<MemWorkspace>, ViolationLedger, RefactorEngine) {
    let ws = MemWorkspace::with_units(&[("src/feed.ts", "setInterval(poll, 1000);\n")]);
    let ledger = ViolationLedger::from_violations([violation(
        "src/feed.ts",
        "polling",
        Severity::Medium,
        RiskTier::Medium,
    )]);
    let mut transforms = TransformRegistry::with_builtins().unwrap();
    transforms.register(Arc::new(SseMigration));
    transforms.register(Arc::new(Unused("add_zod_schema")));
    transforms.register(Arc::new(Unused("add_error_boundary")));
    let config = RefactorConfig {
        mode: Some(mode),
        risk_tolerance: Some(RiskTolerance::LowMedium),
        pre_approved: pre_approved.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    let engine = RefactorEngine::new(
        config,
        FixCatalog::builtin().unwrap(),
        transforms,
        Collaborators {
            workspace: ws.clone(),
            tests: ScriptedTests::always_pass(ws.clone()),
            checkpoints: Arc::new(MemCheckpoints::new(ws.clone())),
            oracle: oracle(),
        },
    )
    .unwrap()
    .with_approval(Arc::new(Scripted(gate)));
    (ws, ledger, engine)
}

#[test]
fn test_medium_tolerance_requires_registered_transforms() {
    let ws = MemWorkspace::with_units(&[]);
    let config = RefactorConfig {
        risk_tolerance: Some(RiskTolerance::LowMedium),
        ..Default::default()
    };
    let result = RefactorEngine::new(
        config,
        FixCatalog::builtin().unwrap(),
        TransformRegistry::with_builtins().unwrap(),
        Collaborators {
            workspace: ws.clone(),
            tests: ScriptedTests::always_pass(ws.clone()),
            checkpoints: Arc::new(MemCheckpoints::new(ws)),
            oracle: oracle(),
        },
    );
    assert!(matches!(
        result,
        Err(canon_core::errors::ConfigError::InvalidCatalogEntry { .. })
    ));
}

#[test]
fn test_interactive_medium_waits_for_approval() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (ws, mut ledger, engine) = medium_engine(RunMode::Interactive, &[], ApprovalDecision::Defer);
    let report = engine.run(&mut ledger, &lease);
    assert_eq!(report.counts.skipped, 1);
    assert!(matches!(report.issues[0], RunIssue::AwaitingApproval { .. }));
    assert_eq!(ws.get("src/feed.ts"), "setInterval(poll, 1000);\n");
    assert_eq!(report.budget_used, 0);

    let (ws, mut ledger, engine) = medium_engine(RunMode::Interactive, &[], ApprovalDecision::Approve);
    let report = engine.run(&mut ledger, &lease);
    assert_eq!(report.counts.applied, 1);
    assert_eq!(ws.get("src/feed.ts"), "subscribe(onEvent);\n");
}

#[test]
fn test_auto_mode_runs_only_pre_approved_medium() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let (_ws, mut ledger, engine) = medium_engine(RunMode::Auto, &[], ApprovalDecision::Approve);
    let report = engine.run(&mut ledger, &lease);
    assert!(matches!(report.issues[0], RunIssue::NotEligible { .. }));

    let (ws, mut ledger, engine) = medium_engine(RunMode::Auto, &["polling"], ApprovalDecision::Defer);
    let report = engine.run(&mut ledger, &lease);
    assert_eq!(report.counts.applied, 1);
    assert_eq!(ws.get("src/feed.ts"), "subscribe(onEvent);\n");
}

#[test]
fn test_high_risk_is_reported_as_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_write().unwrap();

    let ws = MemWorkspace::with_units(&[("src/page.tsx", "export default async function P() {}\n")]);
    let mut ledger = ViolationLedger::from_violations([violation(
        "src/page.tsx",
        "client_component_async",
        Severity::High,
        RiskTier::High,
    )]);
    let engine = engine(
        config(RunMode::Auto, 10),
        &ws,
        ScriptedTests::always_pass(ws.clone()),
        Arc::new(MemCheckpoints::new(ws.clone())),
    );
    let report = engine.run(&mut ledger, &lease);
    assert!(report.attempts.is_empty());
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].risk_tier, RiskTier::High);
    assert!(report.lines().iter().any(|l| l.starts_with("excluded")));
}
