//! Auto-Refactor Engine.
//!
//! Applies catalog fixes one unit at a time. Each queue entry runs a
//! transactional protocol: pre-check, coverage baseline, checkpoint, apply,
//! post-check, then accept (commit + resolve) or restore. Units are never
//! processed in parallel, and cancellation is only observed between units.

pub mod queue;
pub mod report;

pub use queue::{ExcludedViolation, QueueEntry, RefactorQueue};
pub use report::{FatalRecord, RunCounts, RunReport, RunStatus};

use std::fmt::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashSet;
use xxhash_rust::xxh3::xxh3_64;

use canon_core::config::{RefactorConfig, RunMode};
use canon_core::errors::{CheckpointError, ConfigError, FatalAbort, RunIssue, TransformError};
use canon_core::events::types::{
    RefactorEvent, RunAbortedEvent, RunCompleteEvent, RunStartedEvent, ViolationResolvedEvent,
};
use canon_core::events::EventDispatcher;
use canon_core::lock::WriteLease;
use canon_core::traits::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, Cancellable, CancellationToken,
    CheckpointStore, CheckpointToken, DeferAll, TestRunner, UnitWorkspace,
};
use canon_core::types::{
    AttemptOutcome, RefactorAttempt, TestVerdict, Unit, UnitRef, Violation,
};

use crate::catalog::FixCatalog;
use crate::oracle::{base_id, ViolationLedger, ViolationOracle};
use crate::transforms::{Transform, TransformRegistry};

/// The black-box collaborators a run drives.
#[derive(Clone)]
pub struct Collaborators {
    pub workspace: Arc<dyn UnitWorkspace>,
    pub tests: Arc<dyn TestRunner>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Re-scans a fixed unit so only violations that are actually gone resolve.
    pub oracle: Arc<dyn ViolationOracle>,
}

pub struct RefactorEngine {
    config: RefactorConfig,
    catalog: FixCatalog,
    transforms: TransformRegistry,
    collaborators: Collaborators,
    approval: Arc<dyn ApprovalGate>,
    events: EventDispatcher,
    cancel: CancellationToken,
}

/// Mutable state of one run.
struct RunState {
    run_id: String,
    mode: RunMode,
    seq: u32,
    /// (unit, transform) pairs rolled back this run; never retried.
    reverted: FxHashSet<(UnitRef, String)>,
    issues: Vec<RunIssue>,
}

impl RunState {
    fn begin(&mut self, entry: &QueueEntry) -> RefactorAttempt {
        self.seq += 1;
        let now = now_secs();
        RefactorAttempt {
            id: format!("{}-{:04}", self.run_id, self.seq),
            run_id: self.run_id.clone(),
            unit: entry.unit.clone(),
            fix_rule_id: entry.rule.id.clone(),
            violation_ids: entry.violation_ids.clone(),
            pre_test_result: TestVerdict::NotRun,
            post_test_result: TestVerdict::NotRun,
            coverage_before: None,
            coverage_after: None,
            outcome: AttemptOutcome::Skipped,
            reason: None,
            checkpoint_token: None,
            commit_ref: None,
            dry_run: self.mode == RunMode::DryRun,
            started_at: now,
            finished_at: now,
        }
    }

    fn finish(
        &mut self,
        mut attempt: RefactorAttempt,
        outcome: AttemptOutcome,
        issue: Option<RunIssue>,
    ) -> RefactorAttempt {
        attempt.outcome = outcome;
        attempt.finished_at = now_secs();
        if let Some(issue) = issue {
            tracing::info!(
                unit = %attempt.unit,
                rule = %attempt.fix_rule_id,
                outcome = %outcome,
                reason = %issue.reason(),
                "unit finished"
            );
            attempt.reason = Some(issue.reason());
            self.issues.push(issue);
        }
        attempt
    }

    fn skip(&mut self, attempt: RefactorAttempt, issue: RunIssue) -> RefactorAttempt {
        self.finish(attempt, AttemptOutcome::Skipped, Some(issue))
    }
}

/// Result of one test subset run as the engine sees it. Runner errors and
/// timeouts are failures without a coverage reading.
struct Check {
    verdict: TestVerdict,
    coverage: Option<f64>,
}

impl RefactorEngine {
    /// Fails with `ConfigError` when a rule within the configured risk
    /// tolerance names a transform that is not registered.
    pub fn new(
        config: RefactorConfig,
        catalog: FixCatalog,
        transforms: TransformRegistry,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        let tolerance = config.effective_risk_tolerance();
        for rule in catalog.rules() {
            if rule.risk_tier.is_automatable()
                && tolerance.admits(rule.risk_tier)
                && !transforms.contains(&rule.transform_id)
            {
                return Err(ConfigError::InvalidCatalogEntry {
                    kind: rule.violation_kind.clone(),
                    message: format!("transform `{}` is not registered", rule.transform_id),
                });
            }
        }
        if config.effective_max_units_per_run() == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "refactor.max_units_per_run".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            config,
            catalog,
            transforms,
            collaborators,
            approval: Arc::new(DeferAll),
            events: EventDispatcher::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalGate>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn catalog(&self) -> &FixCatalog {
        &self.catalog
    }

    /// Build the queue the next run would process.
    pub fn plan(&self, ledger: &ViolationLedger) -> RefactorQueue {
        RefactorQueue::build(
            ledger.pending(),
            &self.catalog,
            self.config.effective_risk_tolerance(),
        )
    }

    /// Run the protocol over the pending violations in `ledger`.
    ///
    /// Resolved violations are closed in the ledger as attempts are
    /// accepted. A checkpoint failure halts the run with status `Fatal`.
    pub fn run(&self, ledger: &mut ViolationLedger, _lease: &WriteLease<'_>) -> RunReport {
        let mode = self.config.effective_mode();
        let budget = self.config.effective_max_units_per_run();
        let queue = self.plan(ledger);
        let run_id = new_run_id();

        let span = canon_core::refactor_run_span!(run_id, mode);
        let _guard = span.enter();

        tracing::info!(
            queued = queue.len(),
            excluded = queue.excluded.len(),
            budget,
            "refactor run started"
        );
        self.events.emit_run_started(&RunStartedEvent {
            run_id: run_id.clone(),
            queued_units: queue.len(),
            budget,
            mode: mode.name().to_string(),
        });

        let mut report = RunReport::new(run_id.clone(), mode == RunMode::DryRun, queue.excluded);
        let mut state = RunState {
            run_id: run_id.clone(),
            mode,
            seq: 0,
            reverted: FxHashSet::default(),
            issues: Vec::new(),
        };

        for entry in &queue.entries {
            if self.cancel.is_cancelled() {
                tracing::info!("cancellation observed between units");
                report.status = RunStatus::Cancelled;
                break;
            }
            if report.budget_used >= budget {
                tracing::info!(budget, "unit budget exhausted");
                report.status = RunStatus::BudgetExhausted;
                break;
            }

            let unit_span = canon_core::refactor_unit_span!(entry.unit, entry.rule.id);
            let _unit_guard = unit_span.enter();

            match self.process(&mut state, entry, ledger, &mut report) {
                Ok(attempt) => {
                    if consumes_budget(&attempt) {
                        report.budget_used += 1;
                    }
                    report.counts.record(attempt.outcome);
                    self.emit_attempt(entry, &attempt);
                    report.attempts.push(attempt);
                }
                Err(fatal) => {
                    tracing::error!(
                        unit = %entry.unit,
                        error = %fatal,
                        "checkpoint failure; halting run"
                    );
                    self.events.emit_run_aborted(&RunAbortedEvent {
                        run_id: run_id.clone(),
                        unit: entry.unit.to_string(),
                        message: fatal.to_string(),
                    });
                    report.counts.fatal_aborted += 1;
                    report.fatal = Some(FatalRecord {
                        unit: entry.unit.to_string(),
                        error: fatal,
                    });
                    report.status = RunStatus::Fatal;
                    break;
                }
            }
        }

        report.issues = state.issues;
        tracing::info!(
            status = %report.status,
            applied = report.counts.applied,
            rolled_back = report.counts.rolled_back,
            skipped = report.counts.skipped,
            "refactor run finished"
        );
        self.events.emit_run_complete(&RunCompleteEvent {
            run_id,
            status: report.status.name().to_string(),
            applied: report.counts.applied,
            rolled_back: report.counts.rolled_back,
            skipped: report.counts.skipped,
        });
        report
    }

    fn process(
        &self,
        state: &mut RunState,
        entry: &QueueEntry,
        ledger: &mut ViolationLedger,
        report: &mut RunReport,
    ) -> Result<RefactorAttempt, FatalAbort> {
        let mut attempt = state.begin(entry);
        let unit = entry.unit.to_string();

        if state
            .reverted
            .contains(&(entry.unit.clone(), entry.rule.transform_id.clone()))
        {
            let issue = RunIssue::PreviouslyReverted {
                unit,
                rule: entry.rule.id.clone(),
            };
            return Ok(state.skip(attempt, issue));
        }

        let transform = match self.transforms.get(&entry.rule.transform_id) {
            Some(t) => t,
            None => {
                let issue = RunIssue::NotEligible {
                    unit,
                    kind: entry.kind.clone(),
                    message: format!("transform `{}` is not registered", entry.rule.transform_id),
                };
                return Ok(state.skip(attempt, issue));
            }
        };

        if state.mode == RunMode::Auto
            && entry.rule.requires_approval
            && !self.config.is_pre_approved(&entry.kind)
        {
            let issue = RunIssue::NotEligible {
                unit,
                kind: entry.kind.clone(),
                message: format!(
                    "{} fix requires approval and is not pre-approved",
                    entry.rule.risk_tier
                ),
            };
            return Ok(state.skip(attempt, issue));
        }

        // Precondition: the unit's tests must already pass.
        let pre = self.check(&entry.unit);
        attempt.pre_test_result = pre.verdict;
        attempt.coverage_before = pre.coverage;
        let coverage_before = match (pre.verdict, pre.coverage) {
            (TestVerdict::Pass, Some(coverage)) => coverage,
            _ => return Ok(state.skip(attempt, RunIssue::PreconditionFailure { unit })),
        };

        if state.mode == RunMode::Interactive && entry.rule.requires_approval {
            let request = ApprovalRequest {
                unit: entry.unit.clone(),
                kind: entry.kind.clone(),
                rule_id: entry.rule.id.clone(),
                transform_id: entry.rule.transform_id.clone(),
                risk_tier: entry.rule.risk_tier,
                violation_count: entry.violation_ids.len(),
            };
            match self.approval.confirm(&request) {
                ApprovalDecision::Approve => {}
                ApprovalDecision::Defer => {
                    let issue = RunIssue::AwaitingApproval {
                        unit,
                        kind: entry.kind.clone(),
                    };
                    return Ok(state.skip(attempt, issue));
                }
                ApprovalDecision::Decline => {
                    let issue = RunIssue::Declined {
                        unit,
                        kind: entry.kind.clone(),
                    };
                    return Ok(state.skip(attempt, issue));
                }
            }
        }

        let original = match self.collaborators.workspace.read(&entry.unit) {
            Ok(content) => content,
            Err(e) => {
                let issue = RunIssue::TransformFailed {
                    unit,
                    transform_id: entry.rule.transform_id.clone(),
                    message: e.to_string(),
                };
                return Ok(state.skip(attempt, issue));
            }
        };
        let transformed = match apply_guarded(transform.as_ref(), &entry.unit, &original) {
            Ok(content) if content == original => {
                let issue = RunIssue::NoChange {
                    unit,
                    transform_id: entry.rule.transform_id.clone(),
                };
                return Ok(state.skip(attempt, issue));
            }
            Ok(content) => content,
            Err(e) => {
                let issue = RunIssue::TransformFailed {
                    unit,
                    transform_id: entry.rule.transform_id.clone(),
                    message: e.to_string(),
                };
                return Ok(state.skip(attempt, issue));
            }
        };

        if state.mode == RunMode::DryRun {
            return self.evaluate(state, attempt, entry, &original, &transformed, coverage_before);
        }

        let token = self
            .collaborators
            .checkpoints
            .save(&entry.unit)
            .map_err(|source| FatalAbort::CheckpointFailure {
                unit: unit.clone(),
                source,
            })?;
        attempt.checkpoint_token = Some(token.0.clone());

        if let Err(e) = self.collaborators.workspace.write(&entry.unit, &transformed) {
            self.restore(&token, &unit)?;
            let issue = RunIssue::TransformFailed {
                unit,
                transform_id: entry.rule.transform_id.clone(),
                message: e.to_string(),
            };
            return Ok(state.skip(attempt, issue));
        }

        let post = self.check(&entry.unit);
        attempt.post_test_result = post.verdict;
        attempt.coverage_after = post.coverage;

        if let Some(message) = regression(&post, coverage_before, self.tolerance()) {
            self.restore(&token, &unit)?;
            state
                .reverted
                .insert((entry.unit.clone(), entry.rule.transform_id.clone()));
            let issue = RunIssue::RegressionDetected { unit, message };
            return Ok(state.finish(attempt, AttemptOutcome::RolledBack, Some(issue)));
        }

        match self
            .collaborators
            .checkpoints
            .commit(&entry.unit, &commit_message(entry))
        {
            Ok(commit_ref) => attempt.commit_ref = Some(commit_ref.0),
            Err(e) => {
                self.restore(&token, &unit)?;
                state
                    .reverted
                    .insert((entry.unit.clone(), entry.rule.transform_id.clone()));
                let issue = RunIssue::CommitFailed {
                    unit,
                    message: e.to_string(),
                };
                return Ok(state.finish(attempt, AttemptOutcome::RolledBack, Some(issue)));
            }
        }

        let resolved_at = now_secs();
        for id in &self.settle(entry, &transformed, resolved_at, ledger) {
            if ledger.resolve_by_attempt(id, &attempt.id, resolved_at) {
                report.hours_saved += self.catalog.debt_hours_for(&entry.kind);
                self.events.emit_violation_resolved(&ViolationResolvedEvent {
                    violation_id: id.clone(),
                    unit: unit.clone(),
                    attempt_id: Some(attempt.id.clone()),
                });
            }
        }
        tracing::info!(
            unit = %unit,
            rule = %entry.rule.id,
            coverage_before,
            coverage_after = ?attempt.coverage_after,
            outcome = "applied",
            "fix accepted"
        );
        Ok(state.finish(attempt, AttemptOutcome::Applied, None))
    }

    /// Dry-run evaluation: the change is written, tested, then the original
    /// content is written back. Nothing is checkpointed, committed, or resolved.
    fn evaluate(
        &self,
        state: &mut RunState,
        mut attempt: RefactorAttempt,
        entry: &QueueEntry,
        original: &str,
        transformed: &str,
        coverage_before: f64,
    ) -> Result<RefactorAttempt, FatalAbort> {
        let unit = entry.unit.to_string();
        let workspace = &self.collaborators.workspace;

        if let Err(e) = workspace.write(&entry.unit, transformed) {
            self.write_back(&entry.unit, original)?;
            let issue = RunIssue::TransformFailed {
                unit,
                transform_id: entry.rule.transform_id.clone(),
                message: e.to_string(),
            };
            return Ok(state.skip(attempt, issue));
        }

        let post = self.check(&entry.unit);
        attempt.post_test_result = post.verdict;
        attempt.coverage_after = post.coverage;
        self.write_back(&entry.unit, original)?;

        let reason = match regression(&post, coverage_before, self.tolerance()) {
            None => "dry run: would apply".to_string(),
            Some(message) => format!("dry run: would roll back ({message})"),
        };
        tracing::info!(unit = %unit, rule = %entry.rule.id, reason = %reason, "dry run evaluated");
        attempt.reason = Some(reason);
        Ok(state.finish(attempt, AttemptOutcome::Skipped, None))
    }

    /// Entry ids the fixed content no longer exhibits. Leftovers of the
    /// entry's kind stay or become pending. A failed rescan resolves nothing.
    fn settle(
        &self,
        entry: &QueueEntry,
        transformed: &str,
        now: u64,
        ledger: &mut ViolationLedger,
    ) -> Vec<String> {
        let fixed = Unit::new(entry.unit.clone(), transformed);
        let found = match self.collaborators.oracle.scan(&fixed, &[]) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(unit = %entry.unit, error = %e, "rescan of fixed unit failed");
                return Vec::new();
            }
        };
        let leftovers: Vec<Violation> = found
            .into_iter()
            .filter(|v| v.kind == entry.kind)
            .map(|mut v| {
                v.detected_at = now;
                v
            })
            .collect();
        let present: FxHashSet<&str> = leftovers.iter().map(|v| v.id.as_str()).collect();
        let gone: Vec<String> = entry
            .violation_ids
            .iter()
            .filter(|id| !present.contains(base_id(id)))
            .cloned()
            .collect();
        if !leftovers.is_empty() {
            let kept = ledger.record_found(&leftovers);
            tracing::info!(
                unit = %entry.unit,
                kind = %entry.kind,
                remaining = kept.len(),
                "fix left violations behind"
            );
        }
        gone
    }

    fn check(&self, unit: &UnitRef) -> Check {
        match self.collaborators.tests.run_tests(unit) {
            Ok(outcome) => Check {
                verdict: outcome.verdict(),
                coverage: outcome.coverage,
            },
            Err(e) => {
                tracing::warn!(unit = %unit, error = %e, "test run failed");
                let verdict = match e {
                    canon_core::errors::TestRunError::Timeout { .. } => TestVerdict::TimedOut,
                    _ => TestVerdict::Fail,
                };
                Check {
                    verdict,
                    coverage: None,
                }
            }
        }
    }

    fn restore(&self, token: &CheckpointToken, unit: &str) -> Result<(), FatalAbort> {
        self.collaborators
            .checkpoints
            .restore(token)
            .map_err(|source| FatalAbort::CheckpointFailure {
                unit: unit.to_string(),
                source,
            })
    }

    fn write_back(&self, unit: &UnitRef, original: &str) -> Result<(), FatalAbort> {
        self.collaborators
            .workspace
            .write(unit, original)
            .map_err(|e| FatalAbort::CheckpointFailure {
                unit: unit.to_string(),
                source: CheckpointError::RestoreFailed {
                    token: "dry-run".to_string(),
                    message: e.to_string(),
                },
            })
    }

    fn tolerance(&self) -> f64 {
        self.config.effective_coverage_tolerance_pct()
    }

    fn emit_attempt(&self, entry: &QueueEntry, attempt: &RefactorAttempt) {
        let event = RefactorEvent {
            attempt_id: attempt.id.clone(),
            unit: attempt.unit.to_string(),
            rule: attempt.fix_rule_id.clone(),
            risk_tier: entry.rule.risk_tier,
            outcome: attempt.outcome,
            reason: attempt.reason.clone(),
        };
        match attempt.outcome {
            AttemptOutcome::Applied => self.events.emit_refactor_applied(&event),
            AttemptOutcome::RolledBack => self.events.emit_refactor_rolled_back(&event),
            AttemptOutcome::Skipped => self.events.emit_refactor_skipped(&event),
        }
    }
}

/// Why a post-check fails the decision rule, or `None` to accept.
fn regression(post: &Check, coverage_before: f64, tolerance: f64) -> Option<String> {
    if !post.verdict.is_pass() {
        return Some(format!("post-check {}", post.verdict.name()));
    }
    match post.coverage {
        Some(after) if after >= coverage_before - tolerance => None,
        Some(after) => Some(format!(
            "coverage dropped from {coverage_before:.1}% to {after:.1}%"
        )),
        None => Some("post-check reported no coverage".to_string()),
    }
}

/// Applied and rolled-back attempts consume budget; so does a dry-run
/// evaluation that reached its post-check.
fn consumes_budget(attempt: &RefactorAttempt) -> bool {
    attempt.consumes_budget()
        || (attempt.dry_run && attempt.post_test_result != TestVerdict::NotRun)
}

fn apply_guarded(
    transform: &dyn Transform,
    unit: &UnitRef,
    content: &str,
) -> Result<String, TransformError> {
    let input = Unit::new(unit.clone(), content);
    catch_unwind(AssertUnwindSafe(|| transform.apply(&input))).unwrap_or_else(|_| {
        Err(TransformError::Panicked {
            id: transform.id().to_string(),
            unit: unit.to_string(),
        })
    })
}

/// `fix(<kind>): auto-refactor <unit>` with the violation, rule, and tier in the body.
pub fn commit_message(entry: &QueueEntry) -> String {
    let mut message = format!("fix({}): auto-refactor {}\n\n", entry.kind, entry.unit);
    let summary = entry.rule.description.as_deref().unwrap_or(&entry.message);
    // Writing into a String cannot fail.
    let _ = writeln!(message, "{summary}");
    let _ = writeln!(message);
    let _ = writeln!(message, "Rule: {}", entry.rule.id);
    let _ = writeln!(message, "Transform: {}", entry.rule.transform_id);
    let _ = writeln!(message, "Risk: {}", entry.rule.risk_tier);
    let _ = writeln!(message, "Violations: {}", entry.violation_ids.len());
    message
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn new_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let pid = std::process::id();
    format!("run-{:012x}", xxh3_64(format!("{nanos}:{pid}").as_bytes()) >> 16)
}
