//! End-of-run report.

use std::fmt;

use canon_core::errors::{FatalAbort, RunIssue};
use canon_core::types::{AttemptOutcome, RefactorAttempt};

use super::queue::ExcludedViolation;

/// How a run terminated. `BudgetExhausted` is normal termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    BudgetExhausted,
    Cancelled,
    Fatal,
}

impl RunStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub applied: u32,
    pub rolled_back: u32,
    pub skipped: u32,
    pub fatal_aborted: u32,
}

impl RunCounts {
    pub fn record(&mut self, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Applied => self.applied += 1,
            AttemptOutcome::RolledBack => self.rolled_back += 1,
            AttemptOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// The unit a fatal abort happened on.
#[derive(Debug)]
pub struct FatalRecord {
    pub unit: String,
    pub error: FatalAbort,
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub dry_run: bool,
    pub attempts: Vec<RefactorAttempt>,
    pub counts: RunCounts,
    /// Units whose budget-consuming work was done (applied + rolled back,
    /// or dry-run evaluations).
    pub budget_used: u32,
    pub excluded: Vec<ExcludedViolation>,
    pub issues: Vec<RunIssue>,
    pub fatal: Option<FatalRecord>,
    /// Sum of debt-hour estimates of the violations resolved this run.
    pub hours_saved: f64,
}

impl RunReport {
    pub(crate) fn new(run_id: String, dry_run: bool, excluded: Vec<ExcludedViolation>) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            dry_run,
            attempts: Vec::new(),
            counts: RunCounts::default(),
            budget_used: 0,
            excluded,
            issues: Vec::new(),
            fatal: None,
            hours_saved: 0.0,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.status == RunStatus::Fatal
    }

    pub fn attempts_with(&self, outcome: AttemptOutcome) -> impl Iterator<Item = &RefactorAttempt> {
        self.attempts.iter().filter(move |a| a.outcome == outcome)
    }

    /// One line per attempted unit, then the fatal unit and exclusions.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .attempts
            .iter()
            .map(|a| {
                let mut line = format!("{:<11} {} [{}]", a.outcome.name(), a.unit, a.fix_rule_id);
                if let Some(reason) = &a.reason {
                    line.push_str(": ");
                    line.push_str(reason);
                }
                line
            })
            .collect();
        if let Some(fatal) = &self.fatal {
            lines.push(format!("{:<11} {}: {}", "fatal", fatal.unit, fatal.error));
        }
        for ex in &self.excluded {
            lines.push(format!("{:<11} {} [{}]: {}", "excluded", ex.unit, ex.kind, ex.reason));
        }
        lines
    }

    pub fn summary(&self) -> String {
        format!(
            "run {} {}: {} applied, {} rolled back, {} skipped, {} fatal-aborted, {:.1}h saved",
            self.run_id,
            self.status,
            self.counts.applied,
            self.counts.rolled_back,
            self.counts.skipped,
            self.counts.fatal_aborted,
            self.hours_saved,
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for line in self.lines() {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}
