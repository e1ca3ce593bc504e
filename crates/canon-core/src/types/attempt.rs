//! Refactor attempts: the audit record of one unit's transactional protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::unit::UnitRef;

/// Result of one test subset execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestVerdict {
    Pass,
    Fail,
    TimedOut,
    NotRun,
}

impl TestVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::TimedOut => "timed_out",
            Self::NotRun => "not_run",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            "timed_out" => Some(Self::TimedOut),
            "not_run" => Some(Self::NotRun),
            _ => None,
        }
    }
}

/// Final state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Applied,
    RolledBack,
    Skipped,
}

impl AttemptOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::RolledBack => "rolled_back",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(Self::Applied),
            "rolled_back" => Some(Self::RolledBack),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefactorAttempt {
    pub id: String,
    pub run_id: String,
    pub unit: UnitRef,
    pub fix_rule_id: String,
    /// Violations this attempt targets (all of one kind in one unit).
    pub violation_ids: Vec<String>,
    pub pre_test_result: TestVerdict,
    pub post_test_result: TestVerdict,
    pub coverage_before: Option<f64>,
    pub coverage_after: Option<f64>,
    pub outcome: AttemptOutcome,
    pub reason: Option<String>,
    pub checkpoint_token: Option<String>,
    pub commit_ref: Option<String>,
    pub dry_run: bool,
    pub started_at: u64,
    pub finished_at: u64,
}

impl RefactorAttempt {
    /// Applied attempts must have passed the post-check without losing
    /// more than `tolerance_pct` points of coverage.
    pub fn satisfies_safety(&self, tolerance_pct: f64) -> bool {
        if self.outcome != AttemptOutcome::Applied {
            return true;
        }
        match (self.coverage_before, self.coverage_after) {
            (Some(before), Some(after)) => {
                self.post_test_result.is_pass() && after >= before - tolerance_pct
            }
            _ => false,
        }
    }

    /// Whether this attempt counts against the run's unit budget.
    pub fn consumes_budget(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Applied | AttemptOutcome::RolledBack)
    }
}
