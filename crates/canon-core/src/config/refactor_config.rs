//! Auto-refactor run configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COVERAGE_TOLERANCE_PCT, DEFAULT_MAX_UNITS_PER_RUN, DEFAULT_TEST_TIMEOUT_SECS,
};
use crate::types::RiskTier;

/// Highest risk tier a run may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskTolerance {
    #[default]
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "low+medium")]
    LowMedium,
}

impl RiskTolerance {
    /// HIGH is never admitted.
    pub fn admits(&self, tier: RiskTier) -> bool {
        match (self, tier) {
            (_, RiskTier::Low) => true,
            (Self::LowMedium, RiskTier::Medium) => true,
            _ => false,
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "low+medium" | "low_medium" => Some(Self::LowMedium),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::LowMedium => f.write_str("low+medium"),
        }
    }
}

/// Execution mode of a refactor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Transform and test for reporting only; nothing is persisted.
    #[default]
    DryRun,
    /// Pause for confirmation before any MEDIUM-risk transform.
    Interactive,
    /// Unattended for LOW risk and pre-approved MEDIUM kinds.
    Auto,
}

impl RunMode {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "dry_run" => Some(Self::DryRun),
            "interactive" => Some(Self::Interactive),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Interactive => "interactive",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RefactorConfig {
    /// Default: low.
    pub risk_tolerance: Option<RiskTolerance>,
    /// Units attempted (applied + rolled back) per run. Default: 10.
    pub max_units_per_run: Option<u32>,
    /// Allowed coverage drop, in percentage points. Default: 1.0.
    pub coverage_tolerance_pct: Option<f64>,
    /// Default: dry_run.
    pub mode: Option<RunMode>,
    /// Per test-subset timeout. Default: 300.
    pub test_timeout_secs: Option<u64>,
    /// Violation kinds whose MEDIUM fixes may run unattended in auto mode.
    #[serde(default)]
    pub pre_approved: Vec<String>,
    /// Test command argv; `{unit}` is replaced with the unit path.
    #[serde(default)]
    pub test_command: Vec<String>,
    /// Regex whose first capture group is the coverage percentage.
    pub coverage_regex: Option<String>,
}

impl RefactorConfig {
    pub fn effective_risk_tolerance(&self) -> RiskTolerance {
        self.risk_tolerance.unwrap_or_default()
    }

    pub fn effective_max_units_per_run(&self) -> u32 {
        self.max_units_per_run.unwrap_or(DEFAULT_MAX_UNITS_PER_RUN)
    }

    pub fn effective_coverage_tolerance_pct(&self) -> f64 {
        self.coverage_tolerance_pct
            .unwrap_or(DEFAULT_COVERAGE_TOLERANCE_PCT)
    }

    pub fn effective_mode(&self) -> RunMode {
        self.mode.unwrap_or_default()
    }

    pub fn effective_test_timeout_secs(&self) -> u64 {
        self.test_timeout_secs.unwrap_or(DEFAULT_TEST_TIMEOUT_SECS)
    }

    pub fn is_pre_approved(&self, kind: &str) -> bool {
        self.pre_approved.iter().any(|k| k == kind)
    }
}
