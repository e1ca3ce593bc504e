//! Violations: detected deviations from adopted patterns or known anti-patterns.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fix_rule::RiskTier;
use super::unit::UnitRef;

/// Violation severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Weight used by the violation-density health component.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 5.0,
            Self::Critical => 10.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a violation left the pending state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Resolution {
    /// Closed by an applied refactor attempt.
    AutoRefactor { attempt_id: String },
    /// Disappeared from a later scan, or closed by hand.
    External,
}

/// A single detected violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Deterministic id derived from (unit, kind, line).
    pub id: String,
    pub unit: UnitRef,
    /// Anti-pattern kind, e.g. `typescript_any`.
    pub kind: String,
    /// Adopted pattern this kind deviates from, if any.
    pub pattern_id: Option<String>,
    /// 1-based line of the first match.
    pub line: u32,
    pub message: String,
    pub severity: Severity,
    pub risk_tier: RiskTier,
    pub detected_at: u64,
    pub resolved_at: Option<u64>,
    pub resolution: Option<Resolution>,
}

impl Violation {
    pub fn is_pending(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Close the violation. A violation resolves at most once; later calls are no-ops.
    pub fn resolve(&mut self, at: u64, resolution: Resolution) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.resolved_at = Some(at);
        self.resolution = Some(resolution);
        true
    }
}
