//! Metric snapshots: one immutable point of the health time series.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pattern::PatternStatus;
use super::violation::Severity;

/// The five weighted health components, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthComponents {
    pub consistency: f64,
    pub coverage: f64,
    pub violation_density: f64,
    pub debt_trend: f64,
    pub throughput: f64,
}

/// Point-in-time metrics. Written once per scan cycle and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Unix seconds.
    pub timestamp: u64,
    /// Percentage of scanned units with no pending violations.
    pub consistency_score: f64,
    pub violation_counts_by_severity: BTreeMap<Severity, u32>,
    pub debt_hours_estimate: f64,
    pub health_score: f64,
    pub coverage_pct: f64,
    pub total_violations: u32,
    pub patterns_by_status: BTreeMap<PatternStatus, u32>,
    pub refactors_applied: u32,
    pub refactors_rolled_back: u32,
    pub components: HealthComponents,
}

impl MetricSnapshot {
    pub fn violations_with(&self, severity: Severity) -> u32 {
        self.violation_counts_by_severity
            .get(&severity)
            .copied()
            .unwrap_or(0)
    }
}
