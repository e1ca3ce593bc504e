//! Snapshot deltas with improvement verdicts.

use std::fmt;

use canon_core::types::{MetricSnapshot, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Improved,
    Regressed,
    Unchanged,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Improved => "improved",
            Self::Regressed => "regressed",
            Self::Unchanged => "unchanged",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDelta {
    pub metric: String,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaReport {
    pub from_timestamp: u64,
    pub to_timestamp: u64,
    pub deltas: Vec<MetricDelta>,
}

impl DeltaReport {
    pub fn get(&self, metric: &str) -> Option<&MetricDelta> {
        self.deltas.iter().find(|d| d.metric == metric)
    }

    pub fn improved(&self) -> impl Iterator<Item = &MetricDelta> {
        self.deltas.iter().filter(|d| d.verdict == Verdict::Improved)
    }

    pub fn regressed(&self) -> impl Iterator<Item = &MetricDelta> {
        self.deltas.iter().filter(|d| d.verdict == Verdict::Regressed)
    }
}

const EPSILON: f64 = 1e-9;

fn delta(metric: impl Into<String>, before: f64, after: f64, direction: Direction) -> MetricDelta {
    let diff = after - before;
    let verdict = if diff.abs() <= EPSILON {
        Verdict::Unchanged
    } else {
        match (direction, diff > 0.0) {
            (Direction::HigherIsBetter, true) | (Direction::LowerIsBetter, false) => Verdict::Improved,
            _ => Verdict::Regressed,
        }
    };
    MetricDelta {
        metric: metric.into(),
        before,
        after,
        delta: diff,
        verdict,
    }
}

/// Per-metric change from `a` (earlier) to `b` (later).
pub fn compare(a: &MetricSnapshot, b: &MetricSnapshot) -> DeltaReport {
    use Direction::*;
    let mut deltas = vec![
        delta("health_score", a.health_score, b.health_score, HigherIsBetter),
        delta("consistency_score", a.consistency_score, b.consistency_score, HigherIsBetter),
        delta("coverage_pct", a.coverage_pct, b.coverage_pct, HigherIsBetter),
        delta(
            "total_violations",
            a.total_violations as f64,
            b.total_violations as f64,
            LowerIsBetter,
        ),
        delta("debt_hours_estimate", a.debt_hours_estimate, b.debt_hours_estimate, LowerIsBetter),
    ];
    for severity in Severity::ALL {
        deltas.push(delta(
            format!("violations_{}", severity.name()),
            a.violations_with(severity) as f64,
            b.violations_with(severity) as f64,
            LowerIsBetter,
        ));
    }
    DeltaReport {
        from_timestamp: a.timestamp,
        to_timestamp: b.timestamp,
        deltas,
    }
}
