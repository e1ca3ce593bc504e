//! Candidate scoring: coverage tier, consistency tier, recency.

use std::cmp::Ordering;

use canon_core::constants::HIGH_COVERAGE_PCT;

use crate::registry::ConsistencyTier;

const COVERAGE_WEIGHT: f64 = 0.4;
const CONSISTENCY_WEIGHT: f64 = 0.4;
const RECENCY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageTier {
    /// Mean coverage at or above 90%.
    High,
    /// Mean coverage between the gate minimum and 90%.
    Medium,
}

impl CoverageTier {
    pub fn from_mean(mean_coverage_pct: f64) -> Self {
        if mean_coverage_pct >= HIGH_COVERAGE_PCT {
            Self::High
        } else {
            Self::Medium
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.6,
        }
    }
}

/// Fraction of the recency window left, 1.0 for units touched just now.
pub fn recency(mean_age_secs: f64, window_secs: u64) -> f64 {
    if window_secs == 0 {
        return 0.0;
    }
    (1.0 - mean_age_secs / window_secs as f64).clamp(0.0, 1.0)
}

pub fn score(coverage: CoverageTier, consistency: ConsistencyTier, recency: f64) -> f64 {
    COVERAGE_WEIGHT * coverage.score()
        + CONSISTENCY_WEIGHT * consistency.score()
        + RECENCY_WEIGHT * recency.clamp(0.0, 1.0)
}

/// Ranking key. Higher score first; ties go to more covered lines, then to
/// more frequently modified clusters, then to the lower fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct RankKey {
    pub score: f64,
    pub covered_lines: u64,
    pub modification_frequency: u64,
    pub fingerprint: u64,
}

impl RankKey {
    pub fn compare(&self, other: &RankKey) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(other.covered_lines.cmp(&self.covered_lines))
            .then(other.modification_frequency.cmp(&self.modification_frequency))
            .then(self.fingerprint.cmp(&other.fingerprint))
    }
}
