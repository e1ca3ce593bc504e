//! Pattern learner configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    CANDIDATE_INSTANCES, DEFAULT_MAX_AGE_MONTHS, DEFAULT_MIN_COVERAGE_PCT,
    DEFAULT_RELEARN_THRESHOLD, DEFAULT_TOP_N,
};

/// Quality gate a unit must pass before it may seed a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QualityGateConfig {
    /// Default: 75.
    pub min_coverage_pct: Option<f64>,
    /// Minimum cluster size for a candidate. Default: 3.
    pub min_instances: Option<u32>,
    /// Recency window. Default: 6.
    pub max_age_months: Option<u32>,
}

impl QualityGateConfig {
    pub fn effective_min_coverage_pct(&self) -> f64 {
        self.min_coverage_pct.unwrap_or(DEFAULT_MIN_COVERAGE_PCT)
    }

    pub fn effective_min_instances(&self) -> u32 {
        self.min_instances.unwrap_or(CANDIDATE_INSTANCES)
    }

    pub fn effective_max_age_months(&self) -> u32 {
        self.max_age_months.unwrap_or(DEFAULT_MAX_AGE_MONTHS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LearningConfig {
    pub pattern_quality_gate: QualityGateConfig,
    /// Candidates emitted per run. Default: 10.
    pub top_n: Option<usize>,
    /// Fraction of changed units that triggers a full re-learn. Default: 0.10.
    pub relearn_threshold: Option<f64>,
}

impl LearningConfig {
    pub fn effective_top_n(&self) -> usize {
        self.top_n.unwrap_or(DEFAULT_TOP_N)
    }

    pub fn effective_relearn_threshold(&self) -> f64 {
        self.relearn_threshold.unwrap_or(DEFAULT_RELEARN_THRESHOLD)
    }
}
