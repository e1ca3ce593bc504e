//! Quality gate: only well-tested, stable, recently touched units may seed patterns.

use canon_core::config::QualityGateConfig;
use canon_core::constants::SECONDS_PER_MONTH;
use canon_core::types::UnitProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("coverage below the gate minimum")]
    LowCoverage,
    #[error("unit has regression history")]
    RegressionHistory,
    #[error("unit not modified within the recency window")]
    Stale,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    min_coverage_pct: f64,
    max_age_secs: u64,
}

impl QualityGate {
    pub fn from_config(config: &QualityGateConfig) -> Self {
        Self {
            min_coverage_pct: config.effective_min_coverage_pct(),
            max_age_secs: u64::from(config.effective_max_age_months()) * SECONDS_PER_MONTH,
        }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    pub fn check(&self, profile: &UnitProfile, now: u64) -> Result<(), GateRejection> {
        if profile.coverage_pct < self.min_coverage_pct {
            return Err(GateRejection::LowCoverage);
        }
        if profile.has_regression_history {
            return Err(GateRejection::RegressionHistory);
        }
        if now.saturating_sub(profile.modified_at) > self.max_age_secs {
            return Err(GateRejection::Stale);
        }
        Ok(())
    }
}
