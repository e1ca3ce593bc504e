//! Metrics and health-score configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Snapshots in the debt-trend window. Default: 5.
    pub trend_window: Option<usize>,
    /// Applied fixes per throughput window that score 100. Default: 5.
    pub throughput_target: Option<u32>,
    /// Default: 7.
    pub throughput_window_days: Option<u32>,
    /// Debt-hours slope per snapshot at which the trend saturates. Default: 5.0.
    pub trend_saturation_hours: Option<f64>,
}

impl MetricsConfig {
    pub fn effective_trend_window(&self) -> usize {
        self.trend_window.unwrap_or(5)
    }

    pub fn effective_throughput_target(&self) -> u32 {
        self.throughput_target.unwrap_or(5)
    }

    pub fn effective_throughput_window_days(&self) -> u32 {
        self.throughput_window_days.unwrap_or(7)
    }

    pub fn effective_trend_saturation_hours(&self) -> f64 {
        self.trend_saturation_hours.unwrap_or(5.0)
    }
}
