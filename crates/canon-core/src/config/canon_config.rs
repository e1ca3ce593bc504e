//! Top-level canon configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    CatalogConfig, LearningConfig, MetricsConfig, RefactorConfig, RiskTolerance, RunMode,
};
use crate::constants::{CANDIDATE_INSTANCES, PROJECT_CONFIG_FILE, STATE_DIR};
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`CANON_*`)
/// 3. Project config (`canon.toml` in project root)
/// 4. User config (`~/.canon/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CanonConfig {
    pub refactor: RefactorConfig,
    pub learning: LearningConfig,
    pub metrics: MetricsConfig,
    pub catalog: CatalogConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub mode: Option<RunMode>,
    pub risk_tolerance: Option<RiskTolerance>,
    pub max_units_per_run: Option<u32>,
    pub coverage_tolerance_pct: Option<f64>,
}

impl CanonConfig {
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);

        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn validate(config: &CanonConfig) -> Result<(), ConfigError> {
        let refactor = &config.refactor;
        if let Some(tol) = refactor.coverage_tolerance_pct {
            if !(0.0..=100.0).contains(&tol) {
                return Err(invalid(
                    "refactor.coverage_tolerance_pct",
                    "must be between 0 and 100",
                ));
            }
        }
        if refactor.max_units_per_run == Some(0) {
            return Err(invalid("refactor.max_units_per_run", "must be greater than 0"));
        }
        if refactor.test_timeout_secs == Some(0) {
            return Err(invalid("refactor.test_timeout_secs", "must be greater than 0"));
        }
        if let Some(ref pattern) = refactor.coverage_regex {
            if pattern.is_empty() {
                return Err(invalid("refactor.coverage_regex", "must not be empty"));
            }
        }

        let gate = &config.learning.pattern_quality_gate;
        if let Some(min) = gate.min_coverage_pct {
            if !(0.0..=100.0).contains(&min) {
                return Err(invalid(
                    "learning.pattern_quality_gate.min_coverage_pct",
                    "must be between 0 and 100",
                ));
            }
        }
        if let Some(n) = gate.min_instances {
            // Candidates are only proposed from this many instances upward.
            if n < CANDIDATE_INSTANCES {
                return Err(invalid(
                    "learning.pattern_quality_gate.min_instances",
                    &format!("must be at least {CANDIDATE_INSTANCES}"),
                ));
            }
        }
        if config.learning.top_n == Some(0) {
            return Err(invalid("learning.top_n", "must be greater than 0"));
        }
        if let Some(t) = config.learning.relearn_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(invalid(
                    "learning.relearn_threshold",
                    "must be between 0.0 and 1.0",
                ));
            }
        }

        let metrics = &config.metrics;
        if metrics.trend_window.is_some_and(|w| w < 2) {
            return Err(invalid("metrics.trend_window", "must be at least 2"));
        }
        if metrics.throughput_target == Some(0) {
            return Err(invalid("metrics.throughput_target", "must be greater than 0"));
        }
        if let Some(s) = metrics.trend_saturation_hours {
            if s <= 0.0 || !s.is_finite() {
                return Err(invalid(
                    "metrics.trend_saturation_hours",
                    "must be a positive number",
                ));
            }
        }
        Ok(())
    }

    /// Path of the Fix Catalog file, resolved against `root`.
    pub fn catalog_path(&self, root: &Path) -> Option<PathBuf> {
        self.catalog.path.as_ref().map(|p| root.join(p))
    }

    pub fn rules_path(&self, root: &Path) -> Option<PathBuf> {
        self.catalog.rules_path.as_ref().map(|p| root.join(p))
    }

    /// Returns the user config path: `~/.canon/config.toml`.
    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(STATE_DIR).join("config.toml"))
    }

    /// Unknown keys are ignored.
    fn merge_toml_file(config: &mut CanonConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let file_config: CanonConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::merge(config, &file_config);
        Ok(())
    }

    /// `other` overrides `base` only where `other` has a value.
    fn merge(base: &mut CanonConfig, other: &CanonConfig) {
        let (b, o) = (&mut base.refactor, &other.refactor);
        if o.risk_tolerance.is_some() {
            b.risk_tolerance = o.risk_tolerance;
        }
        if o.max_units_per_run.is_some() {
            b.max_units_per_run = o.max_units_per_run;
        }
        if o.coverage_tolerance_pct.is_some() {
            b.coverage_tolerance_pct = o.coverage_tolerance_pct;
        }
        if o.mode.is_some() {
            b.mode = o.mode;
        }
        if o.test_timeout_secs.is_some() {
            b.test_timeout_secs = o.test_timeout_secs;
        }
        if !o.pre_approved.is_empty() {
            b.pre_approved = o.pre_approved.clone();
        }
        if !o.test_command.is_empty() {
            b.test_command = o.test_command.clone();
        }
        if o.coverage_regex.is_some() {
            b.coverage_regex = o.coverage_regex.clone();
        }

        let (b, o) = (&mut base.learning, &other.learning);
        let (bg, og) = (&mut b.pattern_quality_gate, &o.pattern_quality_gate);
        if og.min_coverage_pct.is_some() {
            bg.min_coverage_pct = og.min_coverage_pct;
        }
        if og.min_instances.is_some() {
            bg.min_instances = og.min_instances;
        }
        if og.max_age_months.is_some() {
            bg.max_age_months = og.max_age_months;
        }
        if o.top_n.is_some() {
            b.top_n = o.top_n;
        }
        if o.relearn_threshold.is_some() {
            b.relearn_threshold = o.relearn_threshold;
        }

        let (b, o) = (&mut base.metrics, &other.metrics);
        if o.trend_window.is_some() {
            b.trend_window = o.trend_window;
        }
        if o.throughput_target.is_some() {
            b.throughput_target = o.throughput_target;
        }
        if o.throughput_window_days.is_some() {
            b.throughput_window_days = o.throughput_window_days;
        }
        if o.trend_saturation_hours.is_some() {
            b.trend_saturation_hours = o.trend_saturation_hours;
        }

        if other.catalog.path.is_some() {
            base.catalog.path = other.catalog.path.clone();
        }
        if other.catalog.rules_path.is_some() {
            base.catalog.rules_path = other.catalog.rules_path.clone();
        }
    }

    fn apply_env_overrides(config: &mut CanonConfig) {
        if let Ok(val) = std::env::var("CANON_REFACTOR_MODE") {
            if let Some(mode) = RunMode::parse_str(&val) {
                config.refactor.mode = Some(mode);
            }
        }
        if let Ok(val) = std::env::var("CANON_REFACTOR_RISK_TOLERANCE") {
            if let Some(t) = RiskTolerance::parse_str(&val) {
                config.refactor.risk_tolerance = Some(t);
            }
        }
        if let Ok(val) = std::env::var("CANON_REFACTOR_MAX_UNITS_PER_RUN") {
            if let Ok(v) = val.parse::<u32>() {
                config.refactor.max_units_per_run = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CANON_REFACTOR_COVERAGE_TOLERANCE_PCT") {
            if let Ok(v) = val.parse::<f64>() {
                config.refactor.coverage_tolerance_pct = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CANON_REFACTOR_TEST_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.refactor.test_timeout_secs = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CANON_LEARNING_MIN_COVERAGE_PCT") {
            if let Ok(v) = val.parse::<f64>() {
                config.learning.pattern_quality_gate.min_coverage_pct = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CANON_LEARNING_TOP_N") {
            if let Ok(v) = val.parse::<usize>() {
                config.learning.top_n = Some(v);
            }
        }
        if let Ok(val) = std::env::var("CANON_CATALOG_PATH") {
            config.catalog.path = Some(val);
        }
    }

    fn apply_cli_overrides(config: &mut CanonConfig, cli: &CliOverrides) {
        if cli.mode.is_some() {
            config.refactor.mode = cli.mode;
        }
        if cli.risk_tolerance.is_some() {
            config.refactor.risk_tolerance = cli.risk_tolerance;
        }
        if cli.max_units_per_run.is_some() {
            config.refactor.max_units_per_run = cli.max_units_per_run;
        }
        if cli.coverage_tolerance_pct.is_some() {
            config.refactor.coverage_tolerance_pct = cli.coverage_tolerance_pct;
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
