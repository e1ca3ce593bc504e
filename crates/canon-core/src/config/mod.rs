//! Configuration system with layered TOML resolution.

pub mod canon_config;
pub mod catalog_config;
pub mod learning_config;
pub mod metrics_config;
pub mod refactor_config;

pub use canon_config::{CanonConfig, CliOverrides};
pub use catalog_config::CatalogConfig;
pub use learning_config::{LearningConfig, QualityGateConfig};
pub use metrics_config::MetricsConfig;
pub use refactor_config::{RefactorConfig, RiskTolerance, RunMode};
