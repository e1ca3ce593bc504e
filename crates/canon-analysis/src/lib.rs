//! Analysis engine for canon: syntax-backed Violation Oracle, Pattern
//! Registry and Learner, Fix Catalog and transforms, the Auto-Refactor
//! Engine with its collaborator backends, and the Metrics & Health-Score
//! Engine.

pub mod backends;
pub mod catalog;
pub mod engine;
pub mod fingerprint;
pub mod imports;
pub mod learner;
pub mod metrics;
pub mod oracle;
pub mod parsers;
pub mod registry;
pub mod transforms;

pub use catalog::FixCatalog;
pub use engine::{Collaborators, RefactorEngine, RunReport, RunStatus};
pub use learner::PatternLearner;
pub use metrics::MetricsEngine;
pub use oracle::{scan_all, RuleOracle, ViolationLedger, ViolationOracle};
pub use registry::PatternRegistry;
pub use transforms::{Transform, TransformRegistry};
