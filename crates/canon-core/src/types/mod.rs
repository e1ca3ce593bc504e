//! Domain records shared across the engine.

pub mod attempt;
pub mod fix_rule;
pub mod pattern;
pub mod snapshot;
pub mod unit;
pub mod violation;

pub use attempt::{AttemptOutcome, RefactorAttempt, TestVerdict};
pub use fix_rule::{FixRule, RiskTier};
pub use pattern::{Pattern, PatternStatus};
pub use snapshot::{HealthComponents, MetricSnapshot};
pub use unit::{Unit, UnitProfile, UnitRef};
pub use violation::{Resolution, Severity, Violation};
