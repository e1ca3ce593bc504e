//! Shared constants for the canon engine.

/// Directory (relative to the project root) holding canon's working state.
pub const STATE_DIR: &str = ".canon";

/// Lock file name inside [`STATE_DIR`].
pub const LOCK_FILE: &str = "run.lock";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "canon.toml";

/// Default per-run unit budget.
pub const DEFAULT_MAX_UNITS_PER_RUN: u32 = 10;

/// Default coverage tolerance in percentage points.
pub const DEFAULT_COVERAGE_TOLERANCE_PCT: f64 = 1.0;

/// Default test subset timeout in seconds.
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 300;

/// Minimum test coverage for a unit to pass the learner quality gate.
pub const DEFAULT_MIN_COVERAGE_PCT: f64 = 75.0;

/// Coverage at or above which a candidate lands in the HIGH coverage tier.
pub const HIGH_COVERAGE_PCT: f64 = 90.0;

/// Minimum cluster size for a candidate pattern.
pub const CANDIDATE_INSTANCES: u32 = 3;

/// Instance count at which a pattern is considered strong (trial → adopted).
pub const STRONG_INSTANCES: u32 = 5;

/// Instance count at which a pattern is considered a standard.
pub const STANDARD_INSTANCES: u32 = 10;

/// Default recency window for the learner quality gate.
pub const DEFAULT_MAX_AGE_MONTHS: u32 = 6;

/// Default number of candidates emitted per learner run.
pub const DEFAULT_TOP_N: usize = 10;

/// Default re-learning threshold (fraction of units changed).
pub const DEFAULT_RELEARN_THRESHOLD: f64 = 0.10;

/// Default estimate of manual fix time per violation, in hours.
pub const DEFAULT_DEBT_HOURS: f64 = 0.5;

/// Seconds in an average month, used by the recency window.
pub const SECONDS_PER_MONTH: u64 = 30 * 86_400;
