//! Stable error codes surfaced to reporting consumers.

/// Every error enum maps its variants to a stable upper-snake code.
pub trait CanonErrorCode {
    fn error_code(&self) -> &'static str;
}

pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const PARSE_ERROR: &str = "PARSE_ERROR";
pub const UNSUPPORTED_LANGUAGE: &str = "UNSUPPORTED_LANGUAGE";
pub const CHECKPOINT_FAILURE: &str = "CHECKPOINT_FAILURE";
pub const TEST_RUN_ERROR: &str = "TEST_RUN_ERROR";
pub const TEST_TIMEOUT: &str = "TEST_TIMEOUT";
pub const WORKSPACE_ERROR: &str = "WORKSPACE_ERROR";
pub const TRANSFORM_ERROR: &str = "TRANSFORM_ERROR";
pub const REGISTRY_ERROR: &str = "REGISTRY_ERROR";
pub const PROMOTION_REJECTED: &str = "PROMOTION_REJECTED";
pub const LOCK_HELD: &str = "LOCK_HELD";
pub const LOCK_ERROR: &str = "LOCK_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const PRECONDITION_FAILURE: &str = "PRECONDITION_FAILURE";
pub const REGRESSION_DETECTED: &str = "REGRESSION_DETECTED";
pub const NOT_ELIGIBLE: &str = "NOT_ELIGIBLE";
pub const AWAITING_APPROVAL: &str = "AWAITING_APPROVAL";
pub const DECLINED: &str = "DECLINED";
pub const NO_CHANGE: &str = "NO_CHANGE";
pub const PREVIOUSLY_REVERTED: &str = "PREVIOUSLY_REVERTED";
pub const COMMIT_FAILED: &str = "COMMIT_FAILED";
