//! Run-level errors, non-fatal issues, and the run audit.

use serde::{Deserialize, Serialize};

use super::error_code::{self, CanonErrorCode};
use super::{CheckpointError, ConfigError, LockError, ParseError, StorageError, TransformError};

/// Errors that prevent a run from starting or that abort it.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fatal: {0}")]
    Fatal(#[from] FatalAbort),
}

impl CanonErrorCode for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Lock(e) => e.error_code(),
            Self::Transform(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Fatal(e) => e.error_code(),
        }
    }
}

/// The unrecoverable condition: the checkpoint provider failed to save or
/// restore, leaving the tree state unverifiable if the run continued.
#[derive(Debug, thiserror::Error)]
pub enum FatalAbort {
    #[error("Checkpoint failure on {unit}: {source}")]
    CheckpointFailure {
        unit: String,
        #[source]
        source: CheckpointError,
    },
}

impl CanonErrorCode for FatalAbort {
    fn error_code(&self) -> &'static str {
        error_code::CHECKPOINT_FAILURE
    }
}

/// A non-fatal condition recorded against one unit. Never halts a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum RunIssue {
    #[error("{unit}: parse error: {message}")]
    ParseError { unit: String, message: String },

    #[error("{unit}: pre-existing failure")]
    PreconditionFailure { unit: String },

    #[error("{unit}: regression detected: {message}")]
    RegressionDetected { unit: String, message: String },

    #[error("{unit}: {kind} not eligible: {message}")]
    NotEligible {
        unit: String,
        kind: String,
        message: String,
    },

    #[error("{unit}: awaiting approval for {kind}")]
    AwaitingApproval { unit: String, kind: String },

    #[error("{unit}: approval declined for {kind}")]
    Declined { unit: String, kind: String },

    #[error("{unit}: transform {transform_id} produced no change")]
    NoChange { unit: String, transform_id: String },

    #[error("{unit}: transform {transform_id} failed: {message}")]
    TransformFailed {
        unit: String,
        transform_id: String,
        message: String,
    },

    #[error("{unit}: commit failed: {message}")]
    CommitFailed { unit: String, message: String },

    #[error("{unit}: {rule} was reverted earlier in this run")]
    PreviouslyReverted { unit: String, rule: String },
}

impl RunIssue {
    pub fn unit(&self) -> &str {
        match self {
            Self::ParseError { unit, .. }
            | Self::PreconditionFailure { unit }
            | Self::RegressionDetected { unit, .. }
            | Self::NotEligible { unit, .. }
            | Self::AwaitingApproval { unit, .. }
            | Self::Declined { unit, .. }
            | Self::NoChange { unit, .. }
            | Self::TransformFailed { unit, .. }
            | Self::CommitFailed { unit, .. }
            | Self::PreviouslyReverted { unit, .. } => unit,
        }
    }

    /// Short human reason stored on the attempt record.
    pub fn reason(&self) -> String {
        match self {
            Self::PreconditionFailure { .. } => "pre-existing failure".to_string(),
            Self::ParseError { message, .. } => format!("parse error: {message}"),
            Self::RegressionDetected { message, .. } => message.clone(),
            Self::NotEligible { message, .. } => message.clone(),
            Self::AwaitingApproval { .. } => "awaiting approval".to_string(),
            Self::Declined { .. } => "approval declined".to_string(),
            Self::NoChange { .. } => "transform produced no change".to_string(),
            Self::TransformFailed { message, .. } => format!("transform failed: {message}"),
            Self::CommitFailed { message, .. } => format!("commit failed: {message}"),
            Self::PreviouslyReverted { .. } => "reverted earlier in this run".to_string(),
        }
    }
}

impl From<&ParseError> for RunIssue {
    fn from(e: &ParseError) -> Self {
        RunIssue::ParseError {
            unit: e.unit().unwrap_or("<unknown>").to_string(),
            message: e.to_string(),
        }
    }
}

impl CanonErrorCode for RunIssue {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => error_code::PARSE_ERROR,
            Self::PreconditionFailure { .. } => error_code::PRECONDITION_FAILURE,
            Self::RegressionDetected { .. } => error_code::REGRESSION_DETECTED,
            Self::NotEligible { .. } => error_code::NOT_ELIGIBLE,
            Self::AwaitingApproval { .. } => error_code::AWAITING_APPROVAL,
            Self::Declined { .. } => error_code::DECLINED,
            Self::NoChange { .. } => error_code::NO_CHANGE,
            Self::TransformFailed { .. } => error_code::TRANSFORM_ERROR,
            Self::CommitFailed { .. } => error_code::COMMIT_FAILED,
            Self::PreviouslyReverted { .. } => error_code::PREVIOUSLY_REVERTED,
        }
    }
}

/// Result of a run that accumulates non-fatal issues alongside its data.
#[derive(Debug, Default)]
pub struct RunAudit<T: Default = ()> {
    pub data: T,
    pub issues: Vec<RunIssue>,
}

impl<T: Default> RunAudit<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            issues: Vec::new(),
        }
    }

    pub fn record(&mut self, issue: RunIssue) {
        self.issues.push(issue);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn issues_for<'a>(&'a self, unit: &'a str) -> impl Iterator<Item = &'a RunIssue> + 'a {
        self.issues.iter().filter(move |i| i.unit() == unit)
    }
}
