//! Test subset runner errors. The engine treats every one of these as a FAIL.

use super::error_code::{self, CanonErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum TestRunError {
    #[error("Failed to spawn test command `{command}`: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("Test run for {unit} timed out after {timeout_secs}s")]
    Timeout { unit: String, timeout_secs: u64 },

    #[error("Test command is empty")]
    EmptyCommand,

    #[error("Test run I/O error: {message}")]
    Io { message: String },
}

impl CanonErrorCode for TestRunError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => error_code::TEST_TIMEOUT,
            _ => error_code::TEST_RUN_ERROR,
        }
    }
}
