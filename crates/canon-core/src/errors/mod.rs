//! Error handling for canon.
//! One error enum per subsystem, `thiserror` only.

pub mod checkpoint_error;
pub mod config_error;
pub mod engine_error;
pub mod error_code;
pub mod lock_error;
pub mod parse_error;
pub mod registry_error;
pub mod storage_error;
pub mod test_run_error;
pub mod transform_error;
pub mod workspace_error;

pub use checkpoint_error::CheckpointError;
pub use config_error::ConfigError;
pub use engine_error::{EngineError, FatalAbort, RunAudit, RunIssue};
pub use error_code::CanonErrorCode;
pub use lock_error::LockError;
pub use parse_error::ParseError;
pub use registry_error::RegistryError;
pub use storage_error::StorageError;
pub use test_run_error::TestRunError;
pub use transform_error::TransformError;
pub use workspace_error::WorkspaceError;
