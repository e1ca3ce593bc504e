//! Concrete collaborators: filesystem workspace and enumeration, checkpoint
//! stores, and the command test runner.

pub mod checkpoint_fs;
pub mod checkpoint_git;
pub mod fs;
pub mod test_runner;

pub use checkpoint_fs::FsCheckpointStore;
pub use checkpoint_git::GitCheckpointStore;
pub use fs::{FsUnitEnumerator, FsWorkspace, DEFAULT_IGNORE_DIRS};
pub use test_runner::{CommandTestRunner, DEFAULT_COVERAGE_REGEX};
