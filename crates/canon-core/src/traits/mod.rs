//! Seams to external collaborators: tests, checkpoints, the working tree,
//! pattern persistence, approvals, and cancellation.

pub mod approval;
pub mod cancellation;
pub mod checkpoint;
pub mod pattern_store;
pub mod test_runner;
pub mod workspace;

pub use approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, DeferAll};
pub use cancellation::{Cancellable, CancellationToken};
pub use checkpoint::{CheckpointStore, CheckpointToken, CommitRef};
pub use pattern_store::{InMemoryPatternStore, PatternStore};
pub use test_runner::{TestOutcome, TestRunner};
pub use workspace::{UnitEnumerator, UnitWorkspace};
