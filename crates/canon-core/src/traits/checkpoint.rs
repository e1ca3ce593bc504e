//! Checkpoint / commit provider contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::CheckpointError;
use crate::types::UnitRef;

/// Opaque handle to a saved unit state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointToken(pub String);

impl fmt::Display for CheckpointToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a persisted unit-scoped commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(pub String);

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reversible per-unit snapshots plus unit-scoped commits.
///
/// `restore` must bring the unit back to the exact bytes captured by `save`.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, unit: &UnitRef) -> Result<CheckpointToken, CheckpointError>;
    fn restore(&self, token: &CheckpointToken) -> Result<(), CheckpointError>;
    fn commit(&self, unit: &UnitRef, message: &str) -> Result<CommitRef, CheckpointError>;
}
