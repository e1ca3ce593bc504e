//! Working-tree access.

use crate::errors::WorkspaceError;
use crate::types::{Unit, UnitRef};

/// Read and write unit content.
pub trait UnitWorkspace: Send + Sync {
    fn read(&self, unit: &UnitRef) -> Result<String, WorkspaceError>;
    fn write(&self, unit: &UnitRef, content: &str) -> Result<(), WorkspaceError>;
}

/// Ordered enumeration of (reference, content) pairs.
pub trait UnitEnumerator {
    fn enumerate(&self) -> Result<Vec<Unit>, WorkspaceError>;
}
