//! Units: the smallest artifact transformed atomically.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reference to a unit, a `/`-separated path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitRef(String);

impl UnitRef {
    pub fn new(path: impl Into<String>) -> Self {
        let raw: String = path.into();
        Self(raw.replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension without the dot, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.0.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            None
        } else {
            Some(ext)
        }
    }

    /// Resolve against a project root.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A unit together with its current content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_ref: UnitRef,
    pub content: String,
}

impl Unit {
    pub fn new(unit_ref: impl Into<UnitRef>, content: impl Into<String>) -> Self {
        Self {
            unit_ref: unit_ref.into(),
            content: content.into(),
        }
    }
}

/// A unit plus the quality signals the pattern learner gates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitProfile {
    pub unit: Unit,
    /// Line coverage of the unit's tests, 0-100.
    pub coverage_pct: f64,
    /// Absolute number of covered lines.
    pub covered_lines: u32,
    /// Whether the unit has ever been involved in a regression.
    pub has_regression_history: bool,
    /// Unix seconds of the last modification.
    pub modified_at: u64,
    /// Number of recorded modifications (commit touches).
    pub modification_count: u32,
}
