//! Patterns: canonical structural approaches to recurring problems.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::unit::UnitRef;

/// Pattern lifecycle. Ordered by promotion rank; `Retired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    Proposed,
    Trial,
    Adopted,
    Retired,
}

impl PatternStatus {
    pub const ALL: [PatternStatus; 4] = [
        PatternStatus::Proposed,
        PatternStatus::Trial,
        PatternStatus::Adopted,
        PatternStatus::Retired,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Trial => "trial",
            Self::Adopted => "adopted",
            Self::Retired => "retired",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "proposed" => Some(Self::Proposed),
            "trial" => Some(Self::Trial),
            "adopted" => Some(Self::Adopted),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }
}

impl fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A canonical pattern definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub exemplars: Vec<UnitRef>,
    pub status: PatternStatus,
    pub instance_count: u32,
    /// Hex structural fingerprint for learned patterns.
    pub fingerprint: Option<String>,
    /// Shared skeleton extracted from the cluster, for learned patterns.
    pub skeleton: Option<String>,
    /// Violation kinds that count as deviations from this pattern.
    pub deviations: Vec<String>,
    pub created_at: u64,
    pub updated_at: u64,
}
