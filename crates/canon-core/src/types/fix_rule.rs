//! Fix rules: violation kind → transformation → risk tier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How likely a transformation is to alter runtime behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Mechanical and behavior-preserving by construction.
    Low,
    /// Behavior-preserving but structurally invasive. Always requires approval.
    Medium,
    /// Never automated; classification and reporting only.
    High,
}

impl RiskTier {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn is_automatable(&self) -> bool {
        !matches!(self, Self::High)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the fix catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRule {
    pub id: String,
    pub violation_kind: String,
    pub transform_id: String,
    pub risk_tier: RiskTier,
    pub requires_approval: bool,
    /// Estimated manual fix time per instance, in hours.
    pub debt_hours: f64,
    pub description: Option<String>,
}
