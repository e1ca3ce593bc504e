//! External confirmation for MEDIUM-risk transforms in interactive mode.

use crate::types::{RiskTier, UnitRef};

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub unit: UnitRef,
    pub kind: String,
    pub rule_id: String,
    pub transform_id: String,
    pub risk_tier: RiskTier,
    pub violation_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Decline,
    /// No answer available now; the unit is skipped and stays queued.
    Defer,
}

pub trait ApprovalGate: Send + Sync {
    fn confirm(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Gate used when nobody is attending the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferAll;

impl ApprovalGate for DeferAll {
    fn confirm(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Defer
    }
}
