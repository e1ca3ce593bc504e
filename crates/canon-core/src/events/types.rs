//! Event payload types.

use crate::types::{AttemptOutcome, PatternStatus, RiskTier, Severity};

#[derive(Debug, Clone)]
pub struct ScanStartedEvent {
    pub unit_count: usize,
}

#[derive(Debug, Clone)]
pub struct ScanCompleteEvent {
    pub units_scanned: usize,
    pub violations: usize,
    pub parse_errors: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ViolationDetectedEvent {
    pub violation_id: String,
    pub unit: String,
    pub kind: String,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct ViolationResolvedEvent {
    pub violation_id: String,
    pub unit: String,
    /// Attempt that resolved it; `None` for external resolution.
    pub attempt_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParseErrorEvent {
    pub unit: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PatternProposedEvent {
    pub pattern_id: String,
    pub instance_count: u32,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct PatternPromotedEvent {
    pub pattern_id: String,
    pub from: PatternStatus,
    pub to: PatternStatus,
}

#[derive(Debug, Clone)]
pub struct PatternRetiredEvent {
    pub pattern_id: String,
}

#[derive(Debug, Clone)]
pub struct RunStartedEvent {
    pub run_id: String,
    pub queued_units: usize,
    pub budget: u32,
    pub mode: String,
}

/// Shared payload for applied / rolled back / skipped attempts.
#[derive(Debug, Clone)]
pub struct RefactorEvent {
    pub attempt_id: String,
    pub unit: String,
    pub rule: String,
    pub risk_tier: RiskTier,
    pub outcome: AttemptOutcome,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunAbortedEvent {
    pub run_id: String,
    pub unit: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RunCompleteEvent {
    pub run_id: String,
    pub status: String,
    pub applied: u32,
    pub rolled_back: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone)]
pub struct SnapshotRecordedEvent {
    pub timestamp: u64,
    pub health_score: f64,
}
