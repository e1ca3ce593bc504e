//! CanonEventHandler trait with no-op defaults.

use super::types::*;

/// Observer of engine lifecycle events. Every method defaults to a no-op,
/// so handlers implement only what they care about.
pub trait CanonEventHandler: Send + Sync {
    // ---- Scan ----
    fn on_scan_started(&self, _event: &ScanStartedEvent) {}
    fn on_scan_complete(&self, _event: &ScanCompleteEvent) {}
    fn on_parse_error(&self, _event: &ParseErrorEvent) {}

    // ---- Violations ----
    fn on_violation_detected(&self, _event: &ViolationDetectedEvent) {}
    fn on_violation_resolved(&self, _event: &ViolationResolvedEvent) {}

    // ---- Patterns ----
    fn on_pattern_proposed(&self, _event: &PatternProposedEvent) {}
    fn on_pattern_promoted(&self, _event: &PatternPromotedEvent) {}
    fn on_pattern_retired(&self, _event: &PatternRetiredEvent) {}

    // ---- Refactor runs ----
    fn on_run_started(&self, _event: &RunStartedEvent) {}
    fn on_refactor_applied(&self, _event: &RefactorEvent) {}
    fn on_refactor_rolled_back(&self, _event: &RefactorEvent) {}
    fn on_refactor_skipped(&self, _event: &RefactorEvent) {}
    fn on_run_aborted(&self, _event: &RunAbortedEvent) {}
    fn on_run_complete(&self, _event: &RunCompleteEvent) {}

    // ---- Metrics ----
    fn on_snapshot_recorded(&self, _event: &SnapshotRecordedEvent) {}
}
