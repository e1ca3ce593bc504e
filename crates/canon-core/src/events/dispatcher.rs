//! EventDispatcher: synchronous event dispatch.

use std::sync::Arc;

use super::handler::CanonEventHandler;
use super::types::*;

/// Synchronous dispatcher wrapping a list of handlers. With no handlers
/// registered every `emit_*` is an empty loop.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn CanonEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn CanonEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// A panicking handler does not prevent later handlers from receiving the event.
    fn emit<F: Fn(&dyn CanonEventHandler)>(&self, f: F) {
        for handler in &self.handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(handler.as_ref());
            }));
            if result.is_err() {
                tracing::warn!("event handler panicked; continuing dispatch");
            }
        }
    }

    // ---- Scan ----
    pub fn emit_scan_started(&self, event: &ScanStartedEvent) {
        self.emit(|h| h.on_scan_started(event));
    }

    pub fn emit_scan_complete(&self, event: &ScanCompleteEvent) {
        self.emit(|h| h.on_scan_complete(event));
    }

    pub fn emit_parse_error(&self, event: &ParseErrorEvent) {
        self.emit(|h| h.on_parse_error(event));
    }

    // ---- Violations ----
    pub fn emit_violation_detected(&self, event: &ViolationDetectedEvent) {
        self.emit(|h| h.on_violation_detected(event));
    }

    pub fn emit_violation_resolved(&self, event: &ViolationResolvedEvent) {
        self.emit(|h| h.on_violation_resolved(event));
    }

    // ---- Patterns ----
    pub fn emit_pattern_proposed(&self, event: &PatternProposedEvent) {
        self.emit(|h| h.on_pattern_proposed(event));
    }

    pub fn emit_pattern_promoted(&self, event: &PatternPromotedEvent) {
        self.emit(|h| h.on_pattern_promoted(event));
    }

    pub fn emit_pattern_retired(&self, event: &PatternRetiredEvent) {
        self.emit(|h| h.on_pattern_retired(event));
    }

    // ---- Refactor runs ----
    pub fn emit_run_started(&self, event: &RunStartedEvent) {
        self.emit(|h| h.on_run_started(event));
    }

    pub fn emit_refactor_applied(&self, event: &RefactorEvent) {
        self.emit(|h| h.on_refactor_applied(event));
    }

    pub fn emit_refactor_rolled_back(&self, event: &RefactorEvent) {
        self.emit(|h| h.on_refactor_rolled_back(event));
    }

    pub fn emit_refactor_skipped(&self, event: &RefactorEvent) {
        self.emit(|h| h.on_refactor_skipped(event));
    }

    pub fn emit_run_aborted(&self, event: &RunAbortedEvent) {
        self.emit(|h| h.on_run_aborted(event));
    }

    pub fn emit_run_complete(&self, event: &RunCompleteEvent) {
        self.emit(|h| h.on_run_complete(event));
    }

    // ---- Metrics ----
    pub fn emit_snapshot_recorded(&self, event: &SnapshotRecordedEvent) {
        self.emit(|h| h.on_snapshot_recorded(event));
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
