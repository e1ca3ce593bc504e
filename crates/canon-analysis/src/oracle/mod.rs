//! Violation Oracle: scans units against rules and adopted patterns.

pub mod ledger;
pub mod rule_oracle;
pub mod rules;

pub use ledger::{ReconcileSummary, ViolationLedger};
pub use rule_oracle::RuleOracle;
pub use rules::{AntiPatternRule, RuleLoader};

use std::time::Instant;

use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_64;

use canon_core::errors::{ParseError, RunAudit, RunIssue};
use canon_core::events::types::{
    ParseErrorEvent, ScanCompleteEvent, ScanStartedEvent, ViolationDetectedEvent,
};
use canon_core::events::EventDispatcher;
use canon_core::types::{Pattern, Unit, UnitRef, Violation};

/// Reports deviations for one unit. Must be pure: identical input yields an
/// identical violation set.
pub trait ViolationOracle: Send + Sync {
    fn scan(&self, unit: &Unit, patterns: &[Pattern]) -> Result<Vec<Violation>, ParseError>;
}

/// Deterministic violation id.
pub fn violation_id(unit: &UnitRef, kind: &str, line: u32) -> String {
    let key = format!("{}\0{}\0{}", unit.as_str(), kind, line);
    format!("{:016x}", xxh3_64(key.as_bytes()))
}

/// Ledger id for the `n`th recurrence of a violation whose earlier ids are
/// resolved.
pub fn recurrence_id(base: &str, n: u32) -> String {
    format!("{base}.{n}")
}

/// Scan-level id a ledger id derives from.
pub fn base_id(id: &str) -> &str {
    id.split_once('.').map_or(id, |(base, _)| base)
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub violations: Vec<Violation>,
    /// Units that parsed and were scanned.
    pub scanned: Vec<UnitRef>,
    pub failed: Vec<UnitRef>,
}

/// Scan every unit, isolating per-unit parse errors. Units are scanned in
/// parallel; results keep input order.
pub fn scan_all(
    oracle: &dyn ViolationOracle,
    units: &[Unit],
    patterns: &[Pattern],
    events: &EventDispatcher,
) -> RunAudit<ScanOutcome> {
    let span = canon_core::scan_span!(units.len());
    let _guard = span.enter();
    let started = Instant::now();
    events.emit_scan_started(&ScanStartedEvent {
        unit_count: units.len(),
    });

    let results: Vec<Result<Vec<Violation>, ParseError>> = units
        .par_iter()
        .map(|unit| oracle.scan(unit, patterns))
        .collect();

    let mut audit = RunAudit::new(ScanOutcome::default());
    for (unit, result) in units.iter().zip(results) {
        match result {
            Ok(found) => {
                for v in &found {
                    events.emit_violation_detected(&ViolationDetectedEvent {
                        violation_id: v.id.clone(),
                        unit: v.unit.to_string(),
                        kind: v.kind.clone(),
                        severity: v.severity,
                    });
                }
                audit.data.violations.extend(found);
                audit.data.scanned.push(unit.unit_ref.clone());
            }
            Err(e) => {
                tracing::warn!(unit = %unit.unit_ref, error = %e, "parse error; unit skipped");
                events.emit_parse_error(&ParseErrorEvent {
                    unit: unit.unit_ref.to_string(),
                    message: e.to_string(),
                });
                audit.record(RunIssue::ParseError {
                    unit: unit.unit_ref.to_string(),
                    message: e.to_string(),
                });
                audit.data.failed.push(unit.unit_ref.clone());
            }
        }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        units = units.len(),
        violations = audit.data.violations.len(),
        parse_errors = audit.data.failed.len(),
        duration_ms,
        "scan complete"
    );
    events.emit_scan_complete(&ScanCompleteEvent {
        units_scanned: audit.data.scanned.len(),
        violations: audit.data.violations.len(),
        parse_errors: audit.data.failed.len(),
        duration_ms,
    });
    audit
}
