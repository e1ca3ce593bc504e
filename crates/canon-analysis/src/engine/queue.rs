//! Priority queue of refactor work: one entry per (unit, kind).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use canon_core::config::RiskTolerance;
use canon_core::types::{FixRule, RiskTier, Severity, UnitRef, Violation};

use crate::catalog::FixCatalog;

/// All pending violations of one kind in one unit, fixed as one atomic change.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub unit: UnitRef,
    pub kind: String,
    pub rule: FixRule,
    /// Highest severity among the grouped violations.
    pub severity: Severity,
    pub violation_ids: Vec<String>,
    /// Message of the first grouped violation, used in commit bodies.
    pub message: String,
}

/// A pending violation that will not be attempted this run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedViolation {
    pub violation_id: String,
    pub unit: UnitRef,
    pub kind: String,
    pub risk_tier: RiskTier,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RefactorQueue {
    pub entries: Vec<QueueEntry>,
    pub excluded: Vec<ExcludedViolation>,
}

impl RefactorQueue {
    /// Group, filter by tolerance, and order: risk tier ascending, severity
    /// descending, then unit path and kind.
    pub fn build<'a>(
        pending: impl IntoIterator<Item = &'a Violation>,
        catalog: &FixCatalog,
        tolerance: RiskTolerance,
    ) -> Self {
        let mut groups: BTreeMap<(UnitRef, String), QueueEntry> = BTreeMap::new();
        let mut excluded = Vec::new();

        for violation in pending.into_iter().filter(|v| v.is_pending()) {
            let rule = match catalog.rule_for(&violation.kind) {
                Some(rule) => rule,
                None => {
                    excluded.push(exclude(violation, RiskTier::High, "no fix rule for kind"));
                    continue;
                }
            };
            if !rule.risk_tier.is_automatable() {
                excluded.push(exclude(violation, rule.risk_tier, "HIGH risk is never automated"));
                continue;
            }
            if !tolerance.admits(rule.risk_tier) {
                excluded.push(exclude(violation, rule.risk_tier, "outside configured risk tolerance"));
                continue;
            }

            let entry = groups
                .entry((violation.unit.clone(), violation.kind.clone()))
                .or_insert_with(|| QueueEntry {
                    unit: violation.unit.clone(),
                    kind: violation.kind.clone(),
                    rule: rule.clone(),
                    severity: violation.severity,
                    violation_ids: Vec::new(),
                    message: violation.message.clone(),
                });
            entry.severity = entry.severity.max(violation.severity);
            entry.violation_ids.push(violation.id.clone());
        }

        let mut entries: Vec<QueueEntry> = groups.into_values().collect();
        entries.sort_by(priority);
        for entry in &mut entries {
            entry.violation_ids.sort();
        }
        excluded.sort_by(|a, b| a.unit.cmp(&b.unit).then_with(|| a.violation_id.cmp(&b.violation_id)));

        Self { entries, excluded }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn priority(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    a.rule
        .risk_tier
        .cmp(&b.rule.risk_tier)
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.unit.cmp(&b.unit))
        .then_with(|| a.kind.cmp(&b.kind))
}

fn exclude(violation: &Violation, risk_tier: RiskTier, reason: &str) -> ExcludedViolation {
    ExcludedViolation {
        violation_id: violation.id.clone(),
        unit: violation.unit.clone(),
        kind: violation.kind.clone(),
        risk_tier,
        reason: reason.to_string(),
    }
}
