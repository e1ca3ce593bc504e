//! Violation ledger: reconciles successive scans into a pending/resolved set.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use canon_core::types::{Resolution, UnitRef, Violation};

use super::recurrence_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub unchanged: usize,
    /// Of `inserted`, violations found again after their id was resolved.
    pub recurred: usize,
    pub resolved_externally: usize,
}

/// Where a scan-level id lands in the ledger.
enum Slot {
    Pending(String),
    Vacant(String),
}

/// All known violations keyed by id.
///
/// A violation leaves the pending state exactly once: through an applied
/// refactor attempt or because a later scan no longer finds it. Resolved
/// ids are never reopened; a violation found again after resolution is
/// recorded as a new pending entry under a recurrence id (`<id>.<n>`).
#[derive(Debug, Clone, Default)]
pub struct ViolationLedger {
    entries: BTreeMap<String, Violation>,
}

impl ViolationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_violations(violations: impl IntoIterator<Item = Violation>) -> Self {
        Self {
            entries: violations.into_iter().map(|v| (v.id.clone(), v)).collect(),
        }
    }

    /// Merge one scan cycle. Pending violations of `scanned_units` that the
    /// scan no longer reports are closed as externally resolved at `now`.
    /// Units absent from `scanned_units` (e.g. parse failures) keep their state.
    pub fn reconcile(
        &mut self,
        found: &[Violation],
        scanned_units: &[UnitRef],
        now: u64,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let scanned: FxHashSet<&UnitRef> = scanned_units.iter().collect();
        let mut live: FxHashSet<String> = FxHashSet::default();

        for v in found {
            match self.slot(&v.id) {
                Slot::Pending(id) => {
                    summary.unchanged += 1;
                    live.insert(id);
                }
                Slot::Vacant(id) => {
                    if id != v.id {
                        summary.recurred += 1;
                    }
                    self.insert_as(&id, v);
                    summary.inserted += 1;
                    live.insert(id);
                }
            }
        }

        for v in self.entries.values_mut() {
            if v.is_pending() && scanned.contains(&v.unit) && !live.contains(&v.id) {
                v.resolve(now, Resolution::External);
                summary.resolved_externally += 1;
            }
        }

        tracing::debug!(
            inserted = summary.inserted,
            unchanged = summary.unchanged,
            recurred = summary.recurred,
            resolved_externally = summary.resolved_externally,
            "ledger reconciled"
        );
        summary
    }

    /// Record violations observed outside a scan cycle, e.g. leftovers of an
    /// applied fix. Ids already pending are kept; everything else becomes a
    /// new pending entry. Returns the ledger ids the violations landed on.
    pub fn record_found(&mut self, found: &[Violation]) -> Vec<String> {
        found
            .iter()
            .map(|v| match self.slot(&v.id) {
                Slot::Pending(id) => id,
                Slot::Vacant(id) => {
                    self.insert_as(&id, v);
                    id
                }
            })
            .collect()
    }

    /// First pending id in the recurrence chain of `base`, or the first
    /// unused one.
    fn slot(&self, base: &str) -> Slot {
        let mut n = 0;
        loop {
            let id = if n == 0 {
                base.to_string()
            } else {
                recurrence_id(base, n)
            };
            match self.entries.get(&id) {
                Some(v) if v.is_pending() => return Slot::Pending(id),
                Some(_) => n += 1,
                None => return Slot::Vacant(id),
            }
        }
    }

    fn insert_as(&mut self, id: &str, v: &Violation) {
        let mut entry = v.clone();
        entry.id = id.to_string();
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Close a violation through an applied attempt. Returns false if the
    /// id is unknown or already resolved.
    pub fn resolve_by_attempt(&mut self, id: &str, attempt_id: &str, at: u64) -> bool {
        match self.entries.get_mut(id) {
            Some(v) => v.resolve(
                at,
                Resolution::AutoRefactor {
                    attempt_id: attempt_id.to_string(),
                },
            ),
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Violation> {
        self.entries.get(id)
    }

    pub fn pending(&self) -> Vec<&Violation> {
        self.entries.values().filter(|v| v.is_pending()).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Violation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
