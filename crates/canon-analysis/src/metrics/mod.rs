//! Metrics & Health-Score Engine.
//!
//! One [`MetricSnapshot`] per scan cycle, appended to an in-memory history
//! that the debt trend and [`MetricsEngine::compare_with_past`] read from.

pub mod compare;
pub mod health;

pub use compare::{compare, DeltaReport, Direction, MetricDelta, Verdict};
pub use health::health_score;

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use canon_core::config::MetricsConfig;
use canon_core::events::types::SnapshotRecordedEvent;
use canon_core::events::EventDispatcher;
use canon_core::lock::ReadLease;
use canon_core::types::{
    AttemptOutcome, HealthComponents, MetricSnapshot, Pattern, PatternStatus, RefactorAttempt,
    Severity, UnitRef, Violation,
};

use crate::catalog::FixCatalog;

const SECONDS_PER_DAY: u64 = 86_400;

/// Everything a snapshot is computed from.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub timestamp: u64,
    /// Units scanned this cycle.
    pub units: &'a [UnitRef],
    /// Violations known after the scan; only pending ones count.
    pub violations: &'a [Violation],
    /// Overall test coverage percentage.
    pub coverage_pct: f64,
    pub patterns: &'a [Pattern],
    /// Recent refactor attempts; filtered to the throughput window.
    pub attempts: &'a [RefactorAttempt],
}

pub struct MetricsEngine {
    config: MetricsConfig,
    catalog: FixCatalog,
    history: Vec<MetricSnapshot>,
    events: EventDispatcher,
}

impl MetricsEngine {
    pub fn new(config: MetricsConfig, catalog: FixCatalog) -> Self {
        Self {
            config,
            catalog,
            history: Vec::new(),
            events: EventDispatcher::new(),
        }
    }

    /// Seed with previously persisted snapshots (any order).
    pub fn with_history(mut self, mut history: Vec<MetricSnapshot>) -> Self {
        history.sort_by_key(|s| s.timestamp);
        self.history = history;
        self
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn history(&self) -> &[MetricSnapshot] {
        &self.history
    }

    pub fn latest(&self) -> Option<&MetricSnapshot> {
        self.history.last()
    }

    /// Compute and append this cycle's snapshot.
    pub fn collect(&mut self, obs: &Observation<'_>, _lease: &ReadLease<'_>) -> MetricSnapshot {
        let span = canon_core::metrics_span!(obs.units.len());
        let _guard = span.enter();

        let snapshot = self.compute(obs);
        tracing::info!(
            health_score = snapshot.health_score,
            consistency = snapshot.consistency_score,
            debt_hours = snapshot.debt_hours_estimate,
            violations = snapshot.total_violations,
            "metric snapshot recorded"
        );
        self.events.emit_snapshot_recorded(&SnapshotRecordedEvent {
            timestamp: snapshot.timestamp,
            health_score: snapshot.health_score,
        });
        self.history.push(snapshot.clone());
        snapshot
    }

    /// The snapshot `collect` would produce, without recording it.
    pub fn compute(&self, obs: &Observation<'_>) -> MetricSnapshot {
        let scanned: FxHashSet<&UnitRef> = obs.units.iter().collect();
        let pending: Vec<&Violation> = obs
            .violations
            .iter()
            .filter(|v| v.is_pending() && scanned.contains(&v.unit))
            .collect();

        let mut by_severity: BTreeMap<Severity, u32> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut weighted = 0.0;
        let mut debt_hours = 0.0;
        let mut dirty: FxHashSet<&UnitRef> = FxHashSet::default();
        for v in &pending {
            *by_severity.entry(v.severity).or_insert(0) += 1;
            weighted += v.severity.weight();
            debt_hours += self.catalog.debt_hours_for(&v.kind);
            dirty.insert(&v.unit);
        }

        let mut by_status: BTreeMap<PatternStatus, u32> =
            PatternStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for p in obs.patterns {
            *by_status.entry(p.status).or_insert(0) += 1;
        }

        let window_start = obs
            .timestamp
            .saturating_sub(u64::from(self.config.effective_throughput_window_days()) * SECONDS_PER_DAY);
        let recent = obs
            .attempts
            .iter()
            .filter(|a| !a.dry_run && a.finished_at >= window_start && a.finished_at <= obs.timestamp);
        let (mut applied, mut rolled_back) = (0u32, 0u32);
        for a in recent {
            match a.outcome {
                AttemptOutcome::Applied => applied += 1,
                AttemptOutcome::RolledBack => rolled_back += 1,
                AttemptOutcome::Skipped => {}
            }
        }

        let total_units = obs.units.len();
        let consistency = health::consistency(total_units - dirty.len().min(total_units), total_units);
        let coverage = health::bounded(obs.coverage_pct);
        let components = HealthComponents {
            consistency,
            coverage,
            violation_density: health::density_score(weighted, total_units),
            debt_trend: health::trend_score(
                &self.debt_series(debt_hours),
                self.config.effective_trend_saturation_hours(),
            ),
            throughput: health::throughput_score(applied, self.config.effective_throughput_target()),
        };

        MetricSnapshot {
            timestamp: obs.timestamp,
            consistency_score: consistency,
            violation_counts_by_severity: by_severity,
            debt_hours_estimate: debt_hours,
            health_score: health_score(&components),
            coverage_pct: coverage,
            total_violations: pending.len() as u32,
            patterns_by_status: by_status,
            refactors_applied: applied,
            refactors_rolled_back: rolled_back,
            components,
        }
    }

    /// Debt hours of the trailing window, oldest first, ending with `current`.
    fn debt_series(&self, current: f64) -> Vec<f64> {
        let window = self.config.effective_trend_window().max(2);
        let prior = window - 1;
        let start = self.history.len().saturating_sub(prior);
        self.history[start..]
            .iter()
            .map(|s| s.debt_hours_estimate)
            .chain(std::iter::once(current))
            .collect()
    }

    pub fn compare(&self, a: &MetricSnapshot, b: &MetricSnapshot) -> DeltaReport {
        compare(a, b)
    }

    /// Latest snapshot against the newest one at least `days` older.
    pub fn compare_with_past(&self, days: u32) -> Option<DeltaReport> {
        let latest = self.history.last()?;
        let cutoff = latest
            .timestamp
            .checked_sub(u64::from(days) * SECONDS_PER_DAY)?;
        let past = self
            .history
            .iter()
            .rev()
            .find(|s| s.timestamp <= cutoff && s.timestamp < latest.timestamp)?;
        Some(compare(past, latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_core::types::RiskTier;

    fn violation(unit: &str, kind: &str, severity: Severity) -> Violation {
        Violation {
            id: format!("{unit}:{kind}"),
            unit: UnitRef::new(unit),
            kind: kind.to_string(),
            pattern_id: None,
            line: 1,
            message: String::new(),
            severity,
            risk_tier: RiskTier::Low,
            detected_at: 0,
            resolved_at: None,
            resolution: None,
        }
    }

    fn engine() -> MetricsEngine {
        MetricsEngine::new(MetricsConfig::default(), FixCatalog::builtin().unwrap())
    }

    #[test]
    fn test_snapshot_counts() {
        let units = vec![UnitRef::new("a.ts"), UnitRef::new("b.ts"), UnitRef::new("c.ts"), UnitRef::new("d.ts")];
        let mut resolved = violation("c.ts", "console_log", Severity::Low);
        resolved.resolve(10, canon_core::types::Resolution::External);
        let violations = vec![
            violation("a.ts", "typescript_any", Severity::Medium),
            violation("a.ts", "console_log", Severity::Low),
            violation("b.ts", "polling", Severity::High),
            resolved,
        ];
        let snap = engine().compute(&Observation {
            timestamp: 1_000,
            units: &units,
            violations: &violations,
            coverage_pct: 82.0,
            patterns: &[],
            attempts: &[],
        });
        assert_eq!(snap.total_violations, 3);
        assert_eq!(snap.consistency_score, 50.0);
        assert_eq!(snap.violations_with(Severity::Low), 1);
        assert_eq!(snap.violations_with(Severity::Critical), 0);
        // 0.25 + 0.1 + 3.0
        assert!((snap.debt_hours_estimate - 3.35).abs() < 1e-9);
        assert_eq!(snap.components.debt_trend, health::NEUTRAL_TREND);
        assert!((snap.health_score - health_score(&snap.components)).abs() < 1e-12);
    }

    #[test]
    fn test_compare_with_past_picks_older_snapshot() {
        let mut engine = engine();
        let mut snapshots = Vec::new();
        for (i, ts) in [0u64, 3 * SECONDS_PER_DAY, 10 * SECONDS_PER_DAY].into_iter().enumerate() {
            let units = vec![UnitRef::new("a.ts")];
            let violations: Vec<Violation> = (0..(3 - i))
                .map(|n| {
                    let mut v = violation("a.ts", "console_log", Severity::Low);
                    v.id = format!("v{n}");
                    v
                })
                .collect();
            snapshots.push(engine.compute(&Observation {
                timestamp: ts,
                units: &units,
                violations: &violations,
                coverage_pct: 80.0,
                patterns: &[],
                attempts: &[],
            }));
        }
        engine = engine.with_history(snapshots);
        let report = engine.compare_with_past(7).unwrap();
        assert_eq!(report.from_timestamp, 3 * SECONDS_PER_DAY);
        assert_eq!(report.to_timestamp, 10 * SECONDS_PER_DAY);
        assert_eq!(report.get("total_violations").unwrap().verdict, Verdict::Improved);
        assert!(engine.compare_with_past(30).is_none());
    }
}
