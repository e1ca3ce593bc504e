//! Pattern Learner and registry: quality gate, clustering, promotion ladder.

use std::sync::{Arc, Mutex};

use canon_analysis::learner::{propose_all, LearnedState, LearningMode};
use canon_analysis::{PatternLearner, PatternRegistry};
use canon_core::config::LearningConfig;
use canon_core::errors::RegistryError;
use canon_core::events::types::PatternProposedEvent;
use canon_core::events::{CanonEventHandler, EventDispatcher};
use canon_core::lock::WorkTreeLock;
use canon_core::traits::InMemoryPatternStore;
use canon_core::types::{PatternStatus, Unit, UnitProfile};

const NOW: u64 = 1_700_000_000;
const DAY: u64 = 86_400;

fn handler(name: &str, table: &str, limit: u32) -> String {
    format!(
        "export async function {name}(id: string) {{\n  const rows = await db.query('{table}', id);\n  if (rows.length > {limit}) {{\n    return rows.slice(0, {limit});\n  }}\n  return rows;\n}}\n"
    )
}

fn profile(path: &str, content: String, coverage: f64) -> UnitProfile {
    UnitProfile {
        unit: Unit::new(path, content),
        coverage_pct: coverage,
        covered_lines: 40,
        has_regression_history: false,
        modified_at: NOW - 10 * DAY,
        modification_count: 3,
    }
}

fn profiles() -> Vec<UnitProfile> {
    vec![
        profile("src/api/users.ts", handler("getUsers", "users", 10), 95.0),
        profile("src/api/orders.ts", handler("getOrders", "orders", 25), 95.0),
        profile("src/api/items.ts", handler("getItems", "items", 50), 95.0),
        // Same shape, but poorly tested: must not seed the pattern.
        profile("src/api/legacy.ts", handler("getLegacy", "legacy", 5), 60.0),
        profile("src/util.ts", "export const sum = (a: number, b: number) => a + b;\n".into(), 95.0),
    ]
}

#[test]
fn test_only_quality_units_seed_a_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_read().unwrap();

    let audit = PatternLearner::new(&LearningConfig::default()).learn(&profiles(), NOW, &lease);
    let report = audit.data;

    assert!(audit.issues.is_empty());
    assert_eq!(report.units_considered, 5);
    assert_eq!(report.units_gated_out, 1);
    assert_eq!(report.clusters_formed, 2);
    assert_eq!(report.clusters_dropped, 1);
    assert_eq!(report.candidates.len(), 1);

    let candidate = &report.candidates[0].pattern;
    assert_eq!(candidate.instance_count, 3);
    assert_eq!(candidate.status, PatternStatus::Proposed);
    let exemplars: Vec<&str> = candidate.exemplars.iter().map(|e| e.as_str()).collect();
    assert_eq!(
        exemplars,
        vec!["src/api/items.ts", "src/api/orders.ts", "src/api/users.ts"]
    );
    assert!(candidate.fingerprint.is_some());
    assert!(report.candidates[0].score > 0.0);
}

#[test]
fn test_learning_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_read().unwrap();
    let learner = PatternLearner::new(&LearningConfig::default());

    let a = learner.learn(&profiles(), NOW, &lease).data;
    let mut reversed = profiles();
    reversed.reverse();
    let b = learner.learn(&reversed, NOW, &lease).data;

    assert_eq!(a.candidates.len(), b.candidates.len());
    assert_eq!(a.candidates[0].pattern, b.candidates[0].pattern);
}

#[test]
fn test_stale_units_are_gated_out() {
    let dir = tempfile::tempdir().unwrap();
    let lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_read().unwrap();

    let mut stale = profiles();
    for p in &mut stale {
        p.modified_at = NOW - 365 * DAY;
    }
    let report = PatternLearner::new(&LearningConfig::default())
        .learn(&stale, NOW, &lease)
        .data;
    assert_eq!(report.units_gated_out, 5);
    assert!(report.candidates.is_empty());
}

#[derive(Default)]
struct Proposals(Mutex<Vec<(String, f64)>>);

impl CanonEventHandler for Proposals {
    fn on_pattern_proposed(&self, event: &PatternProposedEvent) {
        self.0.lock().unwrap().push((event.pattern_id.clone(), event.score));
    }
}

#[test]
fn test_proposal_event_carries_candidate_score() {
    let dir = tempfile::tempdir().unwrap();
    let lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_read().unwrap();

    let recorder = Arc::new(Proposals::default());
    let mut events = EventDispatcher::new();
    events.register(recorder.clone());
    let registry = PatternRegistry::new(Arc::new(InMemoryPatternStore::new())).with_events(events);
    let report = PatternLearner::new(&LearningConfig::default())
        .learn(&profiles(), NOW, &lease)
        .data;
    propose_all(&registry, &report.candidates, NOW).unwrap();

    let seen = recorder.0.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let candidate = &report.candidates[0];
    assert_eq!(seen[0].0, candidate.pattern.id);
    assert!(candidate.score > 0.0);
    assert!((seen[0].1 - candidate.score).abs() < 1e-12);
}

#[test]
fn test_promotion_ladder_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let lock = WorkTreeLock::open(dir.path()).unwrap();
    let lease = lock.try_read().unwrap();

    let registry = PatternRegistry::new(Arc::new(InMemoryPatternStore::new()));
    let report = PatternLearner::new(&LearningConfig::default())
        .learn(&profiles(), NOW, &lease)
        .data;
    assert_eq!(propose_all(&registry, &report.candidates, NOW).unwrap(), 1);
    // Proposing the same candidates again refreshes instead of inserting.
    assert_eq!(propose_all(&registry, &report.candidates, NOW + 1).unwrap(), 0);

    let id = report.candidates[0].pattern.id.clone();
    assert_eq!(registry.get(&id).unwrap().status, PatternStatus::Proposed);

    // 3 instances: review moves the pattern to trial.
    let promoted = registry.review(NOW + 2).unwrap();
    assert_eq!(promoted.len(), 1);
    assert_eq!(promoted[0].to, PatternStatus::Trial);

    // Adoption needs 5 instances and explicit approval.
    assert!(matches!(
        registry.approve(&id, NOW + 3),
        Err(RegistryError::PromotionRejected { .. })
    ));
    registry.record_instances(&id, 5, NOW + 4).unwrap();
    assert!(registry.promote(&id, PatternStatus::Adopted, false, NOW + 5).is_err());
    assert!(registry.review(NOW + 6).unwrap().is_empty());
    assert_eq!(registry.get(&id).unwrap().status, PatternStatus::Trial);

    let adopted = registry.approve(&id, NOW + 7).unwrap();
    assert_eq!(adopted.from, PatternStatus::Trial);
    assert_eq!(adopted.to, PatternStatus::Adopted);

    // Losing instances never demotes.
    registry.record_instances(&id, 1, NOW + 8).unwrap();
    registry.review(NOW + 9).unwrap();
    assert_eq!(registry.get(&id).unwrap().status, PatternStatus::Adopted);
    assert_eq!(registry.adopted().unwrap().len(), 1);

    // Retirement is manual and idempotent.
    registry.retire(&id, NOW + 10).unwrap();
    registry.retire(&id, NOW + 11).unwrap();
    assert_eq!(registry.get(&id).unwrap().status, PatternStatus::Retired);
}

#[test]
fn test_relearn_mode_follows_change_ratio() {
    let learner = PatternLearner::new(&LearningConfig::default());
    let units: Vec<Unit> = profiles().into_iter().map(|p| p.unit).collect();
    let state = LearnedState::capture(&units);

    assert_eq!(learner.relearn_mode(&state, &units), LearningMode::Skip);

    // One edited unit out of five is above the 10% threshold.
    let mut edited = units.clone();
    edited[4] = Unit::new("src/util.ts", "export const sum = (a: number, b: number) => b + a;\n");
    assert_eq!(learner.relearn_mode(&state, &edited), LearningMode::Full);

    let lenient = PatternLearner::new(&LearningConfig {
        relearn_threshold: Some(0.5),
        ..Default::default()
    });
    assert_eq!(lenient.relearn_mode(&state, &edited), LearningMode::Incremental);
}
