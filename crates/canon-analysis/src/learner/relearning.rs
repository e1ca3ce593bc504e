//! Re-learning trigger for scheduled learner runs.
//!
//! The learner remembers a content hash per unit from its last run. When
//! more than `threshold` of the units changed, clusters are rebuilt from
//! scratch; a smaller change set only refreshes the affected clusters.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_64;

use canon_core::types::{Unit, UnitRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningMode {
    Full,
    Incremental,
    Skip,
}

/// Content hashes from a previous run.
#[derive(Debug, Clone, Default)]
pub struct LearnedState {
    hashes: FxHashMap<UnitRef, u64>,
}

impl LearnedState {
    pub fn capture(units: &[Unit]) -> Self {
        Self {
            hashes: units
                .iter()
                .map(|u| (u.unit_ref.clone(), xxh3_64(u.content.as_bytes())))
                .collect(),
        }
    }

    /// Units added, removed, or edited since this state was captured.
    pub fn changed_units(&self, current: &[Unit]) -> Vec<UnitRef> {
        let mut changed: Vec<UnitRef> = current
            .iter()
            .filter(|u| self.hashes.get(&u.unit_ref) != Some(&xxh3_64(u.content.as_bytes())))
            .map(|u| u.unit_ref.clone())
            .collect();
        let present: rustc_hash::FxHashSet<&UnitRef> = current.iter().map(|u| &u.unit_ref).collect();
        changed.extend(self.hashes.keys().filter(|r| !present.contains(r)).cloned());
        changed.sort();
        changed
    }
}

/// Choose how much learning a scheduled run needs.
pub fn determine_mode(changed: usize, total: usize, threshold: f64) -> LearningMode {
    if changed == 0 {
        return LearningMode::Skip;
    }
    if total == 0 || changed as f64 / total as f64 > threshold {
        LearningMode::Full
    } else {
        LearningMode::Incremental
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert_eq!(determine_mode(0, 100, 0.10), LearningMode::Skip);
        assert_eq!(determine_mode(10, 100, 0.10), LearningMode::Incremental);
        assert_eq!(determine_mode(11, 100, 0.10), LearningMode::Full);
        assert_eq!(determine_mode(3, 0, 0.10), LearningMode::Full);
    }

    #[test]
    fn test_changed_units() {
        let before = vec![Unit::new("a.ts", "1"), Unit::new("b.ts", "2"), Unit::new("c.ts", "3")];
        let state = LearnedState::capture(&before);
        let after = vec![Unit::new("a.ts", "1"), Unit::new("b.ts", "22"), Unit::new("d.ts", "4")];
        let changed: Vec<String> = state
            .changed_units(&after)
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(changed, vec!["b.ts", "c.ts", "d.ts"]);
    }
}
