//! Pattern Learner: proposes canonical patterns by clustering quality-gated
//! units on structural fingerprints.
//!
//! The learner only reads. Its output is a ranked list of candidates for
//! external approval; `propose_all` hands them to the registry.

pub mod quality_gate;
pub mod relearning;
pub mod scoring;

use std::collections::BTreeMap;

use rayon::prelude::*;

use canon_core::config::LearningConfig;
use canon_core::errors::{RegistryError, RunAudit, RunIssue};
use canon_core::lock::ReadLease;
use canon_core::types::{Pattern, PatternStatus, Unit, UnitProfile, UnitRef};

use crate::fingerprint::{fingerprint, Fingerprint};
use crate::parsers::parse_unit;
use crate::registry::{ConsistencyTier, PatternRegistry, ProposeOutcome};
use quality_gate::QualityGate;
pub use relearning::{LearnedState, LearningMode};
use scoring::{CoverageTier, RankKey};

#[derive(Debug, Clone)]
pub struct CandidatePattern {
    pub pattern: Pattern,
    pub score: f64,
    pub coverage_tier: CoverageTier,
    pub consistency_tier: ConsistencyTier,
    pub recency: f64,
    pub total_covered_lines: u64,
    pub modification_frequency: u64,
}

#[derive(Debug, Default)]
pub struct LearningReport {
    /// Ranked best first, at most `top_n`.
    pub candidates: Vec<CandidatePattern>,
    pub units_considered: usize,
    pub units_gated_out: usize,
    pub clusters_formed: usize,
    /// Clusters below the instance threshold. Not retried until the next run.
    pub clusters_dropped: usize,
    /// Qualifying candidates cut by `top_n`.
    pub candidates_truncated: usize,
}

pub struct PatternLearner {
    gate: QualityGate,
    min_instances: u32,
    top_n: usize,
    relearn_threshold: f64,
}

impl PatternLearner {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            gate: QualityGate::from_config(&config.pattern_quality_gate),
            min_instances: config.pattern_quality_gate.effective_min_instances(),
            top_n: config.effective_top_n(),
            relearn_threshold: config.effective_relearn_threshold(),
        }
    }

    /// How much a scheduled run must redo, given the state captured after
    /// the previous run.
    pub fn relearn_mode(&self, previous: &LearnedState, units: &[Unit]) -> LearningMode {
        let changed = previous.changed_units(units).len();
        let mode = relearning::determine_mode(changed, units.len(), self.relearn_threshold);
        tracing::debug!(changed, total = units.len(), ?mode, "relearn mode chosen");
        mode
    }

    /// Run one learning pass. Requires a read lease so no refactor run can
    /// be mid-transformation while units are fingerprinted.
    pub fn learn(
        &self,
        profiles: &[UnitProfile],
        now: u64,
        _lease: &ReadLease<'_>,
    ) -> RunAudit<LearningReport> {
        let span = canon_core::learn_span!(profiles.len());
        let _guard = span.enter();

        let mut audit = RunAudit::new(LearningReport {
            units_considered: profiles.len(),
            ..Default::default()
        });

        let gated: Vec<&UnitProfile> = profiles
            .iter()
            .filter(|p| match self.gate.check(p, now) {
                Ok(()) => true,
                Err(reason) => {
                    tracing::debug!(unit = %p.unit.unit_ref, reason = %reason, "excluded by quality gate");
                    false
                }
            })
            .collect();
        audit.data.units_gated_out = profiles.len() - gated.len();

        let fingerprinted: Vec<(&UnitProfile, Result<Fingerprint, String>)> = gated
            .par_iter()
            .map(|p| {
                let fp = parse_unit(&p.unit)
                    .map(|parsed| fingerprint(&parsed))
                    .map_err(|e| e.to_string());
                (*p, fp)
            })
            .collect();

        let mut clusters: BTreeMap<u64, (Fingerprint, Vec<&UnitProfile>)> = BTreeMap::new();
        for (profile, result) in fingerprinted {
            match result {
                Ok(fp) => clusters
                    .entry(fp.hash)
                    .or_insert_with(|| (fp, Vec::new()))
                    .1
                    .push(profile),
                Err(message) => audit.record(RunIssue::ParseError {
                    unit: profile.unit.unit_ref.to_string(),
                    message,
                }),
            }
        }
        audit.data.clusters_formed = clusters.len();

        let mut ranked: Vec<(RankKey, CandidatePattern)> = Vec::new();
        for (_, (fp, members)) in clusters {
            if (members.len() as u32) < self.min_instances {
                audit.data.clusters_dropped += 1;
                continue;
            }
            let candidate = self.build_candidate(&fp, &members, now);
            let key = RankKey {
                score: candidate.score,
                covered_lines: candidate.total_covered_lines,
                modification_frequency: candidate.modification_frequency,
                fingerprint: fp.hash,
            };
            ranked.push((key, candidate));
        }
        ranked.sort_by(|a, b| a.0.compare(&b.0));

        audit.data.candidates_truncated = ranked.len().saturating_sub(self.top_n);
        audit.data.candidates = ranked
            .into_iter()
            .take(self.top_n)
            .map(|(_, c)| c)
            .collect();

        tracing::info!(
            gated_out = audit.data.units_gated_out,
            clusters = audit.data.clusters_formed,
            dropped = audit.data.clusters_dropped,
            candidates = audit.data.candidates.len(),
            "learning pass complete"
        );
        audit
    }

    fn build_candidate(&self, fp: &Fingerprint, members: &[&UnitProfile], now: u64) -> CandidatePattern {
        let n = members.len() as f64;
        let mean_coverage = members.iter().map(|m| m.coverage_pct).sum::<f64>() / n;
        let mean_age = members
            .iter()
            .map(|m| now.saturating_sub(m.modified_at) as f64)
            .sum::<f64>()
            / n;
        let total_covered_lines: u64 = members.iter().map(|m| u64::from(m.covered_lines)).sum();
        let modification_frequency: u64 =
            members.iter().map(|m| u64::from(m.modification_count)).sum();

        let instance_count = members.len() as u32;
        let coverage_tier = CoverageTier::from_mean(mean_coverage);
        let consistency_tier = ConsistencyTier::from_count(instance_count);
        let recency = scoring::recency(mean_age, self.gate.max_age_secs());
        let score = scoring::score(coverage_tier, consistency_tier, recency);

        let mut exemplars: Vec<UnitRef> = members.iter().map(|m| m.unit.unit_ref.clone()).collect();
        exemplars.sort();
        let hex = fp.hex();
        let description = format!(
            "Shared structure of {} units: {}",
            instance_count,
            exemplars
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        CandidatePattern {
            pattern: Pattern {
                id: format!("pat-{hex}"),
                name: format!("{} ({})", root_shape(&fp.skeleton), &hex[..8]),
                description,
                exemplars,
                status: PatternStatus::Proposed,
                instance_count,
                fingerprint: Some(hex),
                skeleton: Some(fp.skeleton.clone()),
                deviations: Vec::new(),
                created_at: now,
                updated_at: now,
            },
            score,
            coverage_tier,
            consistency_tier,
            recency,
            total_covered_lines,
            modification_frequency,
        }
    }
}

/// Kinds of the first few top-level nodes, used as a readable pattern name.
fn root_shape(skeleton: &str) -> String {
    let mut kinds = Vec::new();
    let mut depth = 0usize;
    for (i, c) in skeleton.char_indices() {
        match c {
            '(' => {
                depth += 1;
                if depth == 2 {
                    let rest = &skeleton[i + 1..];
                    let end = rest.find(|c: char| c == ' ' || c == ')').unwrap_or(rest.len());
                    kinds.push(&rest[..end]);
                    if kinds.len() == 3 {
                        break;
                    }
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if kinds.is_empty() {
        "empty".to_string()
    } else {
        kinds.join("+")
    }
}

/// Hand ranked candidates to the registry. Returns how many were new.
pub fn propose_all(
    registry: &PatternRegistry,
    candidates: &[CandidatePattern],
    now: u64,
) -> Result<usize, RegistryError> {
    let mut inserted = 0;
    for c in candidates {
        if registry.propose_scored(c.pattern.clone(), c.score, now)? == ProposeOutcome::Inserted {
            inserted += 1;
        }
    }
    Ok(inserted)
}
