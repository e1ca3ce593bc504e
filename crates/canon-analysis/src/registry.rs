//! Pattern Registry: canonical pattern definitions and their lifecycle.
//!
//! proposed → trial needs `instance_count >= 3`; trial → adopted needs
//! `instance_count >= 5` plus explicit approval. Status never moves
//! backwards on its own; only `retire` leaves the ladder, and only by hand.

use std::sync::Arc;

use canon_core::constants::{CANDIDATE_INSTANCES, STANDARD_INSTANCES, STRONG_INSTANCES};
use canon_core::errors::RegistryError;
use canon_core::events::types::{PatternPromotedEvent, PatternProposedEvent, PatternRetiredEvent};
use canon_core::events::EventDispatcher;
use canon_core::traits::PatternStore;
use canon_core::types::{Pattern, PatternStatus};

/// How widely a pattern is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConsistencyTier {
    Emerging,
    Candidate,
    Strong,
    Standard,
}

impl ConsistencyTier {
    pub fn from_count(instances: u32) -> Self {
        if instances >= STANDARD_INSTANCES {
            Self::Standard
        } else if instances >= STRONG_INSTANCES {
            Self::Strong
        } else if instances >= CANDIDATE_INSTANCES {
            Self::Candidate
        } else {
            Self::Emerging
        }
    }

    /// Contribution to a learner candidate's score.
    pub fn score(&self) -> f64 {
        match self {
            Self::Standard => 1.0,
            Self::Strong => 0.8,
            Self::Candidate => 0.6,
            Self::Emerging => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposeOutcome {
    Inserted,
    /// Same id already known; counts and exemplars refreshed, status kept.
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub pattern_id: String,
    pub from: PatternStatus,
    pub to: PatternStatus,
}

pub struct PatternRegistry {
    store: Arc<dyn PatternStore>,
    events: EventDispatcher,
}

impl PatternRegistry {
    pub fn new(store: Arc<dyn PatternStore>) -> Self {
        Self {
            store,
            events: EventDispatcher::new(),
        }
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn all(&self) -> Result<Vec<Pattern>, RegistryError> {
        self.store.load_all()
    }

    pub fn get(&self, id: &str) -> Result<Pattern, RegistryError> {
        self.store
            .load_by_id(id)?
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    pub fn adopted(&self) -> Result<Vec<Pattern>, RegistryError> {
        Ok(self
            .store
            .load_all()?
            .into_iter()
            .filter(|p| p.status == PatternStatus::Adopted)
            .collect())
    }

    /// Register a hand-written candidate, scored by its consistency tier alone.
    pub fn propose(&self, candidate: Pattern, now: u64) -> Result<ProposeOutcome, RegistryError> {
        let score = ConsistencyTier::from_count(candidate.instance_count).score();
        self.propose_scored(candidate, score, now)
    }

    /// Register a candidate with the learner's score. New patterns always
    /// enter as `Proposed`.
    pub fn propose_scored(
        &self,
        mut candidate: Pattern,
        score: f64,
        now: u64,
    ) -> Result<ProposeOutcome, RegistryError> {
        if let Some(mut existing) = self.store.load_by_id(&candidate.id)? {
            existing.instance_count = candidate.instance_count;
            existing.exemplars = candidate.exemplars;
            if candidate.skeleton.is_some() {
                existing.skeleton = candidate.skeleton;
            }
            existing.updated_at = now;
            self.store.save(&existing)?;
            return Ok(ProposeOutcome::Refreshed);
        }

        candidate.status = PatternStatus::Proposed;
        candidate.created_at = now;
        candidate.updated_at = now;
        self.store.save(&candidate)?;
        tracing::info!(
            pattern_id = %candidate.id,
            instances = candidate.instance_count,
            score,
            "pattern proposed"
        );
        self.events.emit_pattern_proposed(&PatternProposedEvent {
            pattern_id: candidate.id.clone(),
            instance_count: candidate.instance_count,
            score,
        });
        Ok(ProposeOutcome::Inserted)
    }

    /// Update the observed instance count. Never changes status.
    pub fn record_instances(&self, id: &str, count: u32, now: u64) -> Result<(), RegistryError> {
        let mut pattern = self.get(id)?;
        pattern.instance_count = count;
        pattern.updated_at = now;
        self.store.save(&pattern)
    }

    /// Move a pattern one rung up the ladder.
    pub fn promote(
        &self,
        id: &str,
        to: PatternStatus,
        approved: bool,
        now: u64,
    ) -> Result<Promotion, RegistryError> {
        let mut pattern = self.get(id)?;
        let from = pattern.status;
        let reject = |reason: &str| RegistryError::PromotionRejected {
            id: id.to_string(),
            from,
            to,
            reason: reason.to_string(),
        };

        match (from, to) {
            (PatternStatus::Proposed, PatternStatus::Trial) => {
                if pattern.instance_count < CANDIDATE_INSTANCES {
                    return Err(reject("needs at least 3 instances"));
                }
            }
            (PatternStatus::Trial, PatternStatus::Adopted) => {
                if pattern.instance_count < STRONG_INSTANCES {
                    return Err(reject("needs at least 5 instances"));
                }
                if !approved {
                    return Err(reject("adoption requires explicit approval"));
                }
            }
            _ => return Err(reject("not a single-step promotion")),
        }

        pattern.status = to;
        pattern.updated_at = now;
        self.store.save(&pattern)?;
        tracing::info!(pattern_id = %id, %from, %to, "pattern promoted");
        self.events.emit_pattern_promoted(&PatternPromotedEvent {
            pattern_id: id.to_string(),
            from,
            to,
        });
        Ok(Promotion {
            pattern_id: id.to_string(),
            from,
            to,
        })
    }

    /// Explicit approval of a trial pattern.
    pub fn approve(&self, id: &str, now: u64) -> Result<Promotion, RegistryError> {
        self.promote(id, PatternStatus::Adopted, true, now)
    }

    /// Periodic review: proposed patterns that crossed the candidate
    /// threshold move to trial. Adoption is never automatic.
    pub fn review(&self, now: u64) -> Result<Vec<Promotion>, RegistryError> {
        let mut promotions = Vec::new();
        for p in self.store.load_all()? {
            if p.status == PatternStatus::Proposed && p.instance_count >= CANDIDATE_INSTANCES {
                promotions.push(self.promote(&p.id, PatternStatus::Trial, false, now)?);
            }
        }
        Ok(promotions)
    }

    /// Manual retirement.
    pub fn retire(&self, id: &str, now: u64) -> Result<(), RegistryError> {
        let mut pattern = self.get(id)?;
        if pattern.status == PatternStatus::Retired {
            return Ok(());
        }
        pattern.status = PatternStatus::Retired;
        pattern.updated_at = now;
        self.store.save(&pattern)?;
        tracing::info!(pattern_id = %id, "pattern retired");
        self.events.emit_pattern_retired(&PatternRetiredEvent {
            pattern_id: id.to_string(),
        });
        Ok(())
    }
}
