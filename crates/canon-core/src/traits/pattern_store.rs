//! Pattern persistence seam.

use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::errors::RegistryError;
use crate::types::Pattern;

/// Load and save pattern definitions.
pub trait PatternStore: Send + Sync {
    /// All patterns, ordered by id.
    fn load_all(&self) -> Result<Vec<Pattern>, RegistryError>;
    fn load_by_id(&self, id: &str) -> Result<Option<Pattern>, RegistryError>;
    /// Insert or replace.
    fn save(&self, pattern: &Pattern) -> Result<(), RegistryError>;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryPatternStore {
    patterns: Mutex<FxHashMap<String, Pattern>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FxHashMap<String, Pattern>>, RegistryError> {
        self.patterns.lock().map_err(|e| RegistryError::Store {
            message: e.to_string(),
        })
    }
}

impl PatternStore for InMemoryPatternStore {
    fn load_all(&self) -> Result<Vec<Pattern>, RegistryError> {
        let mut all: Vec<Pattern> = self.lock()?.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn load_by_id(&self, id: &str) -> Result<Option<Pattern>, RegistryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn save(&self, pattern: &Pattern) -> Result<(), RegistryError> {
        self.lock()?.insert(pattern.id.clone(), pattern.clone());
        Ok(())
    }
}
