//! `PatternStore` backed by the patterns table.

use std::sync::Arc;

use canon_core::errors::{RegistryError, StorageError};
use canon_core::traits::PatternStore;
use canon_core::types::Pattern;

use crate::connection::DatabaseManager;
use crate::queries::patterns;

pub struct SqlitePatternStore {
    db: Arc<DatabaseManager>,
}

impl SqlitePatternStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

fn store_err(e: StorageError) -> RegistryError {
    RegistryError::Store {
        message: e.to_string(),
    }
}

impl PatternStore for SqlitePatternStore {
    fn load_all(&self) -> Result<Vec<Pattern>, RegistryError> {
        self.db.with_reader(patterns::query_all).map_err(store_err)
    }

    fn load_by_id(&self, id: &str) -> Result<Option<Pattern>, RegistryError> {
        self.db
            .with_reader(|conn| patterns::get_pattern(conn, id))
            .map_err(store_err)
    }

    fn save(&self, pattern: &Pattern) -> Result<(), RegistryError> {
        self.db
            .with_writer(|conn| patterns::upsert_pattern(conn, pattern))
            .map_err(store_err)
    }
}
