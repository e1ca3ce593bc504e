//! Fix catalog location.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to a Fix Catalog TOML file, relative to the project root.
    /// The built-in catalog is used when unset.
    pub path: Option<String>,
    /// Path to an anti-pattern rule TOML file appended to the built-in rules.
    pub rules_path: Option<String>,
}
