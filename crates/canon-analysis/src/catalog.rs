//! Risk-classified Fix Catalog: violation kind → transform → risk tier.
//!
//! Pure configuration data, validated once at load. Risk tier and approval
//! policy live in the table, not in code branches, so new kinds need no
//! code changes.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use canon_core::config::CanonConfig;
use canon_core::constants::DEFAULT_DEBT_HOURS;
use canon_core::errors::ConfigError;
use canon_core::types::{FixRule, RiskTier};

/// Transform id carried by HIGH-risk rules.
pub const MANUAL_REVIEW: &str = "manual_review_required";

/// Catalog shipped with canon.
pub const BUILTIN_CATALOG_TOML: &str = r#"
[[rules]]
violation_kind = "typescript_any"
transform_id = "replace_any_with_unknown"
risk_tier = "low"
debt_hours = 0.25
description = "Replace `any` with `unknown`"

[[rules]]
violation_kind = "ts_ignore"
transform_id = "remove_ts_ignore"
risk_tier = "low"
debt_hours = 0.5
description = "Remove @ts-ignore / @ts-expect-error suppressions"

[[rules]]
violation_kind = "console_log"
transform_id = "remove_console_log"
risk_tier = "low"
debt_hours = 0.1
description = "Remove console.log statements"

[[rules]]
violation_kind = "img_tag"
transform_id = "replace_img_with_image"
risk_tier = "low"
debt_hours = 0.25
description = "Replace <img> with the framework Image component"

[[rules]]
violation_kind = "unused_imports"
transform_id = "remove_unused_imports"
risk_tier = "low"
debt_hours = 0.1
description = "Drop import bindings that are never referenced"

[[rules]]
violation_kind = "fetch_in_useeffect"
transform_id = "migrate_to_sse"
risk_tier = "medium"
requires_approval = true
debt_hours = 2.0
description = "Move effect-driven fetching to a server-sent event stream"

[[rules]]
violation_kind = "polling"
transform_id = "migrate_to_sse"
risk_tier = "medium"
requires_approval = true
debt_hours = 3.0
description = "Replace interval polling with push notifications"

[[rules]]
violation_kind = "missing_zod_validation"
transform_id = "add_zod_schema"
risk_tier = "medium"
requires_approval = true
debt_hours = 1.0

[[rules]]
violation_kind = "no_error_boundary"
transform_id = "add_error_boundary"
risk_tier = "medium"
requires_approval = true
debt_hours = 1.0

[[rules]]
violation_kind = "client_component_async"
risk_tier = "high"
debt_hours = 4.0

[[rules]]
violation_kind = "state_management_conflict"
risk_tier = "high"
debt_hours = 8.0

[[rules]]
violation_kind = "api_structure_change"
risk_tier = "high"
debt_hours = 8.0
"#;

/// One catalog row as written in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRuleDef {
    /// Defaults to `violation_kind`.
    pub id: Option<String>,
    #[serde(alias = "kind")]
    pub violation_kind: String,
    pub transform_id: Option<String>,
    pub risk_tier: String,
    pub requires_approval: Option<bool>,
    pub debt_hours: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixCatalogFile {
    #[serde(default)]
    pub rules: Vec<FixRuleDef>,
}

/// Validated, immutable catalog.
#[derive(Debug, Clone, Default)]
pub struct FixCatalog {
    rules: Vec<FixRule>,
    by_kind: FxHashMap<String, usize>,
}

impl FixCatalog {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::load_from_str(BUILTIN_CATALOG_TOML)
    }

    /// The catalog file named by `catalog.path`, or the built-in catalog.
    pub fn from_config(config: &CanonConfig, root: &Path) -> Result<Self, ConfigError> {
        match config.catalog_path(root) {
            Some(path) => Self::load_from_file(&path),
            None => Self::builtin(),
        }
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let file: FixCatalogFile = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<catalog>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_defs(file.rules)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::load_from_str(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Catalog named by config, else the built-in one.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Self::builtin(),
        }
    }

    pub fn from_defs(defs: Vec<FixRuleDef>) -> Result<Self, ConfigError> {
        let mut catalog = FixCatalog::default();
        let mut ids: FxHashSet<String> = FxHashSet::default();
        for def in defs {
            let rule = compile(def)?;
            if catalog.by_kind.contains_key(&rule.violation_kind) {
                return Err(entry_error(&rule.violation_kind, "duplicate violation kind"));
            }
            if !ids.insert(rule.id.clone()) {
                return Err(entry_error(&rule.violation_kind, "duplicate rule id"));
            }
            catalog
                .by_kind
                .insert(rule.violation_kind.clone(), catalog.rules.len());
            catalog.rules.push(rule);
        }
        tracing::debug!(rules = catalog.rules.len(), "fix catalog loaded");
        Ok(catalog)
    }

    pub fn rule_for(&self, kind: &str) -> Option<&FixRule> {
        self.by_kind.get(kind).map(|&i| &self.rules[i])
    }

    /// Unknown kinds classify as HIGH: never automated.
    pub fn risk_tier_for(&self, kind: &str) -> RiskTier {
        self.rule_for(kind)
            .map(|r| r.risk_tier)
            .unwrap_or(RiskTier::High)
    }

    pub fn debt_hours_for(&self, kind: &str) -> f64 {
        self.rule_for(kind)
            .map(|r| r.debt_hours)
            .unwrap_or(DEFAULT_DEBT_HOURS)
    }

    pub fn rules(&self) -> &[FixRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile(def: FixRuleDef) -> Result<FixRule, ConfigError> {
    let kind = def.violation_kind.trim().to_string();
    if kind.is_empty() {
        return Err(entry_error("<empty>", "violation_kind must not be empty"));
    }
    let risk_tier = RiskTier::parse_str(&def.risk_tier)
        .ok_or_else(|| entry_error(&kind, &format!("unknown risk tier '{}'", def.risk_tier)))?;

    let debt_hours = def.debt_hours.unwrap_or(DEFAULT_DEBT_HOURS);
    if !debt_hours.is_finite() || debt_hours < 0.0 {
        return Err(entry_error(&kind, "debt_hours must be a non-negative number"));
    }

    let transform_id = def.transform_id.map(|t| t.trim().to_string());
    let (transform_id, requires_approval) = match risk_tier {
        RiskTier::Low => {
            let t = transform_id
                .filter(|t| !t.is_empty() && t != MANUAL_REVIEW)
                .ok_or_else(|| entry_error(&kind, "LOW rules need a transform_id"))?;
            (t, def.requires_approval.unwrap_or(false))
        }
        RiskTier::Medium => {
            if def.requires_approval == Some(false) {
                return Err(entry_error(&kind, "MEDIUM rules always require approval"));
            }
            let t = transform_id
                .filter(|t| !t.is_empty() && t != MANUAL_REVIEW)
                .ok_or_else(|| entry_error(&kind, "MEDIUM rules need a transform_id"))?;
            (t, true)
        }
        RiskTier::High => {
            if let Some(t) = transform_id.as_deref() {
                if !t.is_empty() && t != MANUAL_REVIEW {
                    return Err(entry_error(
                        &kind,
                        "HIGH rules are never automated and cannot name a transform",
                    ));
                }
            }
            (MANUAL_REVIEW.to_string(), true)
        }
    };

    let id = def
        .id
        .map(|i| i.trim().to_string())
        .unwrap_or_else(|| kind.clone());
    if id.is_empty() {
        return Err(entry_error(&kind, "id must not be empty"));
    }

    Ok(FixRule {
        id,
        violation_kind: kind,
        transform_id,
        risk_tier,
        requires_approval,
        debt_hours,
        description: def.description,
    })
}

fn entry_error(kind: &str, message: &str) -> ConfigError {
    ConfigError::InvalidCatalogEntry {
        kind: kind.to_string(),
        message: message.to_string(),
    }
}
