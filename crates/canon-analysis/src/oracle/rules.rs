//! Declarative anti-pattern rules, extensible without recompiling.

use std::path::Path;

use serde::{Deserialize, Serialize};

use canon_core::errors::ConfigError;
use canon_core::types::Severity;

use crate::parsers::Language;

/// Rules shipped with canon.
pub const BUILTIN_RULES_TOML: &str = r#"
[[rules]]
kind = "typescript_any"
name = "TypeScript any"
pattern = ':\s*any\b|<any>|\bany\[\]'
severity = "medium"
node_types = ["type_annotation", "type_arguments", "array_type"]
languages = ["typescript"]

[[rules]]
kind = "ts_ignore"
name = "TypeScript error suppression"
pattern = '@ts-ignore|@ts-expect-error'
severity = "high"
node_types = ["comment"]
languages = ["typescript", "javascript"]

[[rules]]
kind = "console_log"
name = "console.log left in source"
pattern = '^console\.log\s*\('
severity = "low"
node_types = ["call_expression"]
languages = ["typescript", "javascript"]

[[rules]]
kind = "img_tag"
name = "Raw <img> element"
pattern = '^<img\b'
severity = "low"
node_types = ["jsx_opening_element", "jsx_self_closing_element"]
languages = ["typescript", "javascript"]

[[rules]]
kind = "fetch_in_useeffect"
name = "Fetch inside useEffect"
pattern = '^useEffect\s*\([\s\S]*\bfetch\s*\('
severity = "medium"
node_types = ["call_expression"]
languages = ["typescript", "javascript"]

[[rules]]
kind = "polling"
name = "Polling with setInterval"
pattern = '^setInterval\s*\([\s\S]*\b(?:fetch|axios)\b'
severity = "high"
node_types = ["call_expression"]
languages = ["typescript", "javascript"]

[[rules]]
kind = "unused_imports"
name = "Unused import binding"
check = "unused_imports"
severity = "low"
languages = ["typescript", "javascript"]
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiPatternRuleDef {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub pattern: String,
    /// Built-in structural check used instead of a pattern.
    pub check: Option<String>,
    pub severity: String,
    #[serde(default)]
    pub node_types: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AntiPatternRuleFile {
    #[serde(default)]
    pub rules: Vec<AntiPatternRuleDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralCheck {
    UnusedImports,
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(regex::Regex),
    Check(StructuralCheck),
}

/// A compiled rule ready for matching.
#[derive(Debug, Clone)]
pub struct AntiPatternRule {
    pub kind: String,
    pub name: String,
    pub matcher: Matcher,
    pub severity: Severity,
    /// When non-empty, the pattern only matches inside nodes of these kinds.
    pub node_types: Vec<String>,
    pub languages: Vec<String>,
}

impl AntiPatternRule {
    pub fn applies_to(&self, language: Language) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language.name())
    }
}

pub struct RuleLoader;

impl RuleLoader {
    pub fn builtin() -> Result<Vec<AntiPatternRule>, ConfigError> {
        Self::load_from_str(BUILTIN_RULES_TOML)
    }

    pub fn load_from_str(toml_str: &str) -> Result<Vec<AntiPatternRule>, ConfigError> {
        let file: AntiPatternRuleFile =
            toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
                path: "<rules>".to_string(),
                message: e.to_string(),
            })?;
        file.rules
            .into_iter()
            .filter(|def| def.enabled != Some(false))
            .map(Self::compile)
            .collect()
    }

    pub fn load_from_file(path: &Path) -> Result<Vec<AntiPatternRule>, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::load_from_str(&content)
    }

    fn compile(def: AntiPatternRuleDef) -> Result<AntiPatternRule, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidRule {
            kind: def.kind.clone(),
            message,
        };
        if def.kind.trim().is_empty() {
            return Err(invalid("kind must not be empty".to_string()));
        }
        let severity = Severity::parse_str(&def.severity)
            .ok_or_else(|| invalid(format!("unknown severity '{}'", def.severity)))?;

        let matcher = match (def.check.as_deref(), def.pattern.is_empty()) {
            (Some("unused_imports"), _) => Matcher::Check(StructuralCheck::UnusedImports),
            (Some(other), _) => return Err(invalid(format!("unknown check '{other}'"))),
            (None, true) => return Err(invalid("a pattern or check is required".to_string())),
            (None, false) => Matcher::Regex(
                regex::Regex::new(&def.pattern).map_err(|e| invalid(format!("regex error: {e}")))?,
            ),
        };

        Ok(AntiPatternRule {
            kind: def.kind.trim().to_string(),
            name: def.name,
            matcher,
            severity,
            node_types: def.node_types,
            languages: def.languages.iter().map(|l| l.to_ascii_lowercase()).collect(),
        })
    }
}
