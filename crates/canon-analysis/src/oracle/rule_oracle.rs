//! Rule-driven oracle over tree-sitter syntax trees.

use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashMap;
use tree_sitter::Node;

use canon_core::config::CanonConfig;
use canon_core::errors::{ConfigError, ParseError};
use canon_core::types::{Pattern, PatternStatus, RiskTier, Unit, Violation};

use super::rules::{AntiPatternRule, Matcher, RuleLoader, StructuralCheck};
use super::{violation_id, ViolationOracle};
use crate::catalog::FixCatalog;
use crate::imports::analyze_imports;
use crate::parsers::{parse_unit, ParsedUnit};

pub struct RuleOracle {
    rules: Vec<AntiPatternRule>,
    tiers: FxHashMap<String, RiskTier>,
    /// Stamped on every violation found in the current scan cycle, keeping
    /// `scan` a pure function of its inputs.
    cycle_timestamp: u64,
}

impl RuleOracle {
    pub fn new(rules: Vec<AntiPatternRule>, catalog: &FixCatalog) -> Self {
        let tiers = catalog
            .rules()
            .iter()
            .map(|r| (r.violation_kind.clone(), r.risk_tier))
            .collect();
        Self {
            rules,
            tiers,
            cycle_timestamp: 0,
        }
    }

    pub fn builtin(catalog: &FixCatalog) -> Result<Self, ConfigError> {
        Ok(Self::new(RuleLoader::builtin()?, catalog))
    }

    pub fn with_cycle_timestamp(mut self, timestamp: u64) -> Self {
        self.cycle_timestamp = timestamp;
        self
    }

    /// Built-in rules plus the project rules file named by
    /// `catalog.rules_path`, if any.
    pub fn from_config(config: &CanonConfig, root: &Path, catalog: &FixCatalog) -> Result<Self, ConfigError> {
        let mut oracle = Self::builtin(catalog)?;
        if let Some(path) = config.rules_path(root) {
            oracle.extend_rules(RuleLoader::load_from_file(&path)?);
        }
        Ok(oracle)
    }

    pub fn extend_rules(&mut self, rules: Vec<AntiPatternRule>) {
        self.rules.extend(rules);
    }

    pub fn rules(&self) -> &[AntiPatternRule] {
        &self.rules
    }

    fn risk_tier(&self, kind: &str) -> RiskTier {
        self.tiers.get(kind).copied().unwrap_or(RiskTier::High)
    }
}

impl ViolationOracle for RuleOracle {
    fn scan(&self, unit: &Unit, patterns: &[Pattern]) -> Result<Vec<Violation>, ParseError> {
        let parsed = parse_unit(unit)?;
        let lines = LineIndex::new(parsed.source());
        let owners = deviation_owners(patterns);

        // (line, kind) → message; first rule per key wins.
        let mut hits: BTreeMap<(u32, String), (String, &AntiPatternRule)> = BTreeMap::new();
        for rule in self.rules.iter().filter(|r| r.applies_to(parsed.language)) {
            for (line, message) in match_rule(rule, &parsed, &lines) {
                hits.entry((line, rule.kind.clone()))
                    .or_insert((message, rule));
            }
        }

        let violations = hits
            .into_iter()
            .map(|((line, kind), (message, rule))| Violation {
                id: violation_id(&unit.unit_ref, &kind, line),
                unit: unit.unit_ref.clone(),
                pattern_id: owners.get(kind.as_str()).map(|s| s.to_string()),
                risk_tier: self.risk_tier(&kind),
                severity: rule.severity,
                kind,
                line,
                message,
                detected_at: self.cycle_timestamp,
                resolved_at: None,
                resolution: None,
            })
            .collect();
        Ok(violations)
    }
}

/// Violation kind → adopted pattern it deviates from (lowest id wins).
fn deviation_owners(patterns: &[Pattern]) -> FxHashMap<&str, &str> {
    let mut owners: FxHashMap<&str, &str> = FxHashMap::default();
    for p in patterns.iter().filter(|p| p.status == PatternStatus::Adopted) {
        for kind in &p.deviations {
            owners
                .entry(kind.as_str())
                .and_modify(|id| {
                    if p.id.as_str() < *id {
                        *id = p.id.as_str();
                    }
                })
                .or_insert(p.id.as_str());
        }
    }
    owners
}

fn match_rule(
    rule: &AntiPatternRule,
    parsed: &ParsedUnit<'_>,
    lines: &LineIndex,
) -> Vec<(u32, String)> {
    match &rule.matcher {
        Matcher::Check(StructuralCheck::UnusedImports) => analyze_imports(parsed)
            .into_iter()
            .flat_map(|stmt| stmt.bindings.into_iter())
            .filter(|b| !b.used)
            .map(|b| (b.line, format!("{}: `{}` is never used", rule.name, b.local)))
            .collect(),
        Matcher::Regex(regex) if rule.node_types.is_empty() => regex
            .find_iter(parsed.source())
            .map(|m| (lines.line_of(m.start()), rule.name.clone()))
            .collect(),
        Matcher::Regex(regex) => {
            let mut out = Vec::new();
            let mut stack = vec![parsed.tree.root_node()];
            while let Some(node) = stack.pop() {
                if rule.node_types.iter().any(|t| t == node.kind()) {
                    let text = parsed.node_text(&node);
                    if let Some(m) = regex.find(text) {
                        out.push((lines.line_of(node.start_byte() + m.start()), rule.name.clone()));
                    }
                }
                push_children(node, &mut stack);
            }
            out
        }
    }
}

fn push_children<'t>(node: Node<'t>, stack: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    stack.extend(children.into_iter().rev());
}

/// Byte offset → 1-based line.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub(crate) fn line_of(&self, offset: usize) -> u32 {
        self.starts.partition_point(|&s| s <= offset) as u32
    }
}
