//! Import binding analysis for TypeScript and JavaScript units.

use rustc_hash::FxHashSet;
use tree_sitter::Node;

use crate::parsers::{Language, ParsedUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingForm {
    Default,
    Namespace,
    Named,
}

#[derive(Debug, Clone)]
pub struct ImportBinding {
    /// Name the binding introduces into the module scope.
    pub local: String,
    /// Source text of the binding (`X`, `* as X`, `a as b`).
    pub text: String,
    pub form: BindingForm,
    pub line: u32,
    pub used: bool,
}

#[derive(Debug, Clone)]
pub struct ImportStatement {
    pub start: usize,
    pub end: usize,
    /// Byte range of the import clause, absent for side-effect imports.
    pub clause: Option<(usize, usize)>,
    pub bindings: Vec<ImportBinding>,
}

impl ImportStatement {
    pub fn any_unused(&self) -> bool {
        self.bindings.iter().any(|b| !b.used)
    }

    pub fn all_unused(&self) -> bool {
        !self.bindings.is_empty() && self.bindings.iter().all(|b| !b.used)
    }
}

fn supports(language: Language) -> bool {
    matches!(
        language,
        Language::TypeScript | Language::Tsx | Language::JavaScript
    )
}

/// Top-level import statements with per-binding usage.
pub fn analyze_imports(parsed: &ParsedUnit<'_>) -> Vec<ImportStatement> {
    if !supports(parsed.language) {
        return Vec::new();
    }
    let root = parsed.tree.root_node();
    let mut used = FxHashSet::default();
    collect_references(parsed, root, &mut used);

    let mut statements = Vec::new();
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        if node.kind() != "import_statement" {
            continue;
        }
        let mut stmt = ImportStatement {
            start: node.start_byte(),
            end: node.end_byte(),
            clause: None,
            bindings: Vec::new(),
        };
        let mut inner = node.walk();
        if let Some(clause) = node
            .named_children(&mut inner)
            .find(|c| c.kind() == "import_clause")
        {
            stmt.clause = Some((clause.start_byte(), clause.end_byte()));
            collect_bindings(parsed, clause, &used, &mut stmt.bindings);
        }
        statements.push(stmt);
    }
    statements
}

fn collect_bindings(
    parsed: &ParsedUnit<'_>,
    clause: Node<'_>,
    used: &FxHashSet<String>,
    out: &mut Vec<ImportBinding>,
) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => out.push(binding(parsed, child, child, BindingForm::Default, used)),
            "namespace_import" => {
                let mut c = child.walk();
                if let Some(id) = child
                    .named_children(&mut c)
                    .find(|n| n.kind() == "identifier")
                {
                    out.push(binding(parsed, child, id, BindingForm::Namespace, used));
                };
            }
            "named_imports" => {
                let mut c = child.walk();
                for spec in child.named_children(&mut c) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let local = spec
                        .child_by_field_name("alias")
                        .or_else(|| spec.child_by_field_name("name"));
                    if let Some(local) = local {
                        out.push(binding(parsed, spec, local, BindingForm::Named, used));
                    }
                }
            }
            _ => {}
        }
    }
}

fn binding(
    parsed: &ParsedUnit<'_>,
    whole: Node<'_>,
    local: Node<'_>,
    form: BindingForm,
    used: &FxHashSet<String>,
) -> ImportBinding {
    let name = parsed.node_text(&local).to_string();
    ImportBinding {
        used: used.contains(&name),
        local: name,
        text: parsed.node_text(&whole).to_string(),
        form,
        line: whole.start_position().row as u32 + 1,
    }
}

fn collect_references(parsed: &ParsedUnit<'_>, node: Node<'_>, used: &mut FxHashSet<String>) {
    if node.kind() == "import_statement" {
        return;
    }
    if matches!(
        node.kind(),
        "identifier" | "type_identifier" | "shorthand_property_identifier"
    ) {
        used.insert(parsed.node_text(&node).to_string());
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_references(parsed, child, used);
    }
}

/// Rewrite `parsed`'s source without its unused import bindings. Statements
/// whose every binding is unused are deleted with their line ending.
pub fn remove_unused_imports(parsed: &ParsedUnit<'_>) -> String {
    let src = parsed.source();
    let bytes = src.as_bytes();
    let mut edits: Vec<(usize, usize, String)> = Vec::new();

    for stmt in analyze_imports(parsed) {
        if !stmt.any_unused() {
            continue;
        }
        if stmt.all_unused() {
            let mut end = stmt.end;
            while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
                end += 1;
            }
            if end < bytes.len() && bytes[end] == b'\r' {
                end += 1;
            }
            if end < bytes.len() && bytes[end] == b'\n' {
                end += 1;
            }
            edits.push((stmt.start, end, String::new()));
            continue;
        }
        let Some((clause_start, clause_end)) = stmt.clause else {
            continue;
        };
        let mut parts: Vec<String> = Vec::new();
        for b in stmt.bindings.iter().filter(|b| b.used) {
            match b.form {
                BindingForm::Default => parts.push(b.local.clone()),
                BindingForm::Namespace => parts.push(b.text.clone()),
                BindingForm::Named => {}
            }
        }
        let named: Vec<&str> = stmt
            .bindings
            .iter()
            .filter(|b| b.used && b.form == BindingForm::Named)
            .map(|b| b.text.as_str())
            .collect();
        if !named.is_empty() {
            parts.push(format!("{{ {} }}", named.join(", ")));
        }
        edits.push((clause_start, clause_end, parts.join(", ")));
    }

    let mut out = src.to_string();
    edits.sort_by(|a, b| b.0.cmp(&a.0));
    for (start, end, replacement) in edits {
        out.replace_range(start..end, &replacement);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_unit;
    use canon_core::types::Unit;

    #[test]
    fn test_unused_bindings_detected() {
        let unit = Unit::new(
            "a.ts",
            "import { a, b as c } from './x';\nimport D from 'd';\nexport const y = a + 1;\n",
        );
        let parsed = parse_unit(&unit).unwrap();
        let stmts = analyze_imports(&parsed);
        assert_eq!(stmts.len(), 2);
        let unused: Vec<&str> = stmts
            .iter()
            .flat_map(|s| s.bindings.iter())
            .filter(|b| !b.used)
            .map(|b| b.local.as_str())
            .collect();
        assert_eq!(unused, vec!["c", "D"]);
    }

    #[test]
    fn test_remove_unused_imports() {
        let unit = Unit::new(
            "a.ts",
            "import { a, b } from './x';\nimport D from 'd';\nimport './side-effect';\nexport const y = a;\n",
        );
        let parsed = parse_unit(&unit).unwrap();
        assert_eq!(
            remove_unused_imports(&parsed),
            "import { a } from './x';\nimport './side-effect';\nexport const y = a;\n"
        );
    }

    #[test]
    fn test_jsx_usage_counts() {
        let unit = Unit::new(
            "p.tsx",
            "import Image from 'next/image';\nexport const P = () => <Image src=\"a\" />;\n",
        );
        let parsed = parse_unit(&unit).unwrap();
        assert!(!analyze_imports(&parsed)[0].any_unused());
    }
}
