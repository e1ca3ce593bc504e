//! Transformation routines referenced by Fix Catalog rules.
//!
//! Built-ins cover the LOW tier. MEDIUM migrations are registered by the
//! embedding application.

use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashMap;
use tree_sitter::Node;

use canon_core::errors::TransformError;
use canon_core::types::Unit;

use crate::imports::remove_unused_imports;
use crate::parsers::{parse_unit, ParsedUnit};

/// A deterministic source-to-source rewrite of one unit.
pub trait Transform: Send + Sync {
    fn id(&self) -> &str;
    fn apply(&self, unit: &Unit) -> Result<String, TransformError>;
}

/// Ordered regex substitutions.
pub struct RegexTransform {
    id: String,
    rules: Vec<(Regex, String)>,
}

impl RegexTransform {
    pub fn new(id: impl Into<String>, rules: &[(&str, &str)]) -> Result<Self, TransformError> {
        let id = id.into();
        let compiled = rules
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, replacement.to_string()))
                    .map_err(|e| TransformError::NotApplicable {
                        id: id.clone(),
                        unit: "<init>".to_string(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { id, rules: compiled })
    }
}

impl Transform for RegexTransform {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&self, unit: &Unit) -> Result<String, TransformError> {
        let mut content = unit.content.clone();
        for (re, replacement) in &self.rules {
            content = re.replace_all(&content, replacement.as_str()).into_owned();
        }
        Ok(content)
    }
}

/// `<img>` → framework `Image`, adding the import when missing.
pub struct ImgToImage {
    tag: Regex,
    close: Regex,
    import: Regex,
    directive: Regex,
}

impl ImgToImage {
    pub const ID: &'static str = "replace_img_with_image";
    const IMPORT_LINE: &'static str = "import Image from 'next/image';\n";

    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            tag: Regex::new(r"<img\b")?,
            close: Regex::new(r"</img\s*>")?,
            import: Regex::new(r"(?m)^import\s")?,
            directive: Regex::new(r#"^\s*(?:'use client'|"use client");?[ \t]*\r?\n"#)?,
        })
    }
}

impl Transform for ImgToImage {
    fn id(&self) -> &str {
        Self::ID
    }

    fn apply(&self, unit: &Unit) -> Result<String, TransformError> {
        if !self.tag.is_match(&unit.content) {
            return Ok(unit.content.clone());
        }
        let mut content = self.tag.replace_all(&unit.content, "<Image").into_owned();
        content = self.close.replace_all(&content, "</Image>").into_owned();

        if !content.contains("import Image from") {
            let pos = match self.import.find(&content) {
                Some(m) => m.start(),
                None => self.directive.find(&content).map(|m| m.end()).unwrap_or(0),
            };
            content.insert_str(pos, Self::IMPORT_LINE);
        }
        Ok(content)
    }
}

/// Deletes `console.log(...)` expression statements. Calls nested inside
/// other expressions, or used as the lone body of `if`/loops, are left alone.
pub struct ConsoleLogRemoval;

impl ConsoleLogRemoval {
    pub const ID: &'static str = "remove_console_log";
}

impl Transform for ConsoleLogRemoval {
    fn id(&self) -> &str {
        Self::ID
    }

    fn apply(&self, unit: &Unit) -> Result<String, TransformError> {
        let parsed = parse_for(Self::ID, unit)?;
        let mut edits = Vec::new();
        collect_console_logs(&parsed, parsed.tree.root_node(), &mut edits);
        Ok(apply_edits(parsed.source(), edits))
    }
}

fn collect_console_logs(parsed: &ParsedUnit<'_>, node: Node<'_>, edits: &mut Vec<Edit>) {
    if node.kind() == "expression_statement" && is_console_log_statement(parsed, node) {
        edits.push(statement_removal(parsed.source(), node));
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_console_logs(parsed, child, edits);
    }
}

fn is_console_log_statement(parsed: &ParsedUnit<'_>, stmt: Node<'_>) -> bool {
    let in_block = stmt
        .parent()
        .is_some_and(|p| matches!(p.kind(), "program" | "statement_block"));
    let call = match stmt.named_child(0) {
        Some(call) if call.kind() == "call_expression" => call,
        _ => return false,
    };
    let callee = call
        .child_by_field_name("function")
        .map(|f| parsed.node_text(&f))
        .unwrap_or("");
    in_block && callee.split_whitespace().collect::<String>() == "console.log"
}

/// Range covering a statement. A statement alone on its line takes the
/// whole line with it; otherwise trailing blanks up to the next token go.
fn statement_removal(src: &str, node: Node<'_>) -> Edit {
    let bytes = src.as_bytes();
    let (start, mut end) = (node.start_byte(), node.end_byte());
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }
    let line_start = src[..start].rfind('\n').map_or(0, |i| i + 1);
    let alone = src[line_start..start].trim().is_empty()
        && (end == bytes.len() || matches!(bytes[end], b'\r' | b'\n'));
    if !alone {
        let at_line_end = end == bytes.len() || matches!(bytes[end], b'\r' | b'\n');
        let start = if at_line_end {
            src[..start].trim_end_matches([' ', '\t']).len()
        } else {
            start
        };
        return (start, end, String::new());
    }
    if end < bytes.len() && bytes[end] == b'\r' {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        end += 1;
    }
    (line_start, end, String::new())
}

/// `any` → `unknown` inside type annotations, type arguments, and array
/// types. Strings, comments, and bare `as any` casts are untouched.
pub struct AnyToUnknown;

impl AnyToUnknown {
    pub const ID: &'static str = "replace_any_with_unknown";
}

impl Transform for AnyToUnknown {
    fn id(&self) -> &str {
        Self::ID
    }

    fn apply(&self, unit: &Unit) -> Result<String, TransformError> {
        let parsed = parse_for(Self::ID, unit)?;
        let mut edits = Vec::new();
        collect_any_types(&parsed, parsed.tree.root_node(), false, &mut edits);
        Ok(apply_edits(parsed.source(), edits))
    }
}

fn collect_any_types(
    parsed: &ParsedUnit<'_>,
    node: Node<'_>,
    in_type: bool,
    edits: &mut Vec<Edit>,
) {
    let in_type = in_type
        || matches!(
            node.kind(),
            "type_annotation" | "type_arguments" | "array_type"
        );
    if in_type && node.kind() == "predefined_type" && parsed.node_text(&node) == "any" {
        edits.push((node.start_byte(), node.end_byte(), "unknown".to_string()));
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_any_types(parsed, child, in_type, edits);
    }
}

/// Drops import bindings that are never referenced.
pub struct UnusedImports;

impl UnusedImports {
    pub const ID: &'static str = "remove_unused_imports";
}

impl Transform for UnusedImports {
    fn id(&self) -> &str {
        Self::ID
    }

    fn apply(&self, unit: &Unit) -> Result<String, TransformError> {
        let parsed = parse_for(Self::ID, unit)?;
        Ok(remove_unused_imports(&parsed))
    }
}

/// Byte range and its replacement.
type Edit = (usize, usize, String);

fn parse_for<'u>(id: &str, unit: &'u Unit) -> Result<ParsedUnit<'u>, TransformError> {
    parse_unit(unit).map_err(|e| TransformError::NotApplicable {
        id: id.to_string(),
        unit: unit.unit_ref.to_string(),
        message: e.to_string(),
    })
}

/// Applies non-overlapping edits back to front so earlier offsets stay valid.
fn apply_edits(src: &str, mut edits: Vec<Edit>) -> String {
    let mut out = src.to_string();
    edits.sort_by(|a, b| b.0.cmp(&a.0));
    for (start, end, replacement) in edits {
        out.replace_range(start..end, &replacement);
    }
    out
}

/// Transforms by id.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: FxHashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Result<Self, TransformError> {
        let mut registry = Self::new();
        registry.register(Arc::new(AnyToUnknown));
        registry.register(Arc::new(RegexTransform::new(
            "remove_ts_ignore",
            &[(r"(?m)^[ \t]*//[ \t]*@ts-(?:ignore|expect-error)[^\n]*\n?", "")],
        )?));
        registry.register(Arc::new(ConsoleLogRemoval));
        let img = ImgToImage::new().map_err(|e| TransformError::NotApplicable {
            id: ImgToImage::ID.to_string(),
            unit: "<init>".to_string(),
            message: e.to_string(),
        })?;
        registry.register(Arc::new(img));
        registry.register(Arc::new(UnusedImports));
        Ok(registry)
    }

    /// Replaces any transform with the same id.
    pub fn register(&mut self, transform: Arc<dyn Transform>) {
        self.transforms.insert(transform.id().to_string(), transform);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Transform>> {
        self.transforms.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.transforms.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry").field("ids", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, path: &str, src: &str) -> String {
        let registry = TransformRegistry::with_builtins().unwrap();
        registry.get(id).unwrap().apply(&Unit::new(path, src)).unwrap()
    }

    #[test]
    fn test_any_to_unknown() {
        assert_eq!(
            run("replace_any_with_unknown", "a.ts", "let a: any = f<any>(x as any[]);\n"),
            "let a: unknown = f<unknown>(x as unknown[]);\n"
        );
    }

    #[test]
    fn test_remove_ts_ignore() {
        assert_eq!(
            run("remove_ts_ignore", "a.ts", "const a = 1;\n  // @ts-ignore\nfoo(a);\n// @ts-expect-error why\nbar();\n"),
            "const a = 1;\nfoo(a);\nbar();\n"
        );
    }

    #[test]
    fn test_remove_console_log() {
        assert_eq!(
            run("remove_console_log", "a.ts", "function f() {\n  console.log('x', 1);\n  return 2;\n}\n"),
            "function f() {\n  return 2;\n}\n"
        );
    }

    #[test]
    fn test_any_outside_type_positions_is_kept() {
        let src = "const s = 'a: any'; // b: any[]\nlet v = x as any;\n";
        assert_eq!(run("replace_any_with_unknown", "a.ts", src), src);
        assert_eq!(
            run("replace_any_with_unknown", "a.ts", "function f(a: Array<any>): any[] { return a; }\n"),
            "function f(a: Array<unknown>): unknown[] { return a; }\n"
        );
    }

    #[test]
    fn test_console_log_sharing_a_line_keeps_neighbours() {
        assert_eq!(
            run("remove_console_log", "a.ts", "console.log(a); save(a);\nexport const x = 1;\n"),
            "save(a);\nexport const x = 1;\n"
        );
        assert_eq!(
            run("remove_console_log", "a.ts", "save(a); console.log(a);\n"),
            "save(a);\n"
        );
    }

    #[test]
    fn test_multiline_console_log_removed_whole() {
        assert_eq!(
            run("remove_console_log", "a.ts", "console.log(\n  a,\n);\nsave(a);\nconsole.log(b);\n"),
            "save(a);\n"
        );
    }

    #[test]
    fn test_console_log_in_expression_or_lone_body_kept() {
        let src = "if (x) console.log(a);\nconst f = () => console.log(b);\nlog(console.log);\n";
        assert_eq!(run("remove_console_log", "a.ts", src), src);
    }

    #[test]
    fn test_img_to_image() {
        let out = run(
            "replace_img_with_image",
            "p.tsx",
            "'use client';\nexport const P = () => <img src=\"a.png\" />;\n",
        );
        assert_eq!(
            out,
            "'use client';\nimport Image from 'next/image';\nexport const P = () => <Image src=\"a.png\" />;\n"
        );
    }

    #[test]
    fn test_img_import_goes_before_first_import() {
        let out = run(
            "replace_img_with_image",
            "p.tsx",
            "import x from 'x';\nexport const P = () => <img src={x} />;\n",
        );
        assert!(out.starts_with("import Image from 'next/image';\nimport x from 'x';\n"));
    }

    #[test]
    fn test_builtin_ids() {
        let registry = TransformRegistry::with_builtins().unwrap();
        assert_eq!(
            registry.ids(),
            vec![
                "remove_console_log",
                "remove_ts_ignore",
                "remove_unused_imports",
                "replace_any_with_unknown",
                "replace_img_with_image"
            ]
        );
    }
}
