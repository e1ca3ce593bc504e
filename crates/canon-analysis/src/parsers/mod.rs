//! Syntax parsing via tree-sitter.

pub mod error_tolerant;
pub mod language;

pub use language::Language;

use canon_core::errors::ParseError;
use canon_core::types::Unit;
use tree_sitter::{Parser, Tree};

/// A unit parsed into a syntax tree. Trees with ERROR or MISSING nodes are
/// rejected, so every `ParsedUnit` is syntactically complete.
pub struct ParsedUnit<'u> {
    pub unit: &'u Unit,
    pub language: Language,
    pub tree: Tree,
}

impl<'u> ParsedUnit<'u> {
    pub fn source(&self) -> &'u str {
        &self.unit.content
    }

    /// Text of a node from this unit's tree.
    pub fn node_text(&self, node: &tree_sitter::Node<'_>) -> &'u str {
        let src = self.source();
        src.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }
}

/// Parse a unit, choosing the grammar from its file extension.
pub fn parse_unit(unit: &Unit) -> Result<ParsedUnit<'_>, ParseError> {
    let language = Language::from_extension(unit.unit_ref.extension()).ok_or_else(|| {
        ParseError::UnsupportedLanguage {
            unit: unit.unit_ref.to_string(),
        }
    })?;

    let mut parser = Parser::new();
    parser
        .set_language(&language.ts_language())
        .map_err(|e| ParseError::GrammarLoad {
            language: language.name().to_string(),
            message: e.to_string(),
        })?;

    let tree = parser
        .parse(&unit.content, None)
        .ok_or_else(|| ParseError::ParseFailed {
            unit: unit.unit_ref.to_string(),
        })?;

    let error_count = error_tolerant::count_errors(tree.root_node());
    if error_count > 0 {
        return Err(ParseError::SyntaxErrors {
            unit: unit.unit_ref.to_string(),
            error_count,
        });
    }

    Ok(ParsedUnit {
        unit,
        language,
        tree,
    })
}
