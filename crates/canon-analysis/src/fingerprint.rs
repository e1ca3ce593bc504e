//! Structural fingerprints.
//!
//! A unit's fingerprint is the xxh3 hash of an S-expression rendering of its
//! syntax tree in which identifiers are replaced by their syntactic role
//! (the field name they occupy in their parent, else `ref`) and literals by
//! `lit`. Keywords survive; punctuation and comments do not. Two units that
//! differ only in names and constant values share a fingerprint.

use std::fmt::Write;

use tree_sitter::TreeCursor;
use xxhash_rust::xxh3::xxh3_64;

use crate::parsers::ParsedUnit;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub hash: u64,
    pub skeleton: String,
}

impl Fingerprint {
    pub fn hex(&self) -> String {
        format!("{:016x}", self.hash)
    }
}

const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "property_identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
    "private_property_identifier",
    "type_identifier",
    "field_identifier",
    "statement_identifier",
    "nested_identifier",
];

const LITERAL_KINDS: &[&str] = &[
    "string",
    "template_string",
    "number",
    "regex",
    "true",
    "false",
    "null",
    "undefined",
    "integer",
    "float",
    "none",
    "concatenated_string",
    "string_literal",
    "raw_string_literal",
    "char_literal",
    "integer_literal",
    "float_literal",
    "boolean_literal",
];

pub fn fingerprint(parsed: &ParsedUnit<'_>) -> Fingerprint {
    let mut skeleton = String::with_capacity(parsed.source().len() / 2);
    let mut cursor = parsed.tree.walk();
    write_node(&mut cursor, &mut skeleton);
    let skeleton = skeleton.trim_start().to_string();
    Fingerprint {
        hash: xxh3_64(skeleton.as_bytes()),
        skeleton,
    }
}

fn write_node(cursor: &mut TreeCursor<'_>, out: &mut String) {
    let node = cursor.node();
    let kind = node.kind();

    if node.is_extra() {
        return;
    }
    if !node.is_named() {
        if is_keyword(kind) {
            out.push(' ');
            out.push_str(kind);
        }
        return;
    }
    if IDENTIFIER_KINDS.contains(&kind) {
        let role = cursor.field_name().unwrap_or("ref");
        let _ = write!(out, " (id:{role})");
        return;
    }
    if LITERAL_KINDS.contains(&kind) {
        out.push_str(" lit");
        return;
    }

    out.push_str(" (");
    out.push_str(kind);
    if cursor.goto_first_child() {
        loop {
            write_node(cursor, out);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
    out.push(')');
}

fn is_keyword(kind: &str) -> bool {
    !kind.is_empty() && kind.bytes().all(|b| b.is_ascii_alphabetic() || b == b'_')
}
