//! Per-unit parse errors. Non-fatal: a scan isolates them and continues.

use super::error_code::{self, CanonErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unsupported language for {unit}")]
    UnsupportedLanguage { unit: String },

    #[error("Grammar load failed for {language}: {message}")]
    GrammarLoad { language: String, message: String },

    #[error("Parse failed for {unit}")]
    ParseFailed { unit: String },

    #[error("Syntax errors in {unit}: {error_count} error node(s)")]
    SyntaxErrors { unit: String, error_count: usize },
}

impl ParseError {
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::UnsupportedLanguage { unit }
            | Self::ParseFailed { unit }
            | Self::SyntaxErrors { unit, .. } => Some(unit),
            Self::GrammarLoad { .. } => None,
        }
    }
}

impl CanonErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage { .. } => error_code::UNSUPPORTED_LANGUAGE,
            _ => error_code::PARSE_ERROR,
        }
    }
}
