//! Error types surfaced by the parsing entry points.

use thiserror::Error;

/// Errors that abort a parse call.
///
/// Syntax errors only appear here when the call runs in
/// [`ErrorMode::Raise`](crate::oci::parsing::ErrorMode::Raise); the other modes
/// collect or drop them instead.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A character outside printable ASCII survived comment stripping.
    /// `position` is 1-based and counts characters of the original text.
    #[error(
        "Invalid character {character:?} (U+{:04X}) at position {position}. Only printable ASCII is supported.",
        *.character as u32
    )]
    InvalidCharacter { position: usize, character: char },

    #[error("syntax error at line {line}, col {column}.")]
    Syntax { line: usize, column: usize },

    #[error("syntax error while parsing {what}.")]
    SyntaxUnlocated { what: &'static str },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ParseError {
    /// True for grammar violations, as opposed to input or I/O problems.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. } | Self::SyntaxUnlocated { .. })
    }
}
