//! Lexing for policy statements and matching rules
//!
//! Both languages are tokenized by logos. Whitespace is skipped by the token
//! definitions themselves; characters that fit no token are kept as an
//! `Unknown` token so the parser reports them at the right place instead of
//! silently dropping them.

pub mod policy_tokens;
pub mod rule_tokens;

use std::ops::Range;

use logos::Logos;
use serde::Serialize;

use crate::oci::source::SourceLocation;

pub use policy_tokens::PolicyToken;
pub use rule_tokens::RuleToken;

/// A token paired with its byte range in the cleaned text.
pub type Spanned<T> = (T, Range<usize>);

/// Coarse lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Keyword,
    Identifier,
    String,
    Ocid,
    Regex,
    Punctuation,
    Unknown,
}

/// Shared view over the two token sets, used by diagnostics.
pub trait TokenClass {
    fn kind(&self) -> TokenKind;

    /// Name used in "expecting ..." lists.
    fn display_name(&self) -> &'static str;
}

/// A token with its text and position, for inspection and tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// Tokenize comment-stripped policy text.
pub fn tokenize_policy(cleaned: &str) -> Vec<Spanned<PolicyToken>> {
    tokenize_with(cleaned, PolicyToken::Unknown)
}

/// Tokenize a single matching-rule chunk.
pub fn tokenize_rule(chunk: &str) -> Vec<Spanned<RuleToken>> {
    tokenize_with(chunk, RuleToken::Unknown)
}

fn tokenize_with<'s, T>(source: &'s str, unknown: fn(String) -> T) -> Vec<Spanned<T>>
where
    T: Logos<'s, Source = str>,
    T::Extras: Default,
{
    let mut lexer = T::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let token = match result {
            Ok(token) => token,
            Err(_) => unknown(lexer.slice().to_string()),
        };
        tokens.push((token, lexer.span()));
    }

    tokens
}

/// Attach text and line/column to a token stream.
pub fn lexemes<T: TokenClass>(source: &str, tokens: &[Spanned<T>]) -> Vec<Lexeme> {
    let location = SourceLocation::new(source);
    tokens
        .iter()
        .map(|(token, span)| {
            let (line, column) = location.position(span.start);
            Lexeme {
                kind: token.kind(),
                text: location.slice(span).to_string(),
                start: span.start,
                end: span.end,
                line,
                column,
            }
        })
        .collect()
}
