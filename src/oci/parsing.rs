//! Parsing
//!
//! chumsky grammars turn token vectors into the concrete trees in [`cst`].
//! Parsers consume `(token, byte range)` pairs so that a failure can always
//! name the offending token's position in the cleaned text.
//!
//! A statement or rule is first parsed whole. When that fails, a [`Cursor`]
//! walks the same tokens field by field with the same sub-parsers, skipping
//! to the next keyword or separator after each error, so the fields around a
//! syntax error are still read and every separate error is found. The
//! result is a [`Recovered`] tree.

pub mod cst;
pub mod policy;
pub mod rules;

use std::collections::BTreeSet;
use std::hash::Hash;
use std::ops::Range;

use chumsky::error::Simple;
use chumsky::prelude::*;
use serde::{Deserialize, Serialize};

use crate::oci::lexing::{Spanned, TokenClass};
use crate::oci::source::SourceLocation;

/// How syntax errors are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Stop at the first syntax error and return it.
    #[default]
    #[serde(alias = "fail-fast")]
    Raise,
    /// Keep going and return every syntax error alongside the output.
    #[serde(alias = "collect")]
    Report,
    /// Keep going and drop syntax errors.
    #[serde(alias = "silent")]
    Ignore,
}

impl std::str::FromStr for ErrorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raise" | "fail-fast" => Ok(Self::Raise),
            "report" | "collect" => Ok(Self::Report),
            "ignore" | "silent" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown error mode '{other}' (expected raise, report or ignore)"
            )),
        }
    }
}

/// The token a parse failed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offending {
    pub text: String,
    pub range: Range<usize>,
}

/// Why a statement or rule failed to parse.
///
/// `offending` is `None` when the parser ran out of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFailure {
    pub offending: Option<Offending>,
    pub expected: Vec<&'static str>,
}

impl SyntaxFailure {
    /// Build from chumsky errors over `(token, byte range)` input, keeping the
    /// earliest one.
    pub(crate) fn from_errors<T>(errors: Vec<Simple<Spanned<T>>>, source: &SourceLocation) -> Self
    where
        T: TokenClass + Hash + Eq + Clone,
    {
        let Some(first) = errors.into_iter().min_by_key(|e| e.span().start) else {
            return Self {
                offending: None,
                expected: Vec::new(),
            };
        };

        let expected: BTreeSet<&'static str> = first
            .expected()
            .filter_map(|e| e.as_ref().map(|(token, _)| token.display_name()))
            .collect();

        let offending = first.found().map(|(_, range)| Offending {
            text: source.slice(range).to_string(),
            range: range.clone(),
        });

        Self {
            offending,
            expected: expected.into_iter().collect(),
        }
    }

    /// Where the failure points; running out of input sorts last.
    fn position(&self) -> usize {
        self.offending.as_ref().map_or(usize::MAX, |o| o.range.start)
    }
}

/// A statement or rule that failed to parse, with what could still be read.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered<T> {
    /// The first error. Raise mode reports only this one.
    pub failure: SyntaxFailure,
    /// Further errors, in source order.
    pub later: Vec<SyntaxFailure>,
    /// `None` when nothing could be read.
    pub partial: Option<T>,
}

impl<T> Recovered<T> {
    pub fn failures(&self) -> impl Iterator<Item = &SyntaxFailure> {
        std::iter::once(&self.failure).chain(&self.later)
    }

    pub fn failures_mut(&mut self) -> impl Iterator<Item = &mut SyntaxFailure> {
        std::iter::once(&mut self.failure).chain(&mut self.later)
    }

    pub fn error_count(&self) -> usize {
        1 + self.later.len()
    }
}

/// Walks a token slice after a failed parse.
///
/// An error is kept only when it lies past the last kept one, and once an
/// error is seen nothing more is kept until a token matches again.
pub(crate) struct Cursor<'t, 's, T> {
    tokens: &'t [Spanned<T>],
    source: &'t SourceLocation<'s>,
    pos: usize,
    recovering: bool,
    first: SyntaxFailure,
    later: Vec<SyntaxFailure>,
}

impl<'t, 's, T> Cursor<'t, 's, T>
where
    T: TokenClass + Hash + Eq + Clone + 'static,
{
    /// `first` is the error the whole-input parse stopped at.
    pub(crate) fn new(
        tokens: &'t [Spanned<T>],
        source: &'t SourceLocation<'s>,
        first: SyntaxFailure,
    ) -> Self {
        Self {
            tokens,
            source,
            pos: 0,
            recovering: false,
            first,
            later: Vec::new(),
        }
    }

    pub(crate) fn peek(&self) -> Option<&T> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Byte range of the next token.
    pub(crate) fn next_range(&self) -> Option<Range<usize>> {
        self.tokens.get(self.pos).map(|(_, range)| range.clone())
    }

    /// Byte offset just past the last token consumed.
    pub(crate) fn consumed_end(&self) -> Option<usize> {
        self.pos
            .checked_sub(1)
            .and_then(|last| self.tokens.get(last))
            .map(|(_, range)| range.end)
    }

    pub(crate) fn source(&self) -> &SourceLocation<'s> {
        self.source
    }

    /// Consume the next token if it is `expected`.
    pub(crate) fn eat(&mut self, expected: &T) -> Option<Range<usize>> {
        match self.tokens.get(self.pos) {
            Some((token, range)) if token == expected => {
                self.pos += 1;
                self.recovering = false;
                Some(range.clone())
            }
            _ => None,
        }
    }

    /// Consume the next token if `extract` accepts it. Never an error.
    pub(crate) fn eat_map<O>(&mut self, extract: impl Fn(&T) -> Option<O>) -> Option<O> {
        let out = self.peek().and_then(extract)?;
        self.pos += 1;
        self.recovering = false;
        Some(out)
    }

    /// Like [`Cursor::eat`], recording an error when the token is not there.
    pub(crate) fn expect(&mut self, expected: &T) -> Option<Range<usize>> {
        let found = self.eat(expected);
        if found.is_none() {
            self.fail_here(vec![expected.display_name()]);
        }
        found
    }

    /// Step over one token without matching it.
    pub(crate) fn skip(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    pub(crate) fn skip_until(&mut self, stop: impl Fn(&T) -> bool) {
        while let Some(token) = self.peek() {
            if stop(token) {
                break;
            }
            self.pos += 1;
        }
    }

    /// Run `parser` against the remaining tokens and consume what it matched.
    pub(crate) fn run<O, P>(&mut self, parser: P) -> Option<O>
    where
        P: Parser<Spanned<T>, O, Error = Simple<Spanned<T>>>,
    {
        let rest = self.tokens[self.pos..].to_vec();
        let prefix = parser
            .map_with_span(|out, span: Range<usize>| (out, span.end))
            .then_ignore(any().repeated());
        match prefix.parse(rest) {
            Ok((out, consumed)) => {
                self.pos = (self.pos + consumed).min(self.tokens.len());
                self.recovering = false;
                Some(out)
            }
            Err(errors) => {
                let failure = SyntaxFailure::from_errors(errors, self.source);
                self.fail(failure);
                None
            }
        }
    }

    /// Record an error at the next token, or at the end of input.
    pub(crate) fn fail_here(&mut self, expected: Vec<&'static str>) {
        let offending = self.tokens.get(self.pos).map(|(_, range)| Offending {
            text: self.source.slice(range).to_string(),
            range: range.clone(),
        });
        self.fail(SyntaxFailure { offending, expected });
    }

    fn fail(&mut self, failure: SyntaxFailure) {
        let last = self.later.last().unwrap_or(&self.first).position();
        if !self.recovering && failure.position() > last {
            self.later.push(failure);
        }
        self.recovering = true;
    }

    pub(crate) fn finish<P>(self, partial: Option<P>) -> Recovered<P> {
        Recovered {
            failure: self.first,
            later: self.later,
            partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::lexing::{tokenize_rule, RuleToken};

    #[test]
    fn error_mode_names_and_aliases() {
        assert_eq!("raise".parse::<ErrorMode>().unwrap(), ErrorMode::Raise);
        assert_eq!("Collect".parse::<ErrorMode>().unwrap(), ErrorMode::Report);
        assert_eq!("silent".parse::<ErrorMode>().unwrap(), ErrorMode::Ignore);
        assert!("loud".parse::<ErrorMode>().is_err());

        let mode: ErrorMode = serde_json::from_str("\"fail-fast\"").unwrap();
        assert_eq!(mode, ErrorMode::Raise);
        assert_eq!(serde_json::to_string(&ErrorMode::Report).unwrap(), "\"report\"");
    }

    #[test]
    fn cursor_keeps_only_errors_that_move_forward() {
        let text = "a b c";
        let tokens = tokenize_rule(text);
        let source = SourceLocation::new(text);
        let first = SyntaxFailure {
            offending: Some(Offending {
                text: "b".into(),
                range: 2..3,
            }),
            expected: vec!["'='"],
        };
        let mut cursor = Cursor::new(&tokens, &source, first);

        // Behind the first error.
        cursor.fail_here(Vec::new());
        cursor.skip();
        // Still recovering.
        cursor.fail_here(Vec::new());
        assert!(cursor.eat(&RuleToken::Ident("b".into())).is_some());
        cursor.fail_here(vec!["','"]);
        cursor.fail_here(vec!["','"]);

        let recovered = cursor.finish(Some(()));
        assert_eq!(recovered.error_count(), 2);
        let offending = recovered.later[0].offending.as_ref().map(|o| o.text.as_str());
        assert_eq!(offending, Some("c"));
        assert_eq!(recovered.failures().count(), 2);
    }
}
