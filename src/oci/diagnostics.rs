//! Syntax error reporting
//!
//! In report mode every failed statement or rule becomes a [`SyntaxIssue`]
//! that points at the offending token, lists what the grammar would have
//! accepted there, and carries the offending line with a caret under the
//! column so the issue can be shown without the source at hand.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::oci::parsing::SyntaxFailure;
use crate::oci::source::SourceLocation;

static STATEMENT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(allow|define|admit|endorse|deny)\b").expect("valid statement regex")
});

/// Text shown as the offending token when input ran out.
pub const EOF_TOKEN: &str = "<EOF>";

/// One syntax error.
///
/// `line` is 1-based and `column` 0-based, both in the text that was parsed:
/// the whole document for policies, the rule chunk for matching rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub offending: Option<String>,
    pub expected: Option<Vec<String>>,
    /// 1-based ordinal of the statement the error falls in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_index: Option<usize>,
    /// 1-based ordinal of the rule chunk the error falls in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
    pub line_text: Option<String>,
    pub caret: Option<String>,
}

/// Issues collected by one report-mode call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<SyntaxIssue>,
    pub error_count: usize,
}

impl Diagnostics {
    pub fn new(errors: Vec<SyntaxIssue>) -> Self {
        let error_count = errors.len();
        Self {
            errors,
            error_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.error_count = self.errors.len();
    }
}

/// Turns parser failures into [`SyntaxIssue`]s for one text.
pub struct IssueCollector<'a> {
    parsed: SourceLocation<'a>,
    display: SourceLocation<'a>,
    statement_starts: Option<Vec<usize>>,
    issues: Vec<SyntaxIssue>,
}

impl<'a> IssueCollector<'a> {
    /// For a policy document. Line text comes from `original`; statement
    /// indices come from `cleaned` so keywords inside comments never count.
    pub fn for_policy(original: &'a str, cleaned: &'a str) -> Self {
        let starts = STATEMENT_START
            .find_iter(cleaned)
            .map(|m| m.start())
            .collect();
        Self {
            parsed: SourceLocation::new(cleaned),
            display: SourceLocation::new(original),
            statement_starts: Some(starts),
            issues: Vec::new(),
        }
    }

    /// For one matching-rule chunk.
    pub fn for_rule(chunk: &'a str) -> Self {
        Self {
            parsed: SourceLocation::new(chunk),
            display: SourceLocation::new(chunk),
            statement_starts: None,
            issues: Vec::new(),
        }
    }

    /// Line and column the failure points at.
    pub fn position(&self, failure: &SyntaxFailure) -> (usize, usize) {
        self.parsed.position(self.offset(failure))
    }

    fn offset(&self, failure: &SyntaxFailure) -> usize {
        failure
            .offending
            .as_ref()
            .map(|o| o.range.start)
            .unwrap_or(self.parsed.text().len())
    }

    pub fn record(&mut self, failure: &SyntaxFailure) -> &SyntaxIssue {
        let offset = self.offset(failure);
        let (line, column) = self.parsed.position(offset);
        let offending = failure
            .offending
            .as_ref()
            .map(|o| o.text.clone())
            .unwrap_or_else(|| EOF_TOKEN.to_string());
        let expected: Vec<String> = failure.expected.iter().map(|e| e.to_string()).collect();
        let line_text = self.display.line_text(line).map(str::to_string);
        let caret = line_text.as_ref().map(|_| format!("{}^", " ".repeat(column)));

        self.issues.push(SyntaxIssue {
            line,
            column,
            message: message(&offending, &expected),
            offending: Some(offending),
            expected: (!expected.is_empty()).then_some(expected),
            statement_index: self.statement_index(offset),
            rule_index: None,
            line_text,
            caret,
        });
        let last = self.issues.len() - 1;
        &self.issues[last]
    }

    fn statement_index(&self, offset: usize) -> Option<usize> {
        let starts = self.statement_starts.as_ref()?;
        let index = starts.partition_point(|&start| start <= offset);
        Some(index.max(1))
    }

    pub fn into_issues(self) -> Vec<SyntaxIssue> {
        self.issues
    }
}

fn message(offending: &str, expected: &[String]) -> String {
    match expected {
        [] => format!("no viable alternative at input '{offending}'"),
        [single] => format!("mismatched input '{offending}' expecting {single}"),
        many => format!(
            "mismatched input '{offending}' expecting {{{}}}",
            many.join(", ")
        ),
    }
}
