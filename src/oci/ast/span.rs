//! Source spans attached to output nodes.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::oci::source::SourceLocation;

/// Byte span into the comment-stripped text.
///
/// `stop` is inclusive, `line` is 1-based and `column` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub stop: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn from_range(range: &Range<usize>, location: &SourceLocation) -> Self {
        let (line, column) = location.position(range.start);
        Self {
            start: range.start,
            stop: range.end.saturating_sub(1).max(range.start),
            line,
            column,
        }
    }

    /// Exact source covered by the span, empty when it falls outside `text`.
    pub fn source<'a>(&self, text: &'a str) -> &'a str {
        if self.start >= text.len() || self.stop < self.start {
            return "";
        }
        let stop = self.stop.min(text.len() - 1);
        text.get(self.start..=stop).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_inclusive() {
        let text = "ab\ncdef";
        let location = SourceLocation::new(text);
        let span = Span::from_range(&(4..7), &location);
        assert_eq!(
            span,
            Span {
                start: 4,
                stop: 6,
                line: 2,
                column: 1
            }
        );
        assert_eq!(span.source(text), "def");
    }

    #[test]
    fn out_of_range_source_is_empty() {
        let span = Span {
            start: 10,
            stop: 12,
            line: 1,
            column: 10,
        };
        assert_eq!(span.source("short"), "");
    }
}
