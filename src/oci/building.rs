//! Shaping concrete trees into output trees
//!
//!     The grammars produce concrete trees (see [`crate::oci::parsing::cst`]).
//!     This stage turns them into the normalized shapes in [`crate::oci::ast`]:
//!     keywords become typed tags, verbs are classified, right-hand values
//!     are typed, and byte ranges become [`Span`]s when the caller asked for
//!     them.
//!
//!     Spans always point into the text the tree was parsed from: the whole
//!     comment-stripped document for policies, the rule chunk for matching
//!     rules.

pub mod policy;
pub mod rules;
pub mod simplify;

use std::ops::Range;

use crate::oci::ast::Span;
use crate::oci::source::SourceLocation;

pub use policy::PolicyBuilder;
pub use rules::RuleBuilder;
pub use simplify::{level, simplify};

/// Produces span/source-text pairs when spans are enabled, nothing otherwise.
pub(crate) struct SpanSource<'a> {
    location: SourceLocation<'a>,
    enabled: bool,
}

impl<'a> SpanSource<'a> {
    pub(crate) fn new(text: &'a str, enabled: bool) -> Self {
        Self {
            location: SourceLocation::new(text),
            enabled,
        }
    }

    pub(crate) fn span(&self, range: &Range<usize>) -> (Option<Span>, Option<String>) {
        if !self.enabled {
            return (None, None);
        }
        let span = Span::from_range(range, &self.location);
        let source_text = span.source(self.location.text()).to_string();
        (Some(span), Some(source_text))
    }
}
