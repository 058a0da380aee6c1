//! Matching rule shaper.

use super::simplify::{level, simplify};
use super::SpanSource;
use crate::oci::ast::{Clause, Expr, Group, Mode, Op, Predicate, Rule, Value};
use crate::oci::parsing::cst::{ElementCst, MatchingRuleCst, PredicateCst};

/// Builds one [`Rule`] from a parsed rule chunk.
pub struct RuleBuilder<'a> {
    spans: SpanSource<'a>,
    nested_simplify: bool,
}

impl<'a> RuleBuilder<'a> {
    /// `chunk` is the rule text the tree was parsed from.
    pub fn new(chunk: &'a str, include_spans: bool, nested_simplify: bool) -> Self {
        Self {
            spans: SpanSource::new(chunk, include_spans),
            nested_simplify,
        }
    }

    pub fn rule(&self, cst: &MatchingRuleCst) -> Rule {
        let (span, source_text) = self.spans.span(&cst.range);
        let root = Group {
            mode: cst.mode.unwrap_or(Mode::All),
            items: cst.elements.iter().map(|e| self.element(e)).collect(),
            span,
            source_text,
        };
        self.finish(Expr::Group(root))
    }

    fn finish(&self, mut expr: Expr) -> Rule {
        if self.nested_simplify {
            expr = simplify(expr, true);
        }
        Rule {
            level: level(&expr),
            expr,
        }
    }

    fn element(&self, element: &ElementCst) -> Expr {
        match element {
            ElementCst::Group {
                mode,
                elements,
                range,
            } => {
                let (span, source_text) = self.spans.span(range);
                Expr::Group(Group {
                    mode: mode.unwrap_or(Mode::All),
                    items: elements.iter().map(|e| self.element(e)).collect(),
                    span,
                    source_text,
                })
            }
            ElementCst::Predicate(predicate) => Expr::Clause(Clause {
                node: self.predicate(predicate),
            }),
        }
    }

    fn predicate(&self, predicate: &PredicateCst) -> Predicate {
        let mut node = match &predicate.comparison {
            None => Predicate::exists(predicate.path.clone()),
            Some(comparison) => {
                let op = if comparison.negated { Op::Neq } else { Op::Eq };
                Predicate::compare(
                    predicate.path.clone(),
                    op,
                    Value::classify(&comparison.literal),
                )
            }
        };
        let (span, source_text) = self.spans.span(&predicate.range);
        node.span = span;
        node.source_text = source_text;
        node
    }
}
