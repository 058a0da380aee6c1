//! Matching rule grammar
//!
//! ```text
//! matchingRule := mode? ('{' elementList '}' | elementList) EOF
//! elementList  := element (',' element)* ','?
//! element      := mode? '{' elementList '}' | predicate
//! predicate    := path (('=' | '!=') STRING)?
//! path         := IDENT ('.' IDENT)*
//! mode         := ALL | ANY
//! ```
//!
//! One call parses one rule chunk; splitting a document into chunks happens
//! in [`crate::oci::source::split_rules`]. A chunk that fails is read again
//! element by element: a broken element is dropped up to the next `,` or
//! `}` and the elements around it are kept.

use std::ops::Range;

use chumsky::prelude::*;

use super::cst::{ComparisonCst, ElementCst, MatchingRuleCst, PredicateCst};
use super::{Cursor, Recovered, SyntaxFailure};
use crate::oci::ast::Mode;
use crate::oci::lexing::{tokenize_rule, RuleToken, TokenClass};
use crate::oci::source::SourceLocation;

type TokenSpan = (RuleToken, Range<usize>);

type ParserError = Simple<TokenSpan>;

/// Parse one trimmed rule chunk. A failed chunk always carries a partial rule.
pub fn parse_rule(chunk: &str) -> Result<MatchingRuleCst, Recovered<MatchingRuleCst>> {
    let tokens = tokenize_rule(chunk);
    tracing::trace!(tokens = tokens.len(), "parsing matching rule");
    matching_rule(chunk.len())
        .parse(tokens.clone())
        .map_err(|errors| {
            let source = SourceLocation::new(chunk);
            let failure = SyntaxFailure::from_errors(errors, &source);
            let mut cursor = Cursor::new(&tokens, &source, failure);
            let rule = recover_rule(&mut cursor, chunk.len());
            cursor.finish(Some(rule))
        })
}

/// Match a token `extract` accepts; `placeholder` names it in error messages,
/// including when the input has already ended.
fn payload<O>(
    placeholder: RuleToken,
    extract: impl Fn(&RuleToken) -> Option<O> + Clone,
) -> impl Parser<TokenSpan, (O, Range<usize>), Error = ParserError> + Clone {
    let at_end = placeholder.clone();
    filter_map(move |span: Range<usize>, (tok, range): TokenSpan| match extract(&tok) {
        Some(out) => Ok((out, range)),
        None => Err(Simple::expected_input_found(
            span,
            [Some((placeholder.clone(), 0..0))],
            Some((tok, range)),
        )),
    })
    .map_err(move |e: ParserError| {
        if e.found().is_none() {
            Simple::expected_input_found(e.span(), [Some((at_end.clone(), 0..0))], None)
        } else {
            e
        }
    })
}

fn token(expected: RuleToken) -> impl Parser<TokenSpan, Range<usize>, Error = ParserError> + Clone {
    let wanted = expected.clone();
    payload(expected, move |tok| (*tok == wanted).then_some(()))
        .map(|((), range)| range)
}

fn ident() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    payload(RuleToken::Ident(String::new()), |tok| match tok {
        RuleToken::Ident(name) => Some(name.clone()),
        _ => None,
    })
}

/// A single-quoted literal, quotes removed, escapes left as written.
fn literal() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    payload(RuleToken::String(String::new()), |tok| match tok {
        RuleToken::String(raw) => Some(
            raw.strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
                .unwrap_or(raw)
                .to_string(),
        ),
        _ => None,
    })
}

fn mode() -> impl Parser<TokenSpan, (Mode, Range<usize>), Error = ParserError> + Clone {
    token(RuleToken::All)
        .map(|r| (Mode::All, r))
        .or(token(RuleToken::Any).map(|r| (Mode::Any, r)))
}

fn path() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    ident()
        .then(token(RuleToken::Dot).ignore_then(ident()).repeated())
        .map(|((head, head_range), rest)| {
            let end = rest.last().map(|(_, r)| r.end).unwrap_or(head_range.end);
            let mut path = head;
            for (segment, _) in rest {
                path.push('.');
                path.push_str(&segment);
            }
            (path, head_range.start..end)
        })
}

fn predicate() -> impl Parser<TokenSpan, PredicateCst, Error = ParserError> + Clone {
    let op = token(RuleToken::Eq)
        .to(false)
        .or(token(RuleToken::Neq).to(true));

    path()
        .then(op.then(literal()).or_not())
        .map(|((path, path_range), comparison)| match comparison {
            Some((negated, (literal, lit_range))) => PredicateCst {
                path,
                comparison: Some(ComparisonCst { negated, literal }),
                range: path_range.start..lit_range.end,
            },
            None => PredicateCst {
                path,
                comparison: None,
                range: path_range,
            },
        })
}

fn element_list<P>(element: P) -> impl Parser<TokenSpan, Vec<ElementCst>, Error = ParserError> + Clone
where
    P: Parser<TokenSpan, ElementCst, Error = ParserError> + Clone,
{
    element
        .separated_by(token(RuleToken::Comma))
        .allow_trailing()
        .at_least(1)
}

fn element() -> impl Parser<TokenSpan, ElementCst, Error = ParserError> + Clone {
    recursive(|element| {
        let group = mode()
            .or_not()
            .then(token(RuleToken::LBrace))
            .then(element_list(element))
            .then(token(RuleToken::RBrace))
            .map(|(((mode, open), elements), close)| {
                let start = mode.as_ref().map(|(_, r)| r.start).unwrap_or(open.start);
                ElementCst::Group {
                    mode: mode.map(|(m, _)| m),
                    elements,
                    range: start..close.end,
                }
            });

        group.or(predicate().map(ElementCst::Predicate))
    })
}

fn matching_rule(
    len: usize,
) -> impl Parser<TokenSpan, MatchingRuleCst, Error = ParserError> + Clone {
    let braced = token(RuleToken::LBrace)
        .ignore_then(element_list(element()))
        .then_ignore(token(RuleToken::RBrace))
        .then_ignore(end());

    let bare = element_list(element()).then_ignore(end());

    mode()
        .map(|(m, _)| m)
        .or_not()
        .then(braced.or(bare))
        .map(move |(mode, elements)| MatchingRuleCst {
            mode,
            elements,
            range: 0..len,
        })
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

type RuleCursor<'t, 's> = Cursor<'t, 's, RuleToken>;

fn recover_rule(c: &mut RuleCursor, len: usize) -> MatchingRuleCst {
    let mode = recover_mode(c);
    let elements = if c.eat(&RuleToken::LBrace).is_some() {
        let elements = recover_elements(c, true);
        c.expect(&RuleToken::RBrace);
        elements
    } else {
        recover_elements(c, false)
    };
    if !c.at_end() {
        c.fail_here(vec!["<EOF>"]);
    }
    MatchingRuleCst {
        mode,
        elements,
        range: 0..len,
    }
}

fn recover_mode(c: &mut RuleCursor) -> Option<Mode> {
    if c.eat(&RuleToken::All).is_some() {
        Some(Mode::All)
    } else if c.eat(&RuleToken::Any).is_some() {
        Some(Mode::Any)
    } else {
        None
    }
}

/// Elements up to the closing `}` (or the end of the chunk).
fn recover_elements(c: &mut RuleCursor, braced: bool) -> Vec<ElementCst> {
    let mut elements = Vec::new();
    while !matches!(c.peek(), None | Some(RuleToken::RBrace)) {
        elements.extend(recover_element(c));
        if c.eat(&RuleToken::Comma).is_some() {
            continue;
        }
        if matches!(c.peek(), None | Some(RuleToken::RBrace)) {
            break;
        }
        let mut expected = vec![RuleToken::Comma.display_name()];
        if braced {
            expected.push(RuleToken::RBrace.display_name());
        }
        c.fail_here(expected);
        skip_element(c);
        c.eat(&RuleToken::Comma);
    }
    elements
}

fn recover_element(c: &mut RuleCursor) -> Option<ElementCst> {
    let start = c.next_range()?.start;
    if !matches!(
        c.peek(),
        Some(RuleToken::All | RuleToken::Any | RuleToken::LBrace)
    ) {
        return recover_predicate(c);
    }

    let mode = recover_mode(c);
    if c.expect(&RuleToken::LBrace).is_none() {
        skip_element(c);
        return None;
    }
    let elements = recover_elements(c, true);
    c.expect(&RuleToken::RBrace);
    let end = c.consumed_end().unwrap_or(start);
    Some(ElementCst::Group {
        mode,
        elements,
        range: start..end,
    })
}

/// A predicate is kept only when it is complete; a comparison without its
/// literal is dropped.
fn recover_predicate(c: &mut RuleCursor) -> Option<ElementCst> {
    let Some((path, path_range)) = c.run(path()) else {
        skip_element(c);
        return None;
    };
    let negated = if c.eat(&RuleToken::Eq).is_some() {
        false
    } else if c.eat(&RuleToken::Neq).is_some() {
        true
    } else {
        return Some(ElementCst::Predicate(PredicateCst {
            path,
            comparison: None,
            range: path_range,
        }));
    };
    let Some((literal, literal_range)) = c.run(literal()) else {
        skip_element(c);
        return None;
    };
    Some(ElementCst::Predicate(PredicateCst {
        path,
        comparison: Some(ComparisonCst { negated, literal }),
        range: path_range.start..literal_range.end,
    }))
}

/// Skip to the `,` or `}` that ends the current element.
fn skip_element(c: &mut RuleCursor) {
    let mut depth = 0usize;
    while let Some(token) = c.peek() {
        match token {
            RuleToken::Comma | RuleToken::RBrace if depth == 0 => break,
            RuleToken::LBrace => depth += 1,
            RuleToken::RBrace => depth -= 1,
            _ => {}
        }
        c.skip();
    }
}
