//! Policy statement grammar
//!
//! ```text
//! statements  := statement*
//! statement   := allow | define | admit | endorse
//! allow       := (ALLOW | DENY) subject TO verb resource? IN location where?
//! define      := DEFINE (TENANCY name | GROUP qname | DYNAMIC-GROUP qname | COMPARTMENT name) AS ocid
//! admit       := DENY? ADMIT subject (OF TENANCY name)? TO verb resource? IN location where?
//! endorse     := DENY? ENDORSE subject TO scope TO endorseVerb resource? where?
//!              | DENY? ENDORSE subject TO endorseVerb resource? IN scope where?
//! subject     := ANY-USER | ANY-GROUP | SERVICE names
//!              | GROUP (ID ids | names) | DYNAMIC-GROUP (ID ids | names)
//! verb        := '{' WORD (',' WORD)* '}' | WORD
//! location    := TENANCY | COMPARTMENT ID ocid | COMPARTMENT name (':' name)*
//! where       := WHERE condition
//! condition   := (ALL | ANY) '{' condition (',' condition)* ','? '}' | clause
//! clause      := WORD (('=' | '!=') value | IN '(' value (',' value)* ')'
//!              | BEFORE value | AFTER value | BETWEEN value AND value)
//! ```
//!
//! The token stream is first cut into statement segments at statement-start
//! keywords and each segment is parsed on its own, so one broken statement
//! never swallows its neighbours. A segment that fails is read again field
//! by field (see [`recover`]); unreadable fields are left empty and the next
//! grammar keyword (`TO`, `IN`, `WHERE`, `AS`) resumes the walk.

use std::ops::Range;

use chumsky::prelude::*;

use super::cst::*;
use super::{Cursor, Offending, Recovered, SyntaxFailure};
use crate::oci::ast::{Mode, SymbolKind};
use crate::oci::lexing::{tokenize_policy, PolicyToken, TokenClass};
use crate::oci::source::SourceLocation;

type TokenSpan = (PolicyToken, Range<usize>);

type ParserError = Simple<TokenSpan>;

/// One statement-sized slice of the token stream and its parse result.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Byte range from the first token's start to the last token's end.
    pub range: Range<usize>,
    /// False for tokens that precede the first statement keyword.
    pub starts_with_keyword: bool,
    pub result: Result<StatementCst, Recovered<PartialStatementCst>>,
}

/// Tokenize and parse comment-stripped policy text.
pub fn parse_policy(cleaned: &str) -> Vec<Segment> {
    let tokens = tokenize_policy(cleaned);
    let location = SourceLocation::new(cleaned);
    let bounds = segment_bounds(&tokens);
    tracing::trace!(
        tokens = tokens.len(),
        segments = bounds.len(),
        "split policy into segments"
    );

    let parser = statement().then_ignore(end());
    bounds
        .iter()
        .map(|bounds| {
            let slice = &tokens[bounds.clone()];
            let range = slice[0].1.start..slice[slice.len() - 1].1.end;
            let result = parser.parse(slice.to_vec()).map_err(|errors| {
                let failure = SyntaxFailure::from_errors(errors, &location);
                let mut recovered = recover(slice, &location, failure);
                for failure in recovered.failures_mut() {
                    if failure.offending.is_none() {
                        // Ran off the end of the segment: blame whatever follows it.
                        failure.offending = tokens.get(bounds.end).map(|(_, next)| Offending {
                            text: location.slice(next).to_string(),
                            range: next.clone(),
                        });
                    }
                }
                recovered
            });
            Segment {
                range,
                starts_with_keyword: slice[0].0.starts_statement(None),
                result,
            }
        })
        .collect()
}

/// Index ranges of statement segments. Never yields an empty range.
fn segment_bounds(tokens: &[TokenSpan]) -> Vec<Range<usize>> {
    let mut bounds = Vec::new();
    let mut start = 0;
    for i in 1..tokens.len() {
        if tokens[i].0.starts_statement(Some(&tokens[i - 1].0)) {
            bounds.push(start..i);
            start = i;
        }
    }
    if start < tokens.len() {
        bounds.push(start..tokens.len());
    }
    bounds
}

// ---------------------------------------------------------------------------
// Token helpers
// ---------------------------------------------------------------------------

/// Match a token `extract` accepts; `placeholder` names it in error messages,
/// including when the input has already ended.
fn payload<O>(
    placeholder: PolicyToken,
    extract: impl Fn(&PolicyToken) -> Option<O> + Clone,
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

/// Match one fixed token, returning its byte range.
fn token(expected: PolicyToken) -> impl Parser<TokenSpan, Range<usize>, Error = ParserError> + Clone {
    let wanted = expected.clone();
    payload(expected, move |tok| (*tok == wanted).then_some(()))
        .map(|((), range)| range)
}

fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn word() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    payload(PolicyToken::Word(String::new()), |t| match t {
        PolicyToken::Word(s) => Some(s.clone()),
        _ => None,
    })
}

fn quoted() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    payload(PolicyToken::Quoted(String::new()), |t| match t {
        PolicyToken::Quoted(s) => Some(unquote(s)),
        _ => None,
    })
}

fn quoted_ocid() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    payload(PolicyToken::QuotedOcid(String::new()), |t| match t {
        PolicyToken::QuotedOcid(s) => Some(unquote(s)),
        _ => None,
    })
}

fn bare_ocid() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    payload(PolicyToken::Ocid(String::new()), |t| match t {
        PolicyToken::Ocid(s) => Some(s.clone()),
        _ => None,
    })
}

fn pattern() -> impl Parser<TokenSpan, (String, Range<usize>), Error = ParserError> + Clone {
    payload(PolicyToken::Pattern(String::new()), |t| match t {
        PolicyToken::Pattern(s) => Some(s.clone()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

/// `WORD | QUOTED`, quotes removed.
fn name() -> impl Parser<TokenSpan, String, Error = ParserError> + Clone {
    word().or(quoted()).map(|(name, _)| name)
}

/// `name ('/' name)?`
fn qualified_name() -> impl Parser<TokenSpan, String, Error = ParserError> + Clone {
    name()
        .then(token(PolicyToken::Slash).ignore_then(name()).or_not())
        .map(|(left, right)| match right {
            Some(right) => format!("{left}/{right}"),
            None => left,
        })
}

fn ocid() -> impl Parser<TokenSpan, String, Error = ParserError> + Clone {
    quoted_ocid().or(bare_ocid()).map(|(ocid, _)| ocid)
}

fn name_list() -> impl Parser<TokenSpan, Vec<String>, Error = ParserError> + Clone {
    qualified_name()
        .separated_by(token(PolicyToken::Comma))
        .at_least(1)
}

fn id_list() -> impl Parser<TokenSpan, Vec<String>, Error = ParserError> + Clone {
    ocid().separated_by(token(PolicyToken::Comma)).at_least(1)
}

fn subject() -> impl Parser<TokenSpan, SubjectCst, Error = ParserError> + Clone {
    let group = token(PolicyToken::Group).ignore_then(
        token(PolicyToken::Id)
            .ignore_then(id_list())
            .map(SubjectCst::GroupIds)
            .or(name_list().map(SubjectCst::GroupNames)),
    );
    let dynamic_group = token(PolicyToken::DynamicGroup).ignore_then(
        token(PolicyToken::Id)
            .ignore_then(id_list())
            .map(SubjectCst::DynamicGroupIds)
            .or(name_list().map(SubjectCst::DynamicGroupNames)),
    );

    choice((
        token(PolicyToken::AnyUser).to(SubjectCst::AnyUser),
        token(PolicyToken::AnyGroup).to(SubjectCst::AnyGroup),
        token(PolicyToken::Service)
            .ignore_then(name_list())
            .map(SubjectCst::Service),
        group,
        dynamic_group,
    ))
}

fn verb() -> impl Parser<TokenSpan, VerbCst, Error = ParserError> + Clone {
    let braced = token(PolicyToken::LBrace)
        .ignore_then(
            word()
                .map(|(w, _)| w)
                .separated_by(token(PolicyToken::Comma))
                .allow_trailing(),
        )
        .then_ignore(token(PolicyToken::RBrace))
        .map(VerbCst::Braced);

    braced.or(word().map(|(w, _)| VerbCst::Single(w)))
}

fn resource() -> impl Parser<TokenSpan, Option<String>, Error = ParserError> + Clone {
    word().map(|(w, _)| w).or_not()
}

fn location() -> impl Parser<TokenSpan, LocationCst, Error = ParserError> + Clone {
    let compartment = token(PolicyToken::Compartment).ignore_then(
        token(PolicyToken::Id)
            .ignore_then(ocid())
            .map(LocationCst::CompartmentId)
            .or(name()
                .separated_by(token(PolicyToken::Colon))
                .at_least(1)
                .map(LocationCst::CompartmentPath)),
    );

    token(PolicyToken::Tenancy)
        .to(LocationCst::Tenancy)
        .or(compartment)
}

fn value() -> impl Parser<TokenSpan, (ValueCst, Range<usize>), Error = ParserError> + Clone {
    choice((
        quoted_ocid().map(|(v, r)| (ValueCst::QuotedOcid(v), r)),
        quoted().map(|(v, r)| (ValueCst::Quoted(v), r)),
        bare_ocid().map(|(v, r)| (ValueCst::Ocid(v), r)),
        pattern().map(|(v, r)| (ValueCst::Pattern(v), r)),
        word().map(|(v, r)| (ValueCst::Word(v), r)),
    ))
}

fn clause() -> impl Parser<TokenSpan, ClauseCst, Error = ParserError> + Clone {
    let compare = token(PolicyToken::Eq)
        .to(false)
        .or(token(PolicyToken::Neq).to(true))
        .then(value())
        .map(|(negated, (value, r))| (ClauseOpCst::Compare { negated, value }, r.end));

    let in_list = token(PolicyToken::In)
        .ignore_then(token(PolicyToken::LParen))
        .ignore_then(
            value()
                .map(|(v, _)| v)
                .separated_by(token(PolicyToken::Comma))
                .at_least(1),
        )
        .then(token(PolicyToken::RParen))
        .map(|(values, r)| (ClauseOpCst::In(values), r.end));

    let before = token(PolicyToken::Before)
        .ignore_then(value())
        .map(|(v, r)| (ClauseOpCst::Before(v), r.end));

    let after = token(PolicyToken::After)
        .ignore_then(value())
        .map(|(v, r)| (ClauseOpCst::After(v), r.end));

    let between = token(PolicyToken::Between)
        .ignore_then(value())
        .then_ignore(token(PolicyToken::And))
        .then(value())
        .map(|((from, _), (to, r))| (ClauseOpCst::Between(from, to), r.end));

    word()
        .then(choice((compare, in_list, before, after, between)))
        .map(|((lhs, lhs_range), (op, end))| ClauseCst {
            lhs,
            op,
            range: lhs_range.start..end,
        })
}

fn mode() -> impl Parser<TokenSpan, (Mode, Range<usize>), Error = ParserError> + Clone {
    token(PolicyToken::All)
        .map(|r| (Mode::All, r))
        .or(token(PolicyToken::Any).map(|r| (Mode::Any, r)))
}

fn condition() -> impl Parser<TokenSpan, ConditionCst, Error = ParserError> + Clone {
    recursive(|condition| {
        let group = mode()
            .then_ignore(token(PolicyToken::LBrace))
            .then(
                condition
                    .separated_by(token(PolicyToken::Comma))
                    .allow_trailing()
                    .at_least(1),
            )
            .then(token(PolicyToken::RBrace))
            .map(|(((mode, start), items), end)| ConditionCst::Group {
                mode,
                items,
                range: start.start..end.end,
            });

        group.or(clause().map(ConditionCst::Clause))
    })
}

fn where_clause() -> impl Parser<TokenSpan, Option<ConditionCst>, Error = ParserError> + Clone {
    token(PolicyToken::Where).ignore_then(condition()).or_not()
}

fn deny_prefix() -> impl Parser<TokenSpan, bool, Error = ParserError> + Clone {
    token(PolicyToken::Deny).or_not().map(|deny| deny.is_some())
}

fn allow_statement() -> impl Parser<TokenSpan, StatementCst, Error = ParserError> + Clone {
    token(PolicyToken::Allow)
        .to(false)
        .or(token(PolicyToken::Deny).to(true))
        .then(subject())
        .then_ignore(token(PolicyToken::To))
        .then(verb())
        .then(resource())
        .then_ignore(token(PolicyToken::In))
        .then(location())
        .then(where_clause())
        .map(
            |(((((deny, subject), verb), resource), location), condition)| {
                StatementCst::Allow(AllowCst {
                    deny,
                    subject,
                    verb,
                    resource,
                    location,
                    condition,
                })
            },
        )
}

fn define_target() -> impl Parser<TokenSpan, (SymbolKind, String), Error = ParserError> + Clone {
    choice((
        token(PolicyToken::Tenancy).ignore_then(name().map(|n| (SymbolKind::Tenancy, n))),
        token(PolicyToken::Group).ignore_then(qualified_name().map(|n| (SymbolKind::Group, n))),
        token(PolicyToken::DynamicGroup)
            .ignore_then(qualified_name().map(|n| (SymbolKind::DynamicGroup, n))),
        token(PolicyToken::Compartment)
            .ignore_then(name().map(|n| (SymbolKind::Compartment, n))),
    ))
}

fn define_statement() -> impl Parser<TokenSpan, StatementCst, Error = ParserError> + Clone {
    token(PolicyToken::Define)
        .ignore_then(define_target())
        .then_ignore(token(PolicyToken::As))
        .then(ocid())
        .map(|((kind, name), ocid)| StatementCst::Define(DefineCst { kind, name, ocid }))
}

fn admit_statement() -> impl Parser<TokenSpan, StatementCst, Error = ParserError> + Clone {
    let source = token(PolicyToken::Of)
        .ignore_then(token(PolicyToken::Tenancy))
        .ignore_then(name())
        .or_not();

    deny_prefix()
        .then_ignore(token(PolicyToken::Admit))
        .then(subject())
        .then(source)
        .then_ignore(token(PolicyToken::To))
        .then(verb())
        .then(resource())
        .then_ignore(token(PolicyToken::In))
        .then(location())
        .then(where_clause())
        .map(
            |((((((deny, subject), source_tenancy), verb), resource), location), condition)| {
                StatementCst::Admit(AdmitCst {
                    deny,
                    subject,
                    source_tenancy,
                    verb,
                    resource,
                    location,
                    condition,
                })
            },
        )
}

fn endorse_scope() -> impl Parser<TokenSpan, EndorseScopeCst, Error = ParserError> + Clone {
    token(PolicyToken::AnyTenancy)
        .to(EndorseScopeCst::AnyTenancy)
        .or(token(PolicyToken::Tenancy)
            .ignore_then(name())
            .map(EndorseScopeCst::Tenancy))
}

fn endorse_verb() -> impl Parser<TokenSpan, EndorseVerbCst, Error = ParserError> + Clone {
    token(PolicyToken::Associate)
        .to(EndorseVerbCst::Associate)
        .or(verb().map(EndorseVerbCst::Verb))
}

fn endorse_statement() -> impl Parser<TokenSpan, StatementCst, Error = ParserError> + Clone {
    // TO scope TO verb resource
    let scope_first = endorse_scope()
        .then_ignore(token(PolicyToken::To))
        .then(endorse_verb())
        .then(resource())
        .map(|((scope, verb), resource)| (scope, verb, resource));

    // TO verb resource IN scope
    let scope_last = endorse_verb()
        .then(resource())
        .then_ignore(token(PolicyToken::In))
        .then(endorse_scope())
        .map(|((verb, resource), scope)| (scope, verb, resource));

    deny_prefix()
        .then_ignore(token(PolicyToken::Endorse))
        .then(subject())
        .then_ignore(token(PolicyToken::To))
        .then(scope_first.or(scope_last))
        .then(where_clause())
        .map(|(((deny, subject), (scope, verb, resource)), condition)| {
            StatementCst::Endorse(EndorseCst {
                deny,
                subject,
                scope,
                verb,
                resource,
                condition,
            })
        })
}

fn statement() -> impl Parser<TokenSpan, StatementCst, Error = ParserError> + Clone {
    choice((
        admit_statement(),
        endorse_statement(),
        allow_statement(),
        define_statement(),
    ))
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

type PolicyCursor<'t, 's> = Cursor<'t, 's, PolicyToken>;

/// Read a segment that failed to parse as far as its fields allow.
///
/// Segments that do not open with a statement keyword have no partial tree.
fn recover(
    tokens: &[TokenSpan],
    source: &SourceLocation,
    failure: SyntaxFailure,
) -> Recovered<PartialStatementCst> {
    let mut cursor = Cursor::new(tokens, source, failure);
    let partial = statement_head(tokens).map(|(head, width)| {
        for _ in 0..width {
            cursor.skip();
        }
        let mut partial = PartialStatementCst::new(head);
        match head {
            StatementHead::Allow { .. } => recover_grant(&mut cursor, &mut partial, false),
            StatementHead::Admit { .. } => recover_grant(&mut cursor, &mut partial, true),
            StatementHead::Endorse { .. } => recover_endorse(&mut cursor, &mut partial),
            StatementHead::Define => recover_define(&mut cursor, &mut partial),
        }
        partial
    });
    cursor.finish(partial)
}

/// Statement form and how many tokens its opening keywords take.
fn statement_head(tokens: &[TokenSpan]) -> Option<(StatementHead, usize)> {
    use PolicyToken::*;
    match tokens {
        [(Deny, _), (Admit, _), ..] => Some((StatementHead::Admit { deny: true }, 2)),
        [(Deny, _), (Endorse, _), ..] => Some((StatementHead::Endorse { deny: true }, 2)),
        [(Deny, _), ..] => Some((StatementHead::Allow { deny: true }, 1)),
        [(Allow, _), ..] => Some((StatementHead::Allow { deny: false }, 1)),
        [(Admit, _), ..] => Some((StatementHead::Admit { deny: false }, 1)),
        [(Endorse, _), ..] => Some((StatementHead::Endorse { deny: false }, 1)),
        [(Define, _), ..] => Some((StatementHead::Define, 1)),
        _ => None,
    }
}

fn stop_at(stops: &[PolicyToken]) -> impl Fn(&PolicyToken) -> bool + '_ {
    move |token| stops.contains(token)
}

/// Expect `keyword`; when it is missing, skip to the next of `stops` and
/// take `keyword` if that is where the skip ended.
fn expect_keyword(c: &mut PolicyCursor, keyword: &PolicyToken, stops: &[PolicyToken]) {
    if c.expect(keyword).is_none() {
        c.skip_until(stop_at(stops));
        c.eat(keyword);
    }
}

fn resource_word(c: &mut PolicyCursor) -> Option<String> {
    c.eat_map(|token| match token {
        PolicyToken::Word(word) => Some(word.clone()),
        _ => None,
    })
}

/// Allow, deny and admit statements.
fn recover_grant(c: &mut PolicyCursor, partial: &mut PartialStatementCst, admit: bool) {
    use PolicyToken::*;
    partial.subject = c.run(subject());
    if partial.subject.is_none() {
        c.skip_until(stop_at(&[To, Of, In, Where]));
    }
    if admit && c.eat(&Of).is_some() {
        let source = c.run(token(Tenancy).ignore_then(name()));
        if source.is_none() {
            c.skip_until(stop_at(&[To, In, Where]));
        }
        partial.source_tenancy = Some(source);
    }
    expect_keyword(c, &To, &[To, In, Where]);
    partial.verb = c.run(verb()).map(EndorseVerbCst::Verb);
    if partial.verb.is_none() {
        c.skip_until(stop_at(&[In, Where]));
    }
    partial.resource = resource_word(c);
    expect_keyword(c, &In, &[In, Where]);
    partial.location = c.run(location());
    if partial.location.is_none() {
        c.skip_until(stop_at(&[Where]));
    }
    recover_where(c, partial);
}

fn recover_endorse(c: &mut PolicyCursor, partial: &mut PartialStatementCst) {
    use PolicyToken::*;
    partial.subject = c.run(subject());
    if partial.subject.is_none() {
        c.skip_until(stop_at(&[To, In, Where]));
    }
    expect_keyword(c, &To, &[To, In, Where]);
    if matches!(c.peek(), Some(AnyTenancy | Tenancy)) {
        partial.scope = c.run(endorse_scope());
        if partial.scope.is_none() {
            c.skip_until(stop_at(&[To, Where]));
        }
        expect_keyword(c, &To, &[To, Where]);
        partial.verb = c.run(endorse_verb());
        if partial.verb.is_none() {
            c.skip_until(stop_at(&[Where]));
        }
        partial.resource = resource_word(c);
    } else {
        partial.verb = c.run(endorse_verb());
        if partial.verb.is_none() {
            c.skip_until(stop_at(&[In, Where]));
        }
        partial.resource = resource_word(c);
        expect_keyword(c, &In, &[In, Where]);
        partial.scope = c.run(endorse_scope());
        if partial.scope.is_none() {
            c.skip_until(stop_at(&[Where]));
        }
    }
    recover_where(c, partial);
}

fn recover_define(c: &mut PolicyCursor, partial: &mut PartialStatementCst) {
    partial.symbol = c.run(define_target());
    if partial.symbol.is_none() {
        c.skip_until(stop_at(&[PolicyToken::As]));
    }
    expect_keyword(c, &PolicyToken::As, &[PolicyToken::As]);
    partial.ocid = c.run(ocid());
    trailing(c);
}

fn recover_where(c: &mut PolicyCursor, partial: &mut PartialStatementCst) {
    if c.eat(&PolicyToken::Where).is_some() {
        partial.condition = recover_condition(c);
    }
    trailing(c);
}

/// Anything left in the segment is an error.
fn trailing(c: &mut PolicyCursor) {
    if !c.at_end() {
        c.fail_here(Vec::new());
    }
}

fn recover_condition(c: &mut PolicyCursor) -> Option<ConditionCst> {
    use PolicyToken::*;
    let Some(start) = c.next_range().map(|range| range.start) else {
        c.fail_here(vec![All.display_name(), Any.display_name(), "WORD"]);
        return None;
    };
    let mode = if c.eat(&All).is_some() {
        Mode::All
    } else if c.eat(&Any).is_some() {
        Mode::Any
    } else {
        return recover_clause(c, start);
    };

    if c.expect(&LBrace).is_none() {
        skip_condition(c);
        return None;
    }
    let mut items = Vec::new();
    while !matches!(c.peek(), None | Some(RBrace)) {
        items.extend(recover_condition(c));
        if c.eat(&Comma).is_some() {
            continue;
        }
        if matches!(c.peek(), None | Some(RBrace)) {
            break;
        }
        c.fail_here(vec![Comma.display_name(), RBrace.display_name()]);
        skip_condition(c);
        c.eat(&Comma);
    }
    c.expect(&RBrace);
    let end = c.consumed_end().unwrap_or(start);
    Some(ConditionCst::Group {
        mode,
        items,
        range: start..end,
    })
}

/// A clause, or what is left of one: its left-hand side and an unknown
/// operator holding the rest of the clause's text.
fn recover_clause(c: &mut PolicyCursor, start: usize) -> Option<ConditionCst> {
    if let Some(clause) = c.run(clause()) {
        return Some(ConditionCst::Clause(clause));
    }
    let lhs = match c.peek() {
        Some(PolicyToken::Word(word)) => {
            let word = word.clone();
            c.skip();
            word
        }
        _ => String::new(),
    };
    let rest_start = c.next_range().map(|range| range.start);
    skip_condition(c);
    let end = c.consumed_end().filter(|end| *end > start)?;
    let rest = match rest_start {
        Some(from) if from < end => c.source().slice(&(from..end)).trim().to_string(),
        _ => String::new(),
    };
    Some(ConditionCst::Clause(ClauseCst {
        lhs,
        op: ClauseOpCst::Unknown(rest),
        range: start..end,
    }))
}

/// Skip to the `,` or `}` that ends the current condition item.
fn skip_condition(c: &mut PolicyCursor) {
    let mut depth = 0usize;
    while let Some(token) = c.peek() {
        match token {
            PolicyToken::Comma | PolicyToken::RBrace if depth == 0 => break,
            PolicyToken::LBrace | PolicyToken::LParen => depth += 1,
            PolicyToken::RBrace | PolicyToken::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        c.skip();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(text: &str) -> StatementCst {
        let segments = parse_policy(text);
        assert_eq!(segments.len(), 1, "expected one segment for {text:?}");
        segments[0].result.clone().expect("statement parses")
    }

    #[test]
    fn allow_with_condition() {
        let cst = parse_one(
            "allow group Admins to manage buckets in compartment Apps where request.region = 'phx'",
        );
        let StatementCst::Allow(allow) = cst else {
            panic!("expected allow");
        };
        assert!(!allow.deny);
        assert_eq!(allow.subject, SubjectCst::GroupNames(vec!["Admins".into()]));
        assert_eq!(allow.verb, VerbCst::Single("manage".into()));
        assert_eq!(allow.resource.as_deref(), Some("buckets"));
        assert_eq!(allow.location, LocationCst::CompartmentPath(vec!["Apps".into()]));
        match allow.condition {
            Some(ConditionCst::Clause(clause)) => {
                assert_eq!(clause.lhs, "request.region");
                assert_eq!(
                    clause.op,
                    ClauseOpCst::Compare {
                        negated: false,
                        value: ValueCst::Quoted("phx".into())
                    }
                );
            }
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[test]
    fn resource_is_optional() {
        let cst = parse_one("ALLOW SERVICE faas TO {KEY_READ} IN TENANCY");
        let StatementCst::Allow(allow) = cst else {
            panic!("expected allow");
        };
        assert_eq!(allow.subject, SubjectCst::Service(vec!["faas".into()]));
        assert_eq!(allow.verb, VerbCst::Braced(vec!["KEY_READ".into()]));
        assert_eq!(allow.resource, None);
        assert_eq!(allow.location, LocationCst::Tenancy);
    }

    #[test]
    fn group_ids_and_qualified_names() {
        let cst = parse_one("allow group id ocid1.group.oc1..a, 'ocid1.group.oc1..b' to read x in tenancy");
        let StatementCst::Allow(allow) = cst else {
            panic!("expected allow");
        };
        assert_eq!(
            allow.subject,
            SubjectCst::GroupIds(vec!["ocid1.group.oc1..a".into(), "ocid1.group.oc1..b".into()])
        );

        let cst = parse_one("allow dynamic-group 'Dom'/'DG', Other/DG2 to read x in tenancy");
        let StatementCst::Allow(allow) = cst else {
            panic!("expected allow");
        };
        assert_eq!(
            allow.subject,
            SubjectCst::DynamicGroupNames(vec!["Dom/DG".into(), "Other/DG2".into()])
        );
    }

    #[test]
    fn define_statement_kinds() {
        let cst = parse_one("define group foo/bar as 'ocid1.group.oc1..g'");
        assert_eq!(
            cst,
            StatementCst::Define(DefineCst {
                kind: SymbolKind::Group,
                name: "foo/bar".into(),
                ocid: "ocid1.group.oc1..g".into(),
            })
        );
    }

    #[test]
    fn deny_admit_and_source_tenancy() {
        let cst = parse_one("deny admit group G of tenancy Src to read x in compartment a:b");
        let StatementCst::Admit(admit) = cst else {
            panic!("expected admit");
        };
        assert!(admit.deny);
        assert_eq!(admit.source_tenancy.as_deref(), Some("Src"));
        assert_eq!(
            admit.location,
            LocationCst::CompartmentPath(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn endorse_accepts_both_scope_positions() {
        let first = parse_one("endorse group G to tenancy Acceptor to associate x");
        let second = parse_one("endorse group G to associate x in tenancy Acceptor");
        assert_eq!(first, second);
        let StatementCst::Endorse(endorse) = first else {
            panic!("expected endorse");
        };
        assert_eq!(endorse.scope, EndorseScopeCst::Tenancy("Acceptor".into()));
        assert_eq!(endorse.verb, EndorseVerbCst::Associate);

        let any = parse_one("deny endorse any-user to manage x in any-tenancy");
        let StatementCst::Endorse(endorse) = any else {
            panic!("expected endorse");
        };
        assert!(endorse.deny);
        assert_eq!(endorse.scope, EndorseScopeCst::AnyTenancy);
    }

    #[test]
    fn nested_condition_ranges() {
        let text = "allow any-user to read x in tenancy where any { a = 'b', all { c != /d/ } }";
        let StatementCst::Allow(allow) = parse_one(text) else {
            panic!("expected allow");
        };
        let Some(ConditionCst::Group { mode, items, range }) = allow.condition else {
            panic!("expected group");
        };
        assert_eq!(mode, Mode::Any);
        assert_eq!(&text[range], "any { a = 'b', all { c != /d/ } }");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn condition_operators() {
        let text = "allow any-user to read x in tenancy where all { t before '2024', \
                    t after '2020', r in ('a', ocid1.x.oc1..y), t between 'a' and 'b', }";
        let StatementCst::Allow(allow) = parse_one(text) else {
            panic!("expected allow");
        };
        let Some(ConditionCst::Group { items, .. }) = allow.condition else {
            panic!("expected group");
        };
        let ops: Vec<&ClauseOpCst> = items
            .iter()
            .map(|item| match item {
                ConditionCst::Clause(c) => &c.op,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(matches!(ops[0], ClauseOpCst::Before(_)));
        assert!(matches!(ops[1], ClauseOpCst::After(_)));
        assert!(matches!(ops[2], ClauseOpCst::In(v) if v.len() == 2));
        assert!(matches!(ops[3], ClauseOpCst::Between(_, _)));
    }

    #[test]
    fn segments_split_at_statement_keywords() {
        let segments = parse_policy(
            "allow group A to read x in tenancy\ndeny endorse group B to manage y in any-tenancy\ndefine tenancy T as 'ocid1.tenancy.oc1..t'",
        );
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.result.is_ok()));
    }

    #[test]
    fn failure_blames_next_statement_keyword() {
        let text = "allow group B to read\nallow group C to read x in tenancy";
        let segments = parse_policy(text);
        assert_eq!(segments.len(), 2);
        let recovered = segments[0].result.clone().unwrap_err();
        assert_eq!(recovered.error_count(), 1);
        let failure = recovered.failure;
        let offending = failure.offending.expect("offending token");
        assert_eq!(offending.text, "allow");
        assert_eq!(offending.range, 22..27);
        assert!(failure.expected.contains(&"IN"));
        assert!(failure.expected.contains(&"WORD"));
        assert!(segments[1].result.is_ok());
    }

    #[test]
    fn failure_at_end_of_input_has_no_token() {
        let segments = parse_policy("allow group B to read");
        let recovered = segments[0].result.clone().unwrap_err();
        assert!(recovered.failure.offending.is_none());
    }

    #[test]
    fn leading_garbage_is_its_own_segment() {
        let segments = parse_policy("oops allow group A to read x in tenancy");
        assert_eq!(segments.len(), 2);
        assert!(!segments[0].starts_with_keyword);
        let recovered = segments[0].result.clone().unwrap_err();
        assert!(recovered.partial.is_none());
        assert!(segments[1].result.is_ok());
    }

    fn recover_one(text: &str) -> Recovered<PartialStatementCst> {
        let segments = parse_policy(text);
        assert_eq!(segments.len(), 1, "expected one segment for {text:?}");
        segments[0].result.clone().expect_err("statement fails")
    }

    #[test]
    fn recovery_keeps_fields_before_the_error() {
        let recovered = recover_one("allow group B to read");
        let partial = recovered.partial.expect("partial statement");
        assert_eq!(partial.head, StatementHead::Allow { deny: false });
        assert_eq!(partial.subject, Some(SubjectCst::GroupNames(vec!["B".into()])));
        assert_eq!(
            partial.verb,
            Some(EndorseVerbCst::Verb(VerbCst::Single("read".into())))
        );
        assert_eq!(partial.resource, None);
        assert_eq!(partial.location, None);
        assert_eq!(recovered.later, Vec::new());
    }

    #[test]
    fn recovery_reports_each_separate_error() {
        let recovered = recover_one("allow group ~ to read ~ in tenancy");
        let offending: Vec<_> = recovered
            .failures()
            .map(|f| f.offending.clone().expect("offending token").range)
            .collect();
        assert_eq!(offending, vec![12..13, 22..23]);
        assert_eq!(recovered.later[0].expected, vec!["IN"]);

        let partial = recovered.partial.expect("partial statement");
        assert_eq!(partial.subject, None);
        assert_eq!(
            partial.verb,
            Some(EndorseVerbCst::Verb(VerbCst::Single("read".into())))
        );
        assert_eq!(partial.location, Some(LocationCst::Tenancy));
    }

    #[test]
    fn broken_clause_keeps_its_neighbours() {
        let text = "allow any-user to read x in tenancy where all { a = 'b', c ~ 'd' }";
        let recovered = recover_one(text);
        assert_eq!(recovered.error_count(), 1);
        let partial = recovered.partial.expect("partial statement");
        let Some(ConditionCst::Group { mode, items, range }) = partial.condition else {
            panic!("expected group");
        };
        assert_eq!(mode, Mode::All);
        assert_eq!(&text[range], "all { a = 'b', c ~ 'd' }");
        assert_eq!(items.len(), 2);
        let ConditionCst::Clause(broken) = &items[1] else {
            panic!("expected clause");
        };
        assert_eq!(broken.lhs, "c");
        assert_eq!(broken.op, ClauseOpCst::Unknown("~ 'd'".into()));
        assert_eq!(&text[broken.range.clone()], "c ~ 'd'");
    }

    #[test]
    fn dangling_where_is_reported_once() {
        let recovered = recover_one("allow group ~ to read x in tenancy where");
        assert_eq!(recovered.error_count(), 2);
        assert!(recovered.later[0].offending.is_none());
        let partial = recovered.partial.expect("partial statement");
        assert_eq!(partial.condition, None);
        assert_eq!(partial.resource.as_deref(), Some("x"));
    }

    #[test]
    fn endorse_and_define_recover_by_keyword() {
        let endorse = recover_one("endorse group G to tenancy ~ to associate x")
            .partial
            .expect("partial endorse");
        assert_eq!(endorse.head, StatementHead::Endorse { deny: false });
        assert_eq!(endorse.scope, None);
        assert_eq!(endorse.verb, Some(EndorseVerbCst::Associate));
        assert_eq!(endorse.resource.as_deref(), Some("x"));

        let define = recover_one("define group as 'ocid1.group.oc1..g'")
            .partial
            .expect("partial define");
        assert_eq!(define.symbol, None);
        assert_eq!(define.ocid.as_deref(), Some("ocid1.group.oc1..g"));
    }
}
