//! Policy statement shaper.

use std::ops::Range;

use super::simplify::simplify;
use super::SpanSource;
use crate::oci::ast::{
    ActionKind, Actions, Clause, Definition, DefinitionKind, Expr, Group, Location, LocationKind,
    Mode, Op, Predicate, ResourceKind, Resources, Statement, StatementKind, Subject, SubjectKind,
    SubjectValue, Symbol, TenancyRef, TenancyRefKind, Value,
};
use crate::oci::parsing::cst::*;

const STANDARD_VERBS: [&str; 4] = ["manage", "use", "read", "inspect"];

/// Builds [`Statement`]s from parsed statement segments of one document.
pub struct PolicyBuilder<'a> {
    spans: SpanSource<'a>,
    nested_simplify: bool,
}

impl<'a> PolicyBuilder<'a> {
    /// `cleaned` is the comment-stripped text the segments were parsed from.
    pub fn new(cleaned: &'a str, include_spans: bool, nested_simplify: bool) -> Self {
        Self {
            spans: SpanSource::new(cleaned, include_spans),
            nested_simplify,
        }
    }

    pub fn statement(&self, cst: &StatementCst, range: &Range<usize>) -> Statement {
        let mut statement = match cst {
            StatementCst::Allow(allow) => self.allow(allow),
            StatementCst::Define(define) => define_statement(define),
            StatementCst::Admit(admit) => self.admit(admit),
            StatementCst::Endorse(endorse) => self.endorse(endorse),
        };
        self.attach_span(&mut statement, range);
        statement
    }

    /// A statement that only partly parsed. Fields of its form that could not
    /// be read are shaped with their `unknown` kind; a define keeps whichever
    /// of symbol and definition it has.
    pub fn partial(&self, cst: &PartialStatementCst, range: &Range<usize>) -> Statement {
        let mut statement = Statement::bare(cst.head.kind());
        if cst.head == StatementHead::Define {
            statement.symbol = cst.symbol.as_ref().map(|(kind, name)| Symbol {
                kind: *kind,
                name: name.clone(),
            });
            statement.definition = cst.ocid.as_ref().map(|ocid| Definition {
                kind: DefinitionKind::Ocid,
                value: ocid.clone(),
            });
            self.attach_span(&mut statement, range);
            return statement;
        }

        statement.subject = Some(
            cst.subject
                .as_ref()
                .map_or_else(|| Subject::empty(SubjectKind::Unknown), subject),
        );
        statement.actions = Some(
            cst.verb
                .as_ref()
                .map_or_else(|| Actions::empty(ActionKind::Unknown), endorse_actions),
        );
        statement.resources = Some(resources(cst.resource.as_deref()));
        match cst.head {
            StatementHead::Endorse { .. } => {
                statement.target = Some(
                    cst.scope
                        .as_ref()
                        .map_or_else(|| TenancyRef::empty(TenancyRefKind::Unknown), target),
                );
            }
            _ => {
                statement.location = Some(
                    cst.location
                        .as_ref()
                        .map_or_else(|| Location::empty(LocationKind::Unknown), location),
                );
                statement.source = cst.source_tenancy.as_ref().map(|name| match name {
                    Some(name) => TenancyRef::new(TenancyRefKind::Tenancy, vec![name.clone()]),
                    None => TenancyRef::empty(TenancyRefKind::Unknown),
                });
            }
        }
        statement.conditions = cst.condition.as_ref().map(|c| self.conditions(c));
        self.attach_span(&mut statement, range);
        statement
    }

    fn attach_span(&self, statement: &mut Statement, range: &Range<usize>) {
        let (span, source_text) = self.spans.span(range);
        statement.span = span;
        statement.source_text = source_text;
    }

    fn allow(&self, allow: &AllowCst) -> Statement {
        let kind = if allow.deny {
            StatementKind::Deny
        } else {
            StatementKind::Allow
        };
        let mut statement = Statement::bare(kind);
        statement.subject = Some(subject(&allow.subject));
        statement.actions = Some(actions(&allow.verb));
        statement.resources = Some(resources(allow.resource.as_deref()));
        statement.location = Some(location(&allow.location));
        statement.conditions = allow.condition.as_ref().map(|c| self.conditions(c));
        statement
    }

    fn admit(&self, admit: &AdmitCst) -> Statement {
        let kind = if admit.deny {
            StatementKind::DenyAdmit
        } else {
            StatementKind::Admit
        };
        let mut statement = Statement::bare(kind);
        statement.subject = Some(subject(&admit.subject));
        statement.actions = Some(actions(&admit.verb));
        statement.resources = Some(resources(admit.resource.as_deref()));
        statement.location = Some(location(&admit.location));
        statement.source = admit
            .source_tenancy
            .as_ref()
            .map(|name| TenancyRef::new(TenancyRefKind::Tenancy, vec![name.clone()]));
        statement.conditions = admit.condition.as_ref().map(|c| self.conditions(c));
        statement
    }

    fn endorse(&self, endorse: &EndorseCst) -> Statement {
        let kind = if endorse.deny {
            StatementKind::DenyEndorse
        } else {
            StatementKind::Endorse
        };
        let mut statement = Statement::bare(kind);
        statement.subject = Some(subject(&endorse.subject));
        statement.target = Some(target(&endorse.scope));
        statement.actions = Some(endorse_actions(&endorse.verb));
        statement.resources = Some(resources(endorse.resource.as_deref()));
        statement.conditions = endorse.condition.as_ref().map(|c| self.conditions(c));
        statement
    }

    /// Always a group: a lone clause is wrapped in `all`, which shares the
    /// clause's span.
    fn conditions(&self, condition: &ConditionCst) -> Expr {
        let mut expr = self.condition(condition);
        if self.nested_simplify {
            expr = simplify(expr, false);
        }
        match expr {
            Expr::Group(_) => expr,
            Expr::Clause(clause) => {
                let span = clause.node.span;
                let source_text = clause.node.source_text.clone();
                Expr::Group(Group {
                    mode: Mode::All,
                    items: vec![Expr::Clause(clause)],
                    span,
                    source_text,
                })
            }
        }
    }

    fn condition(&self, condition: &ConditionCst) -> Expr {
        match condition {
            ConditionCst::Group { mode, items, range } => {
                let (span, source_text) = self.spans.span(range);
                Expr::Group(Group {
                    mode: *mode,
                    items: items.iter().map(|item| self.condition(item)).collect(),
                    span,
                    source_text,
                })
            }
            ConditionCst::Clause(clause) => {
                let (op, rhs) = match &clause.op {
                    ClauseOpCst::Unknown(rest) => (Op::Unknown, Value::literal(rest.clone())),
                    ClauseOpCst::Compare { negated, value } => {
                        (if *negated { Op::Neq } else { Op::Eq }, typed_value(value))
                    }
                    ClauseOpCst::In(values) => (
                        Op::In,
                        Value::List {
                            values: values.iter().map(typed_value).collect(),
                        },
                    ),
                    ClauseOpCst::Before(value) => (Op::Before, typed_value(value)),
                    ClauseOpCst::After(value) => (Op::After, typed_value(value)),
                    ClauseOpCst::Between(from, to) => (
                        Op::Between,
                        Value::Range {
                            from: Box::new(typed_value(from)),
                            to: Box::new(typed_value(to)),
                        },
                    ),
                };
                let mut node = Predicate::compare(clause.lhs.clone(), op, rhs);
                let (span, source_text) = self.spans.span(&clause.range);
                node.span = span;
                node.source_text = source_text;
                Expr::Clause(Clause { node })
            }
        }
    }
}

fn define_statement(define: &DefineCst) -> Statement {
    let mut statement = Statement::bare(StatementKind::Define);
    statement.symbol = Some(Symbol {
        kind: define.kind,
        name: define.name.clone(),
    });
    statement.definition = Some(Definition {
        kind: DefinitionKind::Ocid,
        value: define.ocid.clone(),
    });
    statement
}

fn target(scope: &EndorseScopeCst) -> TenancyRef {
    match scope {
        EndorseScopeCst::AnyTenancy => TenancyRef::empty(TenancyRefKind::AnyTenancy),
        EndorseScopeCst::Tenancy(name) => TenancyRef::new(TenancyRefKind::Tenancy, vec![name.clone()]),
    }
}

fn endorse_actions(verb: &EndorseVerbCst) -> Actions {
    match verb {
        EndorseVerbCst::Associate => Actions::new(ActionKind::Verbs, vec!["associate".to_string()]),
        EndorseVerbCst::Verb(verb) => actions(verb),
    }
}

fn raw(values: &[String]) -> Vec<SubjectValue> {
    values.iter().map(SubjectValue::raw).collect()
}

fn subject(subject: &SubjectCst) -> Subject {
    match subject {
        SubjectCst::AnyUser => Subject::empty(SubjectKind::AnyUser),
        SubjectCst::AnyGroup => Subject::empty(SubjectKind::AnyGroup),
        SubjectCst::Service(names) => Subject::new(SubjectKind::Service, raw(names)),
        SubjectCst::GroupNames(names) => Subject::new(SubjectKind::Group, raw(names)),
        SubjectCst::GroupIds(ids) => Subject::new(SubjectKind::GroupId, raw(ids)),
        SubjectCst::DynamicGroupNames(names) => Subject::new(SubjectKind::DynamicGroup, raw(names)),
        SubjectCst::DynamicGroupIds(ids) => Subject::new(SubjectKind::DynamicGroupId, raw(ids)),
    }
}

/// Standard verbs stay verbs; any other word, and every braced list, is a
/// set of permissions. Everything is lowercased.
fn actions(verb: &VerbCst) -> Actions {
    match verb {
        VerbCst::Braced(words) => {
            let values: Vec<String> = words
                .iter()
                .filter(|w| !w.is_empty())
                .map(|w| w.to_ascii_lowercase())
                .collect();
            if values.is_empty() {
                Actions::empty(ActionKind::Unknown)
            } else {
                Actions::new(ActionKind::Permissions, values)
            }
        }
        VerbCst::Single(word) => {
            let lower = word.to_ascii_lowercase();
            if STANDARD_VERBS.contains(&lower.as_str()) {
                Actions::new(ActionKind::Verbs, vec![lower])
            } else {
                Actions::new(ActionKind::Permissions, vec![lower])
            }
        }
    }
}

fn resources(resource: Option<&str>) -> Resources {
    match resource {
        None => Resources::empty(ResourceKind::Unknown),
        Some(token) if token.eq_ignore_ascii_case("all-resources") => {
            Resources::empty(ResourceKind::AllResources)
        }
        Some(token) => Resources::new(ResourceKind::Specific, vec![token.to_string()]),
    }
}

fn location(location: &LocationCst) -> Location {
    match location {
        LocationCst::Tenancy => Location::empty(LocationKind::Tenancy),
        LocationCst::CompartmentId(ocid) => {
            Location::new(LocationKind::CompartmentId, vec![ocid.clone()])
        }
        LocationCst::CompartmentPath(names) if names.len() == 1 => {
            Location::new(LocationKind::CompartmentName, names.clone())
        }
        LocationCst::CompartmentPath(names) => {
            Location::new(LocationKind::CompartmentPath, names.clone())
        }
    }
}

fn typed_value(value: &ValueCst) -> Value {
    match value {
        ValueCst::Quoted(text) | ValueCst::Word(text) => Value::literal(text.clone()),
        ValueCst::QuotedOcid(text) | ValueCst::Ocid(text) => Value::ocid(text.clone()),
        ValueCst::Pattern(text) => Value::regex(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::parsing::policy::parse_policy;

    fn build(text: &str, include_spans: bool, nested_simplify: bool) -> Vec<Statement> {
        let builder = PolicyBuilder::new(text, include_spans, nested_simplify);
        parse_policy(text)
            .iter()
            .filter_map(|segment| match &segment.result {
                Ok(cst) => Some(builder.statement(cst, &segment.range)),
                Err(recovered) => recovered
                    .partial
                    .as_ref()
                    .map(|partial| builder.partial(partial, &segment.range)),
            })
            .collect()
    }

    #[test]
    fn verbs_and_permissions() {
        let statements = build(
            "allow group A to MANAGE all-resources in tenancy\n\
             allow group A to KEY_READ vaults in tenancy\n\
             allow group A to {READ, Key_Write} vaults in tenancy",
            false,
            false,
        );
        assert_eq!(
            statements[0].actions,
            Some(Actions::new(ActionKind::Verbs, vec!["manage".into()]))
        );
        assert_eq!(
            statements[0].resources,
            Some(Resources::empty(ResourceKind::AllResources))
        );
        assert_eq!(
            statements[1].actions,
            Some(Actions::new(ActionKind::Permissions, vec!["key_read".into()]))
        );
        assert_eq!(
            statements[2].actions,
            Some(Actions::new(
                ActionKind::Permissions,
                vec!["read".into(), "key_write".into()]
            ))
        );
        assert_eq!(
            statements[2].resources,
            Some(Resources::new(ResourceKind::Specific, vec!["vaults".into()]))
        );
    }

    #[test]
    fn single_clause_is_wrapped_in_all_group() {
        let statements = build(
            "allow any-user to read x in tenancy where request.user.id = 'ocid1.user.oc1..u'",
            false,
            false,
        );
        let Some(Expr::Group(group)) = &statements[0].conditions else {
            panic!("expected group");
        };
        assert_eq!(group.mode, Mode::All);
        let predicate = group.items[0].as_predicate().expect("clause");
        assert_eq!(predicate.op, Op::Eq);
        assert_eq!(predicate.rhs, Some(Value::ocid("ocid1.user.oc1..u")));
    }

    #[test]
    fn nested_simplify_flattens_without_collapsing() {
        let text = "allow any-user to read x in tenancy where all { all { a = 'x', b = 'y' } }";
        let plain = build(text, false, false);
        let simplified = build(text, false, true);

        let nested = plain[0].conditions.as_ref().and_then(Expr::as_group).unwrap();
        assert_eq!(nested.items.len(), 1);
        let flat = simplified[0].conditions.as_ref().and_then(Expr::as_group).unwrap();
        assert_eq!(flat.items.len(), 2);
        assert!(flat.items.iter().all(|item| item.as_predicate().is_some()));
    }

    #[test]
    fn endorse_and_admit_shapes() {
        let statements = build(
            "deny endorse group G to any-tenancy to associate x\n\
             admit group G of tenancy Src to read objects in compartment a:b",
            false,
            false,
        );
        assert_eq!(statements[0].kind, StatementKind::DenyEndorse);
        assert_eq!(
            statements[0].target,
            Some(TenancyRef::empty(TenancyRefKind::AnyTenancy))
        );
        assert_eq!(
            statements[0].actions,
            Some(Actions::new(ActionKind::Verbs, vec!["associate".into()]))
        );
        assert!(statements[0].location.is_none());

        assert_eq!(statements[1].kind, StatementKind::Admit);
        assert_eq!(
            statements[1].source,
            Some(TenancyRef::new(TenancyRefKind::Tenancy, vec!["Src".into()]))
        );
        assert_eq!(
            statements[1].location,
            Some(Location::new(
                LocationKind::CompartmentPath,
                vec!["a".into(), "b".into()]
            ))
        );
    }

    #[test]
    fn spans_cover_statement_and_clauses() {
        let text = "allow group A to read x in tenancy\n\nallow any-user to use y in tenancy where t = 'z'";
        let statements = build(text, true, false);
        assert_eq!(
            statements[0].source_text.as_deref(),
            Some("allow group A to read x in tenancy")
        );
        let span = statements[1].span.expect("span");
        assert_eq!((span.line, span.column), (3, 0));
        let group = statements[1].conditions.as_ref().and_then(Expr::as_group).unwrap();
        let predicate = group.items[0].as_predicate().unwrap();
        assert_eq!(predicate.source_text.as_deref(), Some("t = 'z'"));
    }

    #[test]
    fn lone_clause_group_shares_the_clause_span() {
        let text = "allow any-user to use y in tenancy where t = 'z'";
        let statements = build(text, true, false);
        let group = statements[0].conditions.as_ref().and_then(Expr::as_group).unwrap();
        assert_eq!(group.source_text.as_deref(), Some("t = 'z'"));
        let span = group.span.expect("group span");
        assert_eq!((span.start, span.stop), (41, 47));
        assert_eq!(group.span, group.items[0].as_predicate().unwrap().span);

        let plain = build(text, false, false);
        let group = plain[0].conditions.as_ref().and_then(Expr::as_group).unwrap();
        assert!(group.span.is_none());
    }

    #[test]
    fn partial_statement_keeps_what_parsed() {
        let statements = build("allow group A to read\nallow group B to read y in tenancy", true, false);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].kind, StatementKind::Allow);
        assert_eq!(statements[0].source_text.as_deref(), Some("allow group A to read"));
        assert_eq!(
            statements[0].subject.as_ref().map(|s| s.kind),
            Some(SubjectKind::Group)
        );
        assert_eq!(
            statements[0].actions,
            Some(Actions::new(ActionKind::Verbs, vec!["read".into()]))
        );
        assert_eq!(statements[0].location, Some(Location::empty(LocationKind::Unknown)));
        assert_eq!(statements[1].kind, StatementKind::Allow);
    }

    #[test]
    fn unreadable_fields_get_unknown_kinds() {
        let statements = build(
            "deny endorse group ~ to tenancy ~ to manage x\n\
             admit any-user of ~ to read y in tenancy where all { a = 'b', c ~ 'd' }\n\
             define tenancy T as ~",
            false,
            false,
        );
        assert_eq!(statements[0].kind, StatementKind::DenyEndorse);
        assert_eq!(
            statements[0].subject.as_ref().map(|s| s.kind),
            Some(SubjectKind::Unknown)
        );
        assert_eq!(statements[0].target, Some(TenancyRef::empty(TenancyRefKind::Unknown)));
        assert_eq!(
            statements[0].actions,
            Some(Actions::new(ActionKind::Verbs, vec!["manage".into()]))
        );

        assert_eq!(statements[1].kind, StatementKind::Admit);
        assert_eq!(statements[1].source, Some(TenancyRef::empty(TenancyRefKind::Unknown)));
        let group = statements[1].conditions.as_ref().and_then(Expr::as_group).unwrap();
        let broken = group.items[1].as_predicate().unwrap();
        assert_eq!(broken.lhs, "c");
        assert_eq!(broken.op, Op::Unknown);
        assert_eq!(broken.rhs, Some(Value::literal("~ 'd'")));

        assert_eq!(statements[2].kind, StatementKind::Define);
        assert_eq!(
            statements[2].symbol,
            Some(Symbol {
                kind: crate::oci::ast::SymbolKind::Tenancy,
                name: "T".into()
            })
        );
        assert_eq!(statements[2].definition, None);
    }

    #[test]
    fn missing_resource_is_unknown() {
        let statements = build("allow service faas to {KEY_READ} in tenancy", false, false);
        assert_eq!(statements[0].resources, Some(Resources::empty(ResourceKind::Unknown)));
    }
}
