//! Public parsing entry points
//!
//!     Both entry points run the same pipeline shape:
//!
//!         1. Blank out comments and reject non-ASCII input.
//!         2. Lex and parse, one statement segment or rule chunk at a time.
//!         3. Shape concrete trees into output trees.
//!         4. Post-process the output trees (policies only): DEFINE
//!            substitution, default tenancy alias, identity domains, filtering.
//!
//!     The error mode decides what a syntax error does: [`ErrorMode::Raise`]
//!     returns it as [`ParseError::Syntax`], [`ErrorMode::Report`] records it
//!     in [`ParseOutput::diagnostics`] and keeps going, [`ErrorMode::Ignore`]
//!     keeps going silently. Invalid characters always abort.

use serde::{Deserialize, Serialize};

use crate::oci::ast::{
    LocationKind, Rule, RulesPayload, Statement, StatementsPayload, SubjectKind,
};
use crate::oci::building::{PolicyBuilder, RuleBuilder};
use crate::oci::diagnostics::{Diagnostics, IssueCollector};
use crate::oci::error::ParseError;
use crate::oci::filtering::ReturnFilter;
use crate::oci::parsing::policy::parse_policy;
use crate::oci::parsing::rules::parse_rule;
use crate::oci::parsing::{ErrorMode, SyntaxFailure};
use crate::oci::source::{split_rules, strip_comments, validate_ascii};
use crate::oci::symbols::{apply_define_subs, build_symbols};

/// Input text: one string, or several joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInput {
    Text(String),
    Lines(Vec<String>),
}

impl TextInput {
    pub fn into_text(self) -> String {
        match self {
            TextInput::Text(text) => text,
            TextInput::Lines(lines) => lines.join("\n"),
        }
    }
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        TextInput::Text(text.to_string())
    }
}

impl From<String> for TextInput {
    fn from(text: String) -> Self {
        TextInput::Text(text)
    }
}

impl From<&String> for TextInput {
    fn from(text: &String) -> Self {
        TextInput::Text(text.clone())
    }
}

impl From<Vec<String>> for TextInput {
    fn from(lines: Vec<String>) -> Self {
        TextInput::Lines(lines)
    }
}

impl From<&[&str]> for TextInput {
    fn from(lines: &[&str]) -> Self {
        TextInput::Lines(lines.iter().map(|l| l.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TextInput {
    fn from(lines: [&str; N]) -> Self {
        TextInput::Lines(lines.iter().map(|l| l.to_string()).collect())
    }
}

/// Options for [`parse_policy_statements`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    /// Replace DEFINE aliases with their OCIDs where they resolve.
    pub define_subs: bool,
    /// Attach `span` and `source_text` to statements and condition nodes.
    pub include_spans: bool,
    /// Flatten same-mode nested condition groups.
    pub nested_simplify: bool,
    pub error_mode: ErrorMode,
    /// Value placed into a bare `IN TENANCY` location.
    pub default_tenancy_alias: Option<String>,
    /// Identity domain for group subjects written without a `Domain/` prefix.
    pub default_identity_domain: Option<String>,
    pub return_filter: Option<ReturnFilter>,
}

/// Options for [`parse_dynamic_group_matching_rules`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuleOptions {
    pub include_spans: bool,
    /// Flatten same-mode nested groups and collapse single-child groups.
    pub nested_simplify: bool,
    pub error_mode: ErrorMode,
}

/// A payload plus diagnostics. `diagnostics` is `Some` exactly in report
/// mode, even when no error occurred.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutput<T> {
    #[serde(flatten)]
    pub payload: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl<T> ParseOutput<T> {
    pub fn error_count(&self) -> usize {
        self.diagnostics.as_ref().map_or(0, |d| d.error_count)
    }
}

/// Parse policy statements into a [`StatementsPayload`].
pub fn parse_policy_statements(
    text: impl Into<TextInput>,
    options: &PolicyOptions,
) -> Result<ParseOutput<StatementsPayload>, ParseError> {
    let original = text.into().into_text();
    let cleaned = strip_comments(&original);
    validate_ascii(&cleaned)?;

    let report = options.error_mode == ErrorMode::Report;
    if cleaned.trim().is_empty() {
        return Ok(ParseOutput {
            payload: StatementsPayload::new(Vec::new()),
            diagnostics: report.then(Diagnostics::default),
        });
    }

    let segments = parse_policy(&cleaned);
    let builder = PolicyBuilder::new(&cleaned, options.include_spans, options.nested_simplify);
    let mut collector = IssueCollector::for_policy(&original, &cleaned);
    let mut statements = Vec::with_capacity(segments.len());

    for segment in &segments {
        match &segment.result {
            Ok(cst) => statements.push(builder.statement(cst, &segment.range)),
            Err(recovered) => {
                match options.error_mode {
                    ErrorMode::Raise => {
                        return Err(syntax_error(
                            &collector,
                            &recovered.failure,
                            "policy statements",
                        ))
                    }
                    ErrorMode::Report => {
                        for failure in recovered.failures() {
                            collector.record(failure);
                        }
                    }
                    ErrorMode::Ignore => {}
                }
                if let Some(partial) = &recovered.partial {
                    tracing::warn!(
                        start = segment.range.start,
                        end = segment.range.end,
                        errors = recovered.error_count(),
                        "statement only partly parsed"
                    );
                    statements.push(builder.partial(partial, &segment.range));
                }
            }
        }
    }

    if options.define_subs {
        let table = build_symbols(&statements);
        if !table.is_empty() {
            tracing::debug!(symbols = table.len(), "applying DEFINE substitutions");
            statements = apply_define_subs(statements, &table);
        }
    }

    if let Some(alias) = non_empty(&options.default_tenancy_alias) {
        inject_default_tenancy_alias(&mut statements, alias);
    }

    normalize_subject_values(&mut statements, non_empty(&options.default_identity_domain));

    if let Some(filter) = &options.return_filter {
        statements = filter.apply(statements);
    }

    let issues = collector.into_issues();
    tracing::debug!(
        statements = statements.len(),
        errors = issues.len(),
        "parsed policy statements"
    );

    Ok(ParseOutput {
        payload: StatementsPayload::new(statements),
        diagnostics: report.then(|| Diagnostics::new(issues)),
    })
}

/// Parse dynamic-group matching rules, one rule per top-level line, into a
/// [`RulesPayload`].
pub fn parse_dynamic_group_matching_rules(
    text: impl Into<TextInput>,
    options: &RuleOptions,
) -> Result<ParseOutput<RulesPayload>, ParseError> {
    let original = text.into().into_text();
    let cleaned = strip_comments(&original);
    validate_ascii(&cleaned)?;

    let report = options.error_mode == ErrorMode::Report;
    if cleaned.trim().is_empty() {
        return Ok(ParseOutput {
            payload: RulesPayload::new(Vec::new()),
            diagnostics: report.then(Diagnostics::default),
        });
    }

    let chunks = split_rules(&cleaned);
    let mut rules: Vec<Rule> = Vec::with_capacity(chunks.len());
    let mut issues = Vec::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let text = chunk.text.as_str();
        let builder = RuleBuilder::new(text, options.include_spans, options.nested_simplify);
        match parse_rule(text) {
            Ok(cst) => rules.push(builder.rule(&cst)),
            Err(recovered) => {
                let mut collector = IssueCollector::for_rule(text);
                match options.error_mode {
                    ErrorMode::Raise => {
                        return Err(syntax_error(&collector, &recovered.failure, "matching rules"))
                    }
                    ErrorMode::Report => {
                        for failure in recovered.failures() {
                            let mut issue = collector.record(failure).clone();
                            issue.rule_index = Some(index + 1);
                            issues.push(issue);
                        }
                    }
                    ErrorMode::Ignore => {}
                }
                tracing::warn!(
                    rule = index + 1,
                    errors = recovered.error_count(),
                    "matching rule only partly parsed"
                );
                if let Some(partial) = &recovered.partial {
                    rules.push(builder.rule(partial));
                }
            }
        }
    }

    tracing::debug!(
        rules = rules.len(),
        errors = issues.len(),
        "parsed dynamic-group matching rules"
    );

    Ok(ParseOutput {
        payload: RulesPayload::new(rules),
        diagnostics: report.then(|| Diagnostics::new(issues)),
    })
}

fn syntax_error(collector: &IssueCollector, failure: &SyntaxFailure, what: &'static str) -> ParseError {
    if failure.offending.is_none() && failure.expected.is_empty() {
        return ParseError::SyntaxUnlocated { what };
    }
    let (line, column) = collector.position(failure);
    ParseError::Syntax { line, column }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Fill a bare `IN TENANCY` location with `alias`. Admit sources and endorse
/// targets are separate fields and stay as written.
fn inject_default_tenancy_alias(statements: &mut [Statement], alias: &str) {
    for statement in statements {
        if let Some(location) = statement.location.as_mut() {
            if location.kind == LocationKind::Tenancy && location.values.is_empty() {
                location.values.push(alias.to_string());
            }
        }
    }
}

/// Split `Domain/Name` group and dynamic-group labels into an identity domain
/// and a label, falling back to `default_domain` when there is no prefix.
fn normalize_subject_values(statements: &mut [Statement], default_domain: Option<&str>) {
    for statement in statements {
        let Some(subject) = statement.subject.as_mut() else {
            continue;
        };
        if !matches!(subject.kind, SubjectKind::Group | SubjectKind::DynamicGroup) {
            continue;
        }
        for value in &mut subject.values {
            if value.identity_domain.is_some() {
                continue;
            }
            if let Some((domain, label)) = value.label.split_once('/') {
                if !domain.is_empty() && !label.is_empty() {
                    let (domain, label) = (domain.to_string(), label.to_string());
                    value.identity_domain = Some(domain);
                    value.label = label;
                    continue;
                }
            }
            value.identity_domain = default_domain.map(str::to_string);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::ast::SubjectValue;

    #[test]
    fn text_input_joins_lines() {
        let input: TextInput = ["allow group A to read x in tenancy", "define tenancy T as 'ocid1.tenancy.oc1..t'"].into();
        assert_eq!(
            input.into_text(),
            "allow group A to read x in tenancy\ndefine tenancy T as 'ocid1.tenancy.oc1..t'"
        );
    }

    #[test]
    fn empty_input_reports_zero_errors() {
        let options = PolicyOptions {
            error_mode: ErrorMode::Report,
            ..PolicyOptions::default()
        };
        let output = parse_policy_statements("  // nothing\n", &options).unwrap();
        assert!(output.payload.statements.is_empty());
        assert_eq!(output.diagnostics, Some(Diagnostics::default()));

        let output = parse_policy_statements("", &PolicyOptions::default()).unwrap();
        assert_eq!(output.diagnostics, None);
    }

    #[test]
    fn identity_domain_split_needs_both_sides() {
        let mut statement = Statement::bare(crate::oci::ast::StatementKind::Allow);
        statement.subject = Some(crate::oci::ast::Subject::new(
            SubjectKind::Group,
            vec![
                SubjectValue::raw("Dom/Admins"),
                SubjectValue::raw("/Odd"),
                SubjectValue::raw("Plain"),
            ],
        ));
        let mut statements = vec![statement];
        normalize_subject_values(&mut statements, Some("Default"));
        let values = &statements[0].subject.as_ref().unwrap().values;
        assert_eq!(values[0].identity_domain.as_deref(), Some("Dom"));
        assert_eq!(values[0].label, "Admins");
        assert_eq!(values[1].identity_domain.as_deref(), Some("Default"));
        assert_eq!(values[1].label, "/Odd");
        assert_eq!(values[2].identity_domain.as_deref(), Some("Default"));
    }

    #[test]
    fn output_serializes_flat() {
        let output = ParseOutput {
            payload: RulesPayload::new(Vec::new()),
            diagnostics: Some(Diagnostics::default()),
        };
        assert_eq!(
            serde_json::to_string(&output).unwrap(),
            r#"{"schema_version":"1.0","rules":[],"diagnostics":{"errors":[],"error_count":0}}"#
        );
    }
}
