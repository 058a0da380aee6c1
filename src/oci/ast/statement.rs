//! Normalized policy statements.
//!
//! A [`Statement`] is one flat record whose optional fields depend on its
//! [`StatementKind`]: action-bearing kinds fill `subject`, `actions`,
//! `resources` and usually `location`; `define` fills `symbol` and `def`;
//! `unknown` carries nothing but its span.

use serde::{Deserialize, Serialize};

use super::expr::Expr;
use super::span::Span;
use super::SCHEMA_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Allow,
    Deny,
    Admit,
    DenyAdmit,
    Endorse,
    DenyEndorse,
    Define,
    Unknown,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Admit => "admit",
            Self::DenyAdmit => "deny_admit",
            Self::Endorse => "endorse",
            Self::DenyEndorse => "deny_endorse",
            Self::Define => "define",
            Self::Unknown => "unknown",
        }
    }
}

/// A `{type, values}` pair, the common shape of most statement fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tagged<K, V = String> {
    #[serde(rename = "type")]
    pub kind: K,
    pub values: Vec<V>,
}

impl<K, V> Tagged<K, V> {
    pub fn new(kind: K, values: Vec<V>) -> Self {
        Self { kind, values }
    }

    pub fn empty(kind: K) -> Self {
        Self {
            kind,
            values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectKind {
    AnyUser,
    AnyGroup,
    Service,
    Group,
    GroupId,
    DynamicGroup,
    DynamicGroupId,
    Unknown,
}

/// A principal reference, optionally scoped to an identity domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectValue {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_domain: Option<String>,
}

impl SubjectValue {
    pub fn raw(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            identity_domain: None,
        }
    }
}

pub type Subject = Tagged<SubjectKind, SubjectValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Verbs,
    Permissions,
    Unknown,
}

pub type Actions = Tagged<ActionKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    AllResources,
    Specific,
    Unknown,
}

pub type Resources = Tagged<ResourceKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    #[serde(rename = "tenancy")]
    Tenancy,
    #[serde(rename = "compartment_name")]
    CompartmentName,
    #[serde(rename = "compartment-path")]
    CompartmentPath,
    #[serde(rename = "compartment-id")]
    CompartmentId,
    #[serde(rename = "unknown")]
    Unknown,
}

pub type Location = Tagged<LocationKind>;

/// Kind of an admit `source` or endorse `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenancyRefKind {
    #[serde(rename = "tenancy")]
    Tenancy,
    #[serde(rename = "tenancy_id")]
    TenancyId,
    #[serde(rename = "any-tenancy")]
    AnyTenancy,
    #[serde(rename = "unknown")]
    Unknown,
}

pub type TenancyRef = Tagged<TenancyRefKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Tenancy,
    Group,
    DynamicGroup,
    Compartment,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tenancy => "tenancy",
            Self::Group => "group",
            Self::DynamicGroup => "dynamic-group",
            Self::Compartment => "compartment",
        }
    }
}

/// The alias a `define` statement introduces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    #[serde(rename = "type")]
    pub kind: SymbolKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Ocid,
}

/// What a `define` alias stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Symbol>,
    #[serde(default, rename = "def", skip_serializing_if = "Option::is_none")]
    pub definition: Option<Definition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TenancyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TenancyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

impl Statement {
    /// A statement of the given kind with every optional field unset.
    pub fn bare(kind: StatementKind) -> Self {
        Self {
            kind,
            symbol: None,
            definition: None,
            subject: None,
            target: None,
            actions: None,
            resources: None,
            location: None,
            source: None,
            conditions: None,
            span: None,
            source_text: None,
        }
    }

    /// Clear every field whose output name is not in `keep`. `kind` stays.
    pub fn retain_fields<F: Fn(&str) -> bool>(&mut self, keep: F) {
        if !keep("symbol") {
            self.symbol = None;
        }
        if !keep("def") {
            self.definition = None;
        }
        if !keep("subject") {
            self.subject = None;
        }
        if !keep("target") {
            self.target = None;
        }
        if !keep("actions") {
            self.actions = None;
        }
        if !keep("resources") {
            self.resources = None;
        }
        if !keep("location") {
            self.location = None;
        }
        if !keep("source") {
            self.source = None;
        }
        if !keep("conditions") {
            self.conditions = None;
        }
        if !keep("span") {
            self.span = None;
        }
        if !keep("source_text") {
            self.source_text = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementsPayload {
    pub schema_version: String,
    pub statements: Vec<Statement>,
}

impl StatementsPayload {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            statements,
        }
    }
}
