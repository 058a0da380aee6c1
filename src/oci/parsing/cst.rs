//! Concrete syntax trees
//!
//! One closed type per grammar rule. These exist only between parsing and
//! shaping; every node that can carry a span in the output keeps its byte
//! range into the cleaned text.

use std::ops::Range;

use crate::oci::ast::{Mode, StatementKind, SymbolKind};

pub type ByteRange = Range<usize>;

// ---------------------------------------------------------------------------
// Policy statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StatementCst {
    Allow(AllowCst),
    Define(DefineCst),
    Admit(AdmitCst),
    Endorse(EndorseCst),
}

/// `ALLOW|DENY subject TO verb [resource] IN location [WHERE condition]`
#[derive(Debug, Clone, PartialEq)]
pub struct AllowCst {
    pub deny: bool,
    pub subject: SubjectCst,
    pub verb: VerbCst,
    pub resource: Option<String>,
    pub location: LocationCst,
    pub condition: Option<ConditionCst>,
}

/// `DEFINE target AS ocid`
#[derive(Debug, Clone, PartialEq)]
pub struct DefineCst {
    pub kind: SymbolKind,
    pub name: String,
    pub ocid: String,
}

/// `[DENY] ADMIT subject [OF TENANCY name] TO verb [resource] IN location [WHERE condition]`
#[derive(Debug, Clone, PartialEq)]
pub struct AdmitCst {
    pub deny: bool,
    pub subject: SubjectCst,
    pub source_tenancy: Option<String>,
    pub verb: VerbCst,
    pub resource: Option<String>,
    pub location: LocationCst,
    pub condition: Option<ConditionCst>,
}

/// `[DENY] ENDORSE subject TO scope TO verb [resource] [WHERE condition]`, or
/// the same with the scope after `IN`.
#[derive(Debug, Clone, PartialEq)]
pub struct EndorseCst {
    pub deny: bool,
    pub subject: SubjectCst,
    pub scope: EndorseScopeCst,
    pub verb: EndorseVerbCst,
    pub resource: Option<String>,
    pub condition: Option<ConditionCst>,
}

/// The keywords a statement opens with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementHead {
    Allow { deny: bool },
    Admit { deny: bool },
    Endorse { deny: bool },
    Define,
}

impl StatementHead {
    pub fn kind(self) -> StatementKind {
        match self {
            Self::Allow { deny: false } => StatementKind::Allow,
            Self::Allow { deny: true } => StatementKind::Deny,
            Self::Admit { deny: false } => StatementKind::Admit,
            Self::Admit { deny: true } => StatementKind::DenyAdmit,
            Self::Endorse { deny: false } => StatementKind::Endorse,
            Self::Endorse { deny: true } => StatementKind::DenyEndorse,
            Self::Define => StatementKind::Define,
        }
    }
}

/// A statement read around its syntax errors.
///
/// A `None` field either could not be read or does not belong to `head`'s
/// form. Allow and admit statements never carry [`EndorseVerbCst::Associate`].
#[derive(Debug, Clone, PartialEq)]
pub struct PartialStatementCst {
    pub head: StatementHead,
    pub subject: Option<SubjectCst>,
    /// `Some(None)` when `OF` was written but the tenancy after it was not readable.
    pub source_tenancy: Option<Option<String>>,
    pub verb: Option<EndorseVerbCst>,
    pub resource: Option<String>,
    pub location: Option<LocationCst>,
    pub scope: Option<EndorseScopeCst>,
    pub condition: Option<ConditionCst>,
    pub symbol: Option<(SymbolKind, String)>,
    pub ocid: Option<String>,
}

impl PartialStatementCst {
    pub fn new(head: StatementHead) -> Self {
        Self {
            head,
            subject: None,
            source_tenancy: None,
            verb: None,
            resource: None,
            location: None,
            scope: None,
            condition: None,
            symbol: None,
            ocid: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubjectCst {
    AnyUser,
    AnyGroup,
    Service(Vec<String>),
    GroupNames(Vec<String>),
    GroupIds(Vec<String>),
    DynamicGroupNames(Vec<String>),
    DynamicGroupIds(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerbCst {
    /// `{A, B, C}`
    Braced(Vec<String>),
    Single(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndorseVerbCst {
    Associate,
    Verb(VerbCst),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndorseScopeCst {
    AnyTenancy,
    Tenancy(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationCst {
    Tenancy,
    CompartmentId(String),
    /// `name(:name)*`
    CompartmentPath(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionCst {
    Group {
        mode: Mode,
        items: Vec<ConditionCst>,
        range: ByteRange,
    },
    Clause(ClauseCst),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClauseCst {
    pub lhs: String,
    pub op: ClauseOpCst,
    pub range: ByteRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseOpCst {
    Compare { negated: bool, value: ValueCst },
    In(Vec<ValueCst>),
    Before(ValueCst),
    After(ValueCst),
    Between(ValueCst, ValueCst),
    /// A clause that did not parse; holds the raw text after the left-hand side.
    Unknown(String),
}

/// Condition operand. Quoted forms hold the text between the quotes.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueCst {
    Quoted(String),
    QuotedOcid(String),
    Ocid(String),
    Pattern(String),
    Word(String),
}

// ---------------------------------------------------------------------------
// Matching rules
// ---------------------------------------------------------------------------

/// `[ALL|ANY] ({ elements } | elements)`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingRuleCst {
    pub mode: Option<Mode>,
    pub elements: Vec<ElementCst>,
    pub range: ByteRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementCst {
    Group {
        mode: Option<Mode>,
        elements: Vec<ElementCst>,
        range: ByteRange,
    },
    Predicate(PredicateCst),
}

/// `path [(= | !=) 'literal']`
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateCst {
    pub path: String,
    pub comparison: Option<ComparisonCst>,
    pub range: ByteRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonCst {
    pub negated: bool,
    /// Literal text without the surrounding quotes, escapes untouched.
    pub literal: String,
}
