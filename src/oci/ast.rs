//! Normalized output trees
//!
//! These are the shapes handed back to callers. They serialize to the JSON
//! payload format directly; optional fields are omitted when unset.

pub mod expr;
pub mod rule;
pub mod span;
pub mod statement;

pub use expr::{Clause, Expr, Group, Mode, Op, Predicate, Value};
pub use rule::{Rule, RulesPayload};
pub use span::Span;
pub use statement::{
    ActionKind, Actions, Definition, DefinitionKind, Location, LocationKind, ResourceKind,
    Resources, Statement, StatementKind, StatementsPayload, Subject, SubjectKind, SubjectValue,
    Symbol, SymbolKind, Tagged, TenancyRef, TenancyRefKind,
};

/// Version marker carried by every payload.
pub const SCHEMA_VERSION: &str = "1.0";
