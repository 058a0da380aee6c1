//! # oci-lexer-parser
//!
//! A lexer and parser for OCI IAM policy statements and dynamic-group
//! matching rules. Both languages are turned into normalized trees that
//! serialize to a stable JSON shape:
//!
//! ```text
//! let out = parse_policy_statements("allow group Admins to manage all-resources in tenancy",
//!     &PolicyOptions::default())?;
//! assert_eq!(out.payload.statements[0].kind, StatementKind::Allow);
//! ```
//!
//! See [`oci::api`] for the entry points and [`oci::ast`] for the output
//! shapes.

pub mod oci;

pub use oci::{
    parse_dynamic_group_matching_rules, parse_policy_statements, Diagnostics, ErrorMode,
    ParseError, ParseOutput, PolicyOptions, RuleOptions, TextInput,
};
