//! Main module for oci-lexer-parser library functionality
//!
//! The pipeline runs `source` (comment stripping, ASCII check, rule
//! splitting), then `lexing`, then `parsing` into concrete trees, then
//! `building` into the normalized `ast`. `symbols` and `filtering`
//! post-process policy statements. `api` wires these together; `chunking`
//! and `config` serve callers with very large inputs or a config file.

pub mod api;
pub mod ast;
pub mod building;
pub mod chunking;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filtering;
pub mod lexing;
pub mod parsing;
pub mod source;
pub mod symbols;

pub use api::{
    parse_dynamic_group_matching_rules, parse_policy_statements, ParseOutput, PolicyOptions,
    RuleOptions, TextInput,
};
pub use diagnostics::{Diagnostics, SyntaxIssue};
pub use error::ParseError;
pub use filtering::ReturnFilter;
pub use parsing::ErrorMode;
pub use symbols::{apply_define_subs, build_symbols, SymbolTable};
