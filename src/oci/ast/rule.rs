//! Normalized dynamic-group matching rules.

use serde::{Deserialize, Serialize};

use super::expr::Expr;
use super::SCHEMA_VERSION;

/// One matching rule. `expr` is always a group at the top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Group nesting depth: 1 for a flat group.
    pub level: usize,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesPayload {
    pub schema_version: String,
    pub rules: Vec<Rule>,
}

impl RulesPayload {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            rules,
        }
    }
}
