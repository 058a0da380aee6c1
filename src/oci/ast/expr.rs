//! Boolean group/predicate trees shared by policy conditions and matching rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::span::Span;

static OCID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^ocid1\.[a-z0-9_]+\.[a-z0-9-]+\.[a-z0-9-]*\..+$").expect("valid OCID regex")
});

/// True when `value` has the `ocid1.<type>.<realm>.<region?>.<suffix>` shape.
///
/// Shape only. Nothing checks that the identifier exists.
pub fn looks_like_ocid(value: &str) -> bool {
    OCID_SHAPE.is_match(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Expr {
    Group(Group),
    Clause(Clause),
}

impl Expr {
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Expr::Group(group) => Some(group),
            Expr::Clause(_) => None,
        }
    }

    pub fn as_predicate(&self) -> Option<&Predicate> {
        match self {
            Expr::Clause(clause) => Some(&clause.node),
            Expr::Group(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub mode: Mode,
    pub items: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

impl Group {
    pub fn new(mode: Mode, items: Vec<Expr>) -> Self {
        Self {
            mode,
            items,
            span: None,
            source_text: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub node: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Eq,
    Neq,
    In,
    Before,
    After,
    Between,
    Exists,
    Unknown,
}

/// `lhs op rhs`; `rhs` is absent exactly when `op` is [`Op::Exists`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub lhs: String,
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

impl Predicate {
    pub fn compare(lhs: impl Into<String>, op: Op, rhs: Value) -> Self {
        Self {
            lhs: lhs.into(),
            op,
            rhs: Some(rhs),
            span: None,
            source_text: None,
        }
    }

    pub fn exists(lhs: impl Into<String>) -> Self {
        Self {
            lhs: lhs.into(),
            op: Op::Exists,
            rhs: None,
            span: None,
            source_text: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Value {
    Literal { value: String },
    Ocid { value: String },
    Regex { value: String, pattern: String },
    List { values: Vec<Value> },
    Range { from: Box<Value>, to: Box<Value> },
}

impl Value {
    pub fn literal(value: impl Into<String>) -> Self {
        Value::Literal {
            value: value.into(),
        }
    }

    pub fn ocid(value: impl Into<String>) -> Self {
        Value::Ocid {
            value: value.into(),
        }
    }

    /// `value` keeps the slashes, `pattern` drops them.
    pub fn regex(delimited: &str) -> Self {
        let pattern = delimited
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .unwrap_or(delimited);
        Value::Regex {
            value: delimited.to_string(),
            pattern: pattern.to_string(),
        }
    }

    /// Classify an unquoted string by shape: `/x/` is a regex, an OCID-shaped
    /// string is an OCID, anything else is a literal.
    pub fn classify(raw: &str) -> Self {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            Value::regex(raw)
        } else if looks_like_ocid(raw) {
            Value::ocid(raw)
        } else {
            Value::literal(raw)
        }
    }
}
