//! Statement selection and projection.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::oci::ast::Statement;

/// Which statements to return, and which of their fields.
///
/// Kind names compare lowercase. `kind` is always kept when projecting
/// fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReturnFilter {
    pub kinds: Option<BTreeSet<String>>,
    pub fields: Option<BTreeSet<String>>,
    pub first_only: bool,
}

impl ReturnFilter {
    /// Keep only statements of one kind.
    pub fn kind(kind: &str) -> Self {
        Self::kinds([kind])
    }

    pub fn kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kinds: Some(
                kinds
                    .into_iter()
                    .map(|k| k.as_ref().to_ascii_lowercase())
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn first_only(mut self) -> Self {
        self.first_only = true;
        self
    }

    pub fn apply(&self, statements: Vec<Statement>) -> Vec<Statement> {
        let mut out: Vec<Statement> = match &self.kinds {
            Some(kinds) => {
                let kinds: BTreeSet<String> =
                    kinds.iter().map(|k| k.to_ascii_lowercase()).collect();
                statements
                    .into_iter()
                    .filter(|s| kinds.contains(s.kind.as_str()))
                    .collect()
            }
            None => statements,
        };

        if let Some(fields) = &self.fields {
            for statement in &mut out {
                statement.retain_fields(|name| fields.contains(name));
            }
        }

        if self.first_only {
            out.truncate(1);
        }
        out
    }
}
