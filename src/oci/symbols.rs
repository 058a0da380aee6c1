//! DEFINE aliases and their substitution
//!
//! A policy document can bind names to OCIDs with `define` statements and then
//! refer to the names elsewhere. [`build_symbols`] collects the bindings and
//! [`apply_define_subs`] rewrites references that resolve. References that do
//! not resolve are left alone; an unknown alias is never an error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::oci::ast::{
    Location, LocationKind, Statement, StatementKind, Subject, SubjectKind, SubjectValue,
    SymbolKind, TenancyRef, TenancyRefKind,
};

/// `(kind, name) -> ocid`. Later definitions of the same key win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: BTreeMap<(SymbolKind, String), String>,
}

/// `{kind: {name: ocid}}`, the nested form of a [`SymbolTable`].
pub type NestedSymbols = BTreeMap<&'static str, BTreeMap<String, String>>;

impl SymbolTable {
    pub fn insert(&mut self, kind: SymbolKind, name: impl Into<String>, ocid: impl Into<String>) {
        self.entries.insert((kind, name.into()), ocid.into());
    }

    pub fn get(&self, kind: SymbolKind, name: &str) -> Option<&str> {
        self.entries
            .get(&(kind, name.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolKind, &str, &str)> {
        self.entries
            .iter()
            .map(|((kind, name), ocid)| (*kind, name.as_str(), ocid.as_str()))
    }

    pub fn nested(&self) -> NestedSymbols {
        let mut out = NestedSymbols::new();
        for (kind, name, ocid) in self.iter() {
            out.entry(kind.as_str())
                .or_default()
                .insert(name.to_string(), ocid.to_string());
        }
        out
    }

    /// Resolve every name or nothing.
    fn resolve_all(&self, kind: SymbolKind, values: &[SubjectValue]) -> Option<Vec<String>> {
        values
            .iter()
            .map(|value| self.get(kind, &value.label).map(str::to_string))
            .collect()
    }
}

impl Serialize for SymbolTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nested().serialize(serializer)
    }
}

/// Collect bindings from `define` statements in document order.
pub fn build_symbols(statements: &[Statement]) -> SymbolTable {
    let mut table = SymbolTable::default();
    for statement in statements {
        if statement.kind != StatementKind::Define {
            continue;
        }
        let (Some(symbol), Some(definition)) = (&statement.symbol, &statement.definition) else {
            continue;
        };
        if symbol.name.is_empty() {
            continue;
        }
        table.insert(symbol.kind, symbol.name.clone(), definition.value.clone());
    }
    table
}

/// Replace resolvable aliases with their OCIDs.
///
/// - A `group` / `dynamic-group` subject becomes `group-id` / `dynamic-group-id`
///   only when every listed name resolves.
/// - An admit `source` or endorse `target` naming a single tenancy becomes
///   `tenancy_id`.
/// - A single-name `compartment_name` location becomes `compartment-id`.
///
/// `define` statements pass through untouched.
pub fn apply_define_subs(statements: Vec<Statement>, table: &SymbolTable) -> Vec<Statement> {
    statements
        .into_iter()
        .map(|statement| substitute(statement, table))
        .collect()
}

fn substitute(mut statement: Statement, table: &SymbolTable) -> Statement {
    if statement.kind == StatementKind::Define {
        return statement;
    }

    if let Some(subject) = statement.subject.as_mut() {
        substitute_subject(subject, table);
    }

    match statement.kind {
        StatementKind::Admit | StatementKind::DenyAdmit => {
            if let Some(source) = statement.source.as_mut() {
                substitute_tenancy(source, table);
            }
        }
        StatementKind::Endorse | StatementKind::DenyEndorse => {
            if let Some(target) = statement.target.as_mut() {
                substitute_tenancy(target, table);
            }
        }
        _ => {}
    }

    if let Some(location) = statement.location.as_mut() {
        substitute_location(location, table);
    }

    statement
}

fn substitute_subject(subject: &mut Subject, table: &SymbolTable) {
    let (symbol_kind, resolved_kind) = match subject.kind {
        SubjectKind::Group => (SymbolKind::Group, SubjectKind::GroupId),
        SubjectKind::DynamicGroup => (SymbolKind::DynamicGroup, SubjectKind::DynamicGroupId),
        _ => return,
    };
    if subject.values.is_empty() {
        return;
    }
    if let Some(ocids) = table.resolve_all(symbol_kind, &subject.values) {
        subject.kind = resolved_kind;
        subject.values = ocids.into_iter().map(SubjectValue::raw).collect();
    }
}

fn substitute_tenancy(reference: &mut TenancyRef, table: &SymbolTable) {
    if reference.kind != TenancyRefKind::Tenancy || reference.values.len() != 1 {
        return;
    }
    if let Some(ocid) = table.get(SymbolKind::Tenancy, &reference.values[0]) {
        *reference = TenancyRef::new(TenancyRefKind::TenancyId, vec![ocid.to_string()]);
    }
}

fn substitute_location(location: &mut Location, table: &SymbolTable) {
    if location.kind != LocationKind::CompartmentName || location.values.len() != 1 {
        return;
    }
    if let Some(ocid) = table.get(SymbolKind::Compartment, &location.values[0]) {
        *location = Location::new(LocationKind::CompartmentId, vec![ocid.to_string()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::ast::{Definition, DefinitionKind, Symbol};

    fn define(kind: SymbolKind, name: &str, ocid: &str) -> Statement {
        let mut statement = Statement::bare(StatementKind::Define);
        statement.symbol = Some(Symbol {
            kind,
            name: name.to_string(),
        });
        statement.definition = Some(Definition {
            kind: DefinitionKind::Ocid,
            value: ocid.to_string(),
        });
        statement
    }

    fn allow_groups(names: &[&str]) -> Statement {
        let mut statement = Statement::bare(StatementKind::Allow);
        statement.subject = Some(Subject::new(
            SubjectKind::Group,
            names.iter().map(|n| SubjectValue::raw(*n)).collect(),
        ));
        statement
    }

    #[test]
    fn later_definitions_win() {
        let table = build_symbols(&[
            define(SymbolKind::Group, "A", "ocid1.group.oc1..first"),
            define(SymbolKind::Group, "A", "ocid1.group.oc1..second"),
            define(SymbolKind::Tenancy, "T", "ocid1.tenancy.oc1..t"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(SymbolKind::Group, "A"), Some("ocid1.group.oc1..second"));
    }

    #[test]
    fn nested_form_groups_by_kind() {
        let table = build_symbols(&[
            define(SymbolKind::DynamicGroup, "dg", "ocid1.dynamicgroup.oc1..d"),
            define(SymbolKind::Compartment, "apps", "ocid1.compartment.oc1..c"),
        ]);
        let nested = serde_json::to_value(&table).unwrap();
        assert_eq!(nested["dynamic-group"]["dg"], "ocid1.dynamicgroup.oc1..d");
        assert_eq!(nested["compartment"]["apps"], "ocid1.compartment.oc1..c");
    }

    #[test]
    fn subject_substitution_is_all_or_nothing() {
        let table = build_symbols(&[define(SymbolKind::Group, "A", "ocid1.group.oc1..a")]);
        let out = apply_define_subs(vec![allow_groups(&["A", "B"]), allow_groups(&["A"])], &table);
        let partial = out[0].subject.as_ref().unwrap();
        assert_eq!(partial.kind, SubjectKind::Group);
        assert_eq!(partial.values[1].label, "B");

        let full = out[1].subject.as_ref().unwrap();
        assert_eq!(full.kind, SubjectKind::GroupId);
        assert_eq!(full.values, vec![SubjectValue::raw("ocid1.group.oc1..a")]);
    }

    #[test]
    fn tenancy_references_follow_statement_kind() {
        let table = build_symbols(&[define(SymbolKind::Tenancy, "Src", "ocid1.tenancy.oc1..s")]);

        let mut admit = Statement::bare(StatementKind::DenyAdmit);
        admit.source = Some(TenancyRef::new(TenancyRefKind::Tenancy, vec!["Src".into()]));
        let mut endorse = Statement::bare(StatementKind::Endorse);
        endorse.target = Some(TenancyRef::new(TenancyRefKind::Tenancy, vec!["Src".into()]));
        // `source` on a non-admit statement is not an alias position
        let mut allow = Statement::bare(StatementKind::Allow);
        allow.source = Some(TenancyRef::new(TenancyRefKind::Tenancy, vec!["Src".into()]));

        let out = apply_define_subs(vec![admit, endorse, allow], &table);
        let expected = TenancyRef::new(TenancyRefKind::TenancyId, vec!["ocid1.tenancy.oc1..s".into()]);
        assert_eq!(out[0].source, Some(expected.clone()));
        assert_eq!(out[1].target, Some(expected));
        assert_eq!(out[2].source.as_ref().unwrap().kind, TenancyRefKind::Tenancy);
    }

    #[test]
    fn only_single_name_compartments_resolve() {
        let table = build_symbols(&[define(SymbolKind::Compartment, "apps", "ocid1.compartment.oc1..c")]);
        let mut single = Statement::bare(StatementKind::Allow);
        single.location = Some(Location::new(LocationKind::CompartmentName, vec!["apps".into()]));
        let mut path = Statement::bare(StatementKind::Allow);
        path.location = Some(Location::new(
            LocationKind::CompartmentPath,
            vec!["apps".into(), "web".into()],
        ));

        let out = apply_define_subs(vec![single, path], &table);
        assert_eq!(
            out[0].location,
            Some(Location::new(
                LocationKind::CompartmentId,
                vec!["ocid1.compartment.oc1..c".into()]
            ))
        );
        assert_eq!(out[1].location.as_ref().unwrap().kind, LocationKind::CompartmentPath);
    }
}
