//! Group tree utilities shared by policy conditions and matching rules.

use crate::oci::ast::{Expr, Group};

/// Flatten same-mode child groups, bottom-up.
///
/// With `collapse_single`, a group whose only child is a group is replaced by
/// that child, which inherits the parent's span and source text when the parent
/// has them. Applying this twice gives the same tree as applying it once.
pub fn simplify(expr: Expr, collapse_single: bool) -> Expr {
    let Expr::Group(group) = expr else {
        return expr;
    };

    let Group {
        mode,
        items,
        span,
        source_text,
    } = group;

    let items: Vec<Expr> = items
        .into_iter()
        .map(|item| simplify(item, collapse_single))
        .collect();

    let mut parent = Group {
        mode,
        items,
        span,
        source_text,
    };

    if collapse_single {
        parent = match collapse(parent) {
            Ok(child) => return Expr::Group(child),
            Err(parent) => parent,
        };
    }

    let mut flattened = Vec::with_capacity(parent.items.len());
    for item in std::mem::take(&mut parent.items) {
        match item {
            Expr::Group(child) if child.mode == parent.mode => flattened.extend(child.items),
            other => flattened.push(other),
        }
    }
    parent.items = flattened;

    if collapse_single {
        parent = match collapse(parent) {
            Ok(child) => return Expr::Group(child),
            Err(parent) => parent,
        };
    }

    Expr::Group(parent)
}

/// `Ok(child)` when `parent` wraps exactly one group, otherwise `Err(parent)`.
fn collapse(mut parent: Group) -> Result<Group, Group> {
    if parent.items.len() != 1 || !matches!(parent.items[0], Expr::Group(_)) {
        return Err(parent);
    }
    let Some(Expr::Group(mut child)) = parent.items.pop() else {
        return Err(parent);
    };
    if parent.span.is_some() {
        child.span = parent.span;
    }
    if parent.source_text.is_some() {
        child.source_text = parent.source_text;
    }
    Ok(child)
}

/// Nesting depth: 1 for a group without child groups, 0 for a clause.
pub fn level(expr: &Expr) -> usize {
    match expr {
        Expr::Group(group) => {
            1 + group
                .items
                .iter()
                .filter(|item| matches!(item, Expr::Group(_)))
                .map(level)
                .max()
                .unwrap_or(0)
        }
        Expr::Clause(_) => 0,
    }
}
