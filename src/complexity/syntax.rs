//! Grammar-independent tree-sitter helpers shared by the analyzers.

use std::collections::BTreeSet;

use tree_sitter::{Language as Grammar, Node, Parser, Tree};

use crate::error::{AuditError, Result};

pub(crate) fn parse(grammar: &Grammar, code: &str, label: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(grammar)
        .map_err(|e| AuditError::Parse {
            file: format!("<{} snippet>", label),
            message: format!("Failed to load {} grammar: {e}", label),
        })?;
    parser.parse(code, None).ok_or_else(|| AuditError::Parse {
        file: format!("<{} snippet>", label),
        message: format!("tree-sitter failed to parse {}", label),
    })
}

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Number of source rows holding at least one non-comment token of `node`.
pub(crate) fn code_lines(node: Node) -> usize {
    let mut rows = BTreeSet::new();
    collect_code_rows(node, &mut rows);
    rows.len()
}

fn collect_code_rows(node: Node, rows: &mut BTreeSet<usize>) {
    if node.kind().contains("comment") {
        return;
    }
    if node.child_count() == 0 {
        rows.extend(node.start_position().row..=node.end_position().row);
        return;
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_code_rows(child, rows);
        }
    }
}

/// Decision points below `node`, not descending into nested functions.
pub(crate) fn decision_points(
    node: Node,
    source: &[u8],
    is_decision: fn(Node, &[u8]) -> bool,
    is_function: fn(&str) -> bool,
) -> usize {
    let mut total = 0;
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if is_function(child.kind()) {
                continue;
            }
            if is_decision(child, source) {
                total += 1;
            }
            total += decision_points(child, source, is_decision, is_function);
        }
    }
    total
}

/// Name of the closest enclosing node whose kind is in `scope_kinds`.
pub(crate) fn enclosing_name<'a>(
    node: Node,
    source: &'a [u8],
    scope_kinds: &[&str],
) -> Option<&'a str> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if scope_kinds.contains(&parent.kind()) {
            if let Some(name) = parent.child_by_field_name("name") {
                return Some(node_text(name, source));
            }
        }
        current = parent.parent();
    }
    None
}
