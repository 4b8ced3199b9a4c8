use tree_sitter::Node;

use super::syntax::{self, node_text};
use super::{FunctionAnalyzer, FunctionSpan};
use crate::error::Result;
use crate::language::Language;

pub struct JavaAnalyzer;

const FUNCTION_KINDS: &[&str] = &["method_declaration", "constructor_declaration"];

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

impl FunctionAnalyzer for JavaAnalyzer {
    fn language(&self) -> Language {
        Language::Java
    }

    fn functions(&self, code: &str) -> Result<Vec<FunctionSpan>> {
        let tree = syntax::parse(&tree_sitter_java::LANGUAGE.into(), code, "Java")?;
        let mut spans = Vec::new();
        collect_functions(tree.root_node(), code.as_bytes(), &mut spans);
        Ok(spans)
    }
}

fn collect_functions(node: Node, source: &[u8], spans: &mut Vec<FunctionSpan>) {
    if is_function(node.kind()) {
        spans.push(function_span(node, source));
    }
    for i in 0..node.named_child_count() {
        if let Some(child) = node.named_child(i) {
            collect_functions(child, source, spans);
        }
    }
}

fn function_span(node: Node, source: &[u8]) -> FunctionSpan {
    let method = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or("");
    let name = match syntax::enclosing_name(node, source, TYPE_KINDS) {
        Some(owner) => format!("{}::{}", owner, method),
        None => method.to_string(),
    };
    FunctionSpan {
        name,
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        nloc: syntax::code_lines(node),
        ccn: 1 + syntax::decision_points(node, source, is_decision, is_function),
    }
}

fn is_function(kind: &str) -> bool {
    FUNCTION_KINDS.contains(&kind)
}

fn is_decision(node: Node, source: &[u8]) -> bool {
    match node.kind() {
        "if_statement" | "for_statement" | "enhanced_for_statement" | "while_statement"
        | "do_statement" | "catch_clause" | "ternary_expression" | "&&" | "||" => true,
        // `default:` is not a branch of its own
        "switch_label" => node_text(node, source).trim_start().starts_with("case"),
        _ => false,
    }
}
