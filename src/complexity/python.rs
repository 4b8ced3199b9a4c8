use tree_sitter::Node;

use super::syntax::{self, node_text};
use super::{FunctionAnalyzer, FunctionSpan};
use crate::error::Result;
use crate::language::Language;

pub struct PythonAnalyzer;

impl FunctionAnalyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn functions(&self, code: &str) -> Result<Vec<FunctionSpan>> {
        let tree = syntax::parse(&tree_sitter_python::LANGUAGE.into(), code, "Python")?;
        let mut spans = Vec::new();
        collect_functions(tree.root_node(), code.as_bytes(), &mut spans);
        Ok(spans)
    }
}

fn collect_functions(node: Node, source: &[u8], spans: &mut Vec<FunctionSpan>) {
    if is_function(node.kind()) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or("");
        let name = match syntax::enclosing_name(node, source, &["class_definition"]) {
            Some(class) => format!("{}.{}", class, name),
            None => name.to_string(),
        };
        spans.push(FunctionSpan {
            name,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            nloc: syntax::code_lines(node),
            ccn: 1 + syntax::decision_points(node, source, is_decision, is_function),
        });
    }
    for i in 0..node.named_child_count() {
        if let Some(child) = node.named_child(i) {
            collect_functions(child, source, spans);
        }
    }
}

fn is_function(kind: &str) -> bool {
    kind == "function_definition"
}

fn is_decision(node: Node, _source: &[u8]) -> bool {
    matches!(
        node.kind(),
        "if_statement"
            | "elif_clause"
            | "for_statement"
            | "while_statement"
            | "except_clause"
            | "conditional_expression"
            | "boolean_operator"
            | "for_in_clause"
            | "if_clause"
            | "case_clause"
    )
}
