//! `interface` (spec.md §4.E.7): the public members of a resolved class or
//! struct.
//!
//! No direct teacher equivalent (the teacher forwards raw LSP traffic; it
//! never synthesizes an access-filtered view); grounded on the document
//! symbol walk `show` and `view` already build on via
//! [`crate::commands::extract::find_enclosing_symbol`], generalized from
//! "find the node containing a position" to "find the class node, then
//! classify each child by hovering it".

use crate::commands::resolve::resolve_input;
use crate::commands::{Engine, hover_to_markdown, word_wrap};
use crate::hover_parser::parse_hover_markdown;
use crate::types::AccessLevel;
use anyhow::Result;
use std::fmt::Write as _;
use tower_lsp::lsp_types::{DocumentSymbol, SymbolKind};

const WRAP_WIDTH: usize = 78;

pub async fn run(engine: &Engine, symbol: &str) -> Result<String> {
    let resolved = match resolve_input(engine, symbol).await {
        Ok(r) => r,
        Err(e) => return Ok(format!("{e}\n")),
    };

    let document_symbols = engine.clangd.document_symbols(&resolved.path).await.unwrap_or_default();
    let Some(class_node) = find_class_node(&document_symbols, resolved.name.as_deref(), resolved.line) else {
        return Ok("not found\n".to_string());
    };

    let default_access = match class_node.kind {
        SymbolKind::STRUCT => AccessLevel::Public,
        _ => AccessLevel::Private,
    };

    let mut output = String::new();
    for child in class_node.children.as_deref().unwrap_or(&[]) {
        // Only the class's own members, not nested types' members.
        if matches!(child.kind, SymbolKind::CLASS | SymbolKind::STRUCT | SymbolKind::ENUM) {
            continue;
        }

        let hover = engine
            .clangd
            .hover(&resolved.path, child.selection_range.start.line, child.selection_range.start.character)
            .await
            .ok()
            .flatten();
        let Some(hover) = hover else { continue };

        let doc = parse_hover_markdown(&hover_to_markdown(hover));
        let access = doc.access_level.unwrap_or(default_access);
        if access != AccessLevel::Public {
            continue;
        }

        if !output.is_empty() {
            output.push('\n');
        }
        if let Some(template_params) = &doc.template_params {
            writeln!(output, "{template_params}")?;
        }
        let signature = doc.signature.clone().unwrap_or_else(|| child.name.clone());
        writeln!(output, "{signature}")?;
        if let Some(description) = &doc.description {
            output.push('\n');
            output.push_str(&word_wrap(description, WRAP_WIDTH, "  "));
            output.push('\n');
        }
    }

    if output.is_empty() {
        output.push_str("(no public members)\n");
    }

    Ok(output)
}

/// Find the class/struct document-symbol node matching `name` if given,
/// else the one closest by line distance to `line` — spec.md §4.E.7's
/// "robust match: name equals input, closest by line distance to the
/// resolved position".
fn find_class_node<'a>(symbols: &'a [DocumentSymbol], name: Option<&str>, line: u32) -> Option<&'a DocumentSymbol> {
    let mut candidates = Vec::new();
    collect_class_nodes(symbols, &mut candidates);

    if let Some(name) = name {
        if let Some(exact) = candidates.iter().find(|s| s.name == name) {
            return Some(exact);
        }
    }

    candidates.into_iter().min_by_key(|s| s.range.start.line.abs_diff(line))
}

fn collect_class_nodes<'a>(symbols: &'a [DocumentSymbol], out: &mut Vec<&'a DocumentSymbol>) {
    for symbol in symbols {
        if matches!(symbol.kind, SymbolKind::CLASS | SymbolKind::STRUCT) {
            out.push(symbol);
        }
        collect_class_nodes(symbol.children.as_deref().unwrap_or(&[]), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Position, Range};

    #[allow(deprecated)]
    fn sym(name: &str, kind: SymbolKind, start_line: u32, children: Vec<DocumentSymbol>) -> DocumentSymbol {
        DocumentSymbol {
            name: name.to_string(),
            detail: None,
            kind,
            tags: None,
            deprecated: None,
            range: Range::new(Position::new(start_line, 0), Position::new(start_line + 1, 0)),
            selection_range: Range::new(Position::new(start_line, 0), Position::new(start_line, 1)),
            children: if children.is_empty() { None } else { Some(children) },
        }
    }

    #[test]
    fn finds_class_by_exact_name() {
        let symbols = vec![
            sym("GameObject", SymbolKind::CLASS, 10, vec![]),
            sym("Engine", SymbolKind::CLASS, 50, vec![]),
        ];
        let found = find_class_node(&symbols, Some("Engine"), 0).unwrap();
        assert_eq!(found.name, "Engine");
    }

    #[test]
    fn falls_back_to_closest_by_line() {
        let symbols = vec![
            sym("GameObject", SymbolKind::CLASS, 10, vec![]),
            sym("Engine", SymbolKind::CLASS, 50, vec![]),
        ];
        let found = find_class_node(&symbols, None, 51).unwrap();
        assert_eq!(found.name, "Engine");
    }

    #[test]
    fn ignores_members_of_nested_classes() {
        let nested = sym("Inner", SymbolKind::CLASS, 12, vec![sym("field", SymbolKind::FIELD, 13, vec![])]);
        let outer = sym("Outer", SymbolKind::CLASS, 10, vec![nested]);
        let symbols = vec![outer];
        let found = find_class_node(&symbols, Some("Outer"), 0).unwrap();
        // "Outer"'s direct children include only the nested class itself;
        // interface::run skips it rather than descending into its members.
        assert_eq!(found.children.as_ref().unwrap().len(), 1);
        assert_eq!(found.children.as_ref().unwrap()[0].name, "Inner");
    }
}
