//! `hierarchy` (spec.md §4.E.5, reconciled with §8 scenario 4 — see
//! DESIGN.md): immediate parents ("Inherits from:", one level) and derived
//! classes (recursive, depth-bounded, cycle-detected), rendered as a tree.

use crate::commands::resolve::{resolve_input, uri_to_path};
use crate::commands::Engine;
use anyhow::Result;
use std::collections::HashSet;
use std::fmt::Write as _;
use tower_lsp::lsp_types::TypeHierarchyItem;

const DEFAULT_MAX_DEPTH: usize = 20;

pub async fn run(engine: &Engine, symbol: &str, limit: Option<usize>) -> Result<String> {
    let resolved = match resolve_input(engine, symbol).await {
        Ok(r) => r,
        Err(e) => return Ok(format!("{e}\n")),
    };

    let candidates = engine
        .clangd
        .prepare_type_hierarchy(&resolved.path, resolved.line, resolved.character)
        .await
        .unwrap_or_default();

    let Some(item) = candidates.into_iter().next() else {
        return Ok("not found\n".to_string());
    };

    let supertypes = engine.clangd.supertypes(&item).await.unwrap_or_default();
    let mut output = String::new();
    output.push_str("Inherits from:\n");
    if supertypes.is_empty() {
        output.push_str("  (none)\n");
    } else {
        for (i, parent) in supertypes.iter().enumerate() {
            let is_last = i == supertypes.len() - 1;
            let glyph = if is_last { "└── " } else { "├── " };
            writeln!(output, "  {glyph}{}{}", parent.name, location_suffix(parent))?;
        }
    }

    writeln!(output, "\n{}\n", item.name)?;
    output.push_str("Derived classes:\n");
    let max_depth = limit.map(|l| l.min(DEFAULT_MAX_DEPTH)).unwrap_or(DEFAULT_MAX_DEPTH);
    let mut seen = HashSet::new();
    seen.insert(item_key(&item));
    let subtypes = engine.clangd.subtypes(&item).await.unwrap_or_default();
    if subtypes.is_empty() {
        output.push_str("  (none)\n");
    } else {
        render_subtree(engine, &subtypes, "  ", max_depth, 1, &mut seen, &mut output).await?;
    }

    Ok(output)
}

fn item_key(item: &TypeHierarchyItem) -> (String, String) {
    (item.uri.to_string(), item.name.clone())
}

fn location_suffix(item: &TypeHierarchyItem) -> String {
    match uri_to_path(&item.uri) {
        Ok(path) => format!(" - {}:{}", path.display(), item.range.start.line + 1),
        Err(_) => String::new(),
    }
}

/// Recursive tree render. `prefix` is the accumulated indentation glyphs
/// (`│   ` or `    ` per ancestor), matching spec.md §4.E.5's glyph set.
fn render_subtree<'a>(
    engine: &'a Engine,
    children: &'a [TypeHierarchyItem],
    prefix: &'a str,
    max_depth: usize,
    depth: usize,
    seen: &'a mut HashSet<(String, String)>,
    output: &'a mut String,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
    Box::pin(async move {
        for (i, child) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            let glyph = if is_last { "└── " } else { "├── " };
            writeln!(output, "{prefix}{glyph}{}{}", child.name, location_suffix(child))?;

            let key = item_key(child);
            if depth >= max_depth || seen.contains(&key) {
                continue;
            }
            seen.insert(key);

            let grandchildren = engine.clangd.subtypes(child).await.unwrap_or_default();
            if !grandchildren.is_empty() {
                let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
                render_subtree(engine, &grandchildren, &child_prefix, max_depth, depth + 1, seen, output).await?;
            }
        }
        Ok(())
    })
}
