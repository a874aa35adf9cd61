//! `search` (spec.md §4.E.1): free-form symbol search.

use crate::commands::{Engine, symbol_kind_name};
use anyhow::Result;
use std::fmt::Write as _;

pub async fn run(engine: &Engine, query: &str, limit: Option<usize>) -> Result<String> {
    let mut output = String::new();

    if query.split_whitespace().count() > 1 {
        writeln!(output, "warning: search matches on a single term; \"{query}\" contains whitespace")?;
    }

    let mut results = engine.clangd.workspace_symbol(query).await?;
    if let Some(limit) = limit {
        results.truncate(limit);
    }

    for symbol in &results {
        let path = super::resolve::uri_to_path(&symbol.location.uri).map_err(anyhow::Error::from)?;
        let relative = engine.relativize(&path);
        let kind = symbol_kind_name(symbol.kind);
        let line = symbol.location.range.start.line + 1;
        let col = symbol.location.range.start.character + 1;
        let container = symbol.container_name.as_deref().unwrap_or("");
        if container.is_empty() {
            writeln!(output, "{kind} {relative}:{line}:{col} {}", symbol.name)?;
        } else {
            writeln!(output, "{kind} {relative}:{line}:{col} {container}::{}", symbol.name)?;
        }
    }

    if results.is_empty() {
        output.push_str("no results\n");
    }

    Ok(output)
}
