//! `usages` (spec.md §4.E.4): all references to a resolved symbol.

use crate::commands::resolve::{resolve_input, uri_to_path};
use crate::commands::Engine;
use anyhow::Result;
use std::fmt::Write as _;

pub async fn run(engine: &Engine, symbol: &str) -> Result<String> {
    let resolved = match resolve_input(engine, symbol).await {
        Ok(r) => r,
        Err(e) => return Ok(format!("{e}\n")),
    };

    let references = engine
        .clangd
        .references(&resolved.path, resolved.line, resolved.character, true)
        .await
        .unwrap_or_default();

    let mut output = String::new();
    if let Some(qualified) = resolved.qualified_name() {
        writeln!(output, "Selected symbol: {qualified}")?;
        let plural = if references.len() == 1 { "" } else { "s" };
        writeln!(output, "Found {} reference{plural}:", references.len())?;
    }

    if references.is_empty() {
        output.push_str("no references\n");
        return Ok(output);
    }

    for location in references {
        let path = uri_to_path(&location.uri).map_err(anyhow::Error::from)?;
        let relative = engine.relativize(&path);
        writeln!(
            output,
            "- {relative}:{}:{}",
            location.range.start.line + 1,
            location.range.start.character + 1
        )?;
    }

    Ok(output)
}
