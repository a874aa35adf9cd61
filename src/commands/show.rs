//! `show` (spec.md §4.E.2): declaration + definition (or declaration +
//! surrounding comments) for a resolved symbol.

use crate::commands::extract::{comment_block_start, find_enclosing_symbol, read_lines, slice};
use crate::commands::resolve::{resolve_input, uri_to_path};
use crate::commands::Engine;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::{DocumentSymbol, FoldingRange, SymbolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Declaration,
    Definition,
}

struct Chunk {
    path: PathBuf,
    line: u32,
    character: u32,
    classification: Classification,
    text: String,
}

pub async fn run(engine: &Engine, symbol: &str) -> Result<String> {
    let resolved = match resolve_input(engine, symbol).await {
        Ok(r) => r,
        Err(e) => return Ok(format!("{e}\n")),
    };

    let is_definition_file = is_source_extension(&resolved.path);
    let next_lines = peek_lines(&resolved.path, resolved.line, 5).await?;
    let body_follows = next_lines.iter().any(|l| l.contains('{'));
    let started_at_definition = is_definition_file || body_follows;

    let definitions = engine
        .clangd
        .definition(&resolved.path, resolved.line, resolved.character)
        .await
        .unwrap_or_default();

    let mut locations: Vec<(PathBuf, u32, u32)> = vec![(resolved.path.clone(), resolved.line, resolved.character)];
    for location in definitions {
        let path = uri_to_path(&location.uri)?;
        let entry = (path, location.range.start.line, location.range.start.character);
        if !locations.iter().any(|existing| existing == &entry) {
            locations.push(entry);
        }
    }

    let mut chunks = Vec::new();
    for (path, line, character) in locations {
        let is_def = if (path == resolved.path && line == resolved.line) && started_at_definition {
            true
        } else if (path == resolved.path && line == resolved.line) && !started_at_definition {
            false
        } else {
            // Re-apply the body-follows check to classify the other location.
            let other_is_source = is_source_extension(&path);
            let other_next = peek_lines(&path, line, 5).await.unwrap_or_default();
            other_is_source || other_next.iter().any(|l| l.contains('{'))
        };

        let text = extract_chunk(engine, &path, line, character, is_def).await?;
        chunks.push(Chunk {
            path,
            line,
            character,
            classification: if is_def { Classification::Definition } else { Classification::Declaration },
            text,
        });
    }

    chunks.sort_by_key(|c| match c.classification {
        Classification::Declaration => 0,
        Classification::Definition => 1,
    });

    let mut output = String::new();
    for chunk in &chunks {
        let relative = engine.relativize(&chunk.path);
        let kind = match chunk.classification {
            Classification::Declaration => "declaration",
            Classification::Definition => "definition",
        };
        writeln!(
            output,
            "From {relative}:{}:{} ({kind})",
            chunk.line + 1,
            chunk.character + 1
        )?;
        writeln!(output, "```cpp")?;
        output.push_str(&chunk.text);
        output.push('\n');
        writeln!(output, "```")?;
        output.push('\n');
    }

    if output.is_empty() {
        output.push_str("not found\n");
    }

    Ok(output)
}

fn is_source_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cc") | Some("cpp") | Some("cxx") | Some("c++")
    )
}

async fn peek_lines(path: &Path, from_line: u32, count: usize) -> Result<Vec<String>> {
    let lines = read_lines(path).await?;
    let start = from_line as usize;
    let end = (start + count).min(lines.len());
    Ok(lines.get(start..end).unwrap_or_default().to_vec())
}

async fn extract_chunk(engine: &Engine, path: &Path, line: u32, character: u32, is_definition: bool) -> Result<String> {
    let lines = read_lines(path).await?;
    let symbol_idx = line as usize;
    let start = comment_block_start(&lines, symbol_idx);

    let document_symbols = engine.clangd.document_symbols(path).await.unwrap_or_default();
    let matching = find_enclosing_symbol(&document_symbols, line, character);
    let is_function_like = matching
        .map(|s| matches!(s.kind, SymbolKind::FUNCTION | SymbolKind::METHOD | SymbolKind::CONSTRUCTOR))
        .unwrap_or(false);
    let is_type_like = matching
        .map(|s| matches!(s.kind, SymbolKind::CLASS | SymbolKind::STRUCT | SymbolKind::ENUM))
        .unwrap_or(false);

    let end = if is_function_like && is_definition {
        let folding = engine.clangd.folding_ranges(path).await.unwrap_or_default();
        largest_folding_range_near(&folding, symbol_idx)
            .map(|r| r.end + 1)
            .unwrap_or_else(|| matching.map(|s| s.range.end.line as usize).unwrap_or(symbol_idx))
    } else if is_function_like {
        matching.map(|s| s.range.end.line as usize).unwrap_or(symbol_idx)
    } else if is_type_like {
        let folding = engine.clangd.folding_ranges(path).await.unwrap_or_default();
        folding
            .iter()
            .find(|r| (r.start_line as usize).abs_diff(symbol_idx) <= 2)
            .map(|r| r.end_line as usize)
            .unwrap_or_else(|| matching.map(|s| s.range.end.line as usize).unwrap_or(symbol_idx))
    } else {
        matching.map(|s| s.range.end.line as usize).unwrap_or(symbol_idx)
    };

    Ok(slice(&lines, start, end))
}

/// The largest folding range whose start is within one line of `symbol_idx`
/// (spec.md §4.E.2 step 4).
fn largest_folding_range_near(ranges: &[FoldingRange], symbol_idx: usize) -> Option<Range> {
    ranges
        .iter()
        .filter(|r| (r.start_line as usize).abs_diff(symbol_idx) <= 1)
        .map(|r| Range { start: r.start_line as usize, end: r.end_line as usize })
        .max_by_key(|r| r.end.saturating_sub(r.start))
}

struct Range {
    start: usize,
    end: usize,
}
