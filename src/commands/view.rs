//! `view` (spec.md §4.E.3): the complete body of a single resolved symbol.

use crate::commands::extract::{comment_block_start, read_lines, slice};
use crate::commands::resolve::resolve_input;
use crate::commands::Engine;
use anyhow::Result;
use tower_lsp::lsp_types::FoldingRange;

pub async fn run(engine: &Engine, symbol: &str) -> Result<String> {
    let resolved = match resolve_input(engine, symbol).await {
        Ok(r) => r,
        Err(e) => return Ok(format!("{e}\n")),
    };

    let folding_ranges = engine.clangd.folding_ranges(&resolved.path).await.unwrap_or_default();
    let symbol_idx = resolved.line as usize;

    let Some(chosen) = select_range(&folding_ranges, symbol_idx) else {
        return Ok("not found\n".to_string());
    };

    let lines = read_lines(&resolved.path).await?;

    let is_nested = folding_ranges
        .iter()
        .any(|r| (r.start_line as usize) < chosen.start && (r.end_line as usize) > chosen.end);
    let start = if is_nested {
        chosen.start
    } else {
        comment_block_start(&lines, chosen.start)
    };

    let relative = engine.relativize(&resolved.path);
    let mut output = format!("{relative}:{}:{}\n", resolved.line + 1, resolved.character + 1);
    output.push_str(&slice(&lines, start, chosen.end));
    output.push('\n');
    Ok(output)
}

struct SelectedRange {
    start: usize,
    end: usize,
}

/// Select the folding range containing `symbol_idx`. Functions with 3+
/// parameters get two adjacent folding ranges (parameter list, then body);
/// if the range starting at `symbol_idx` ends at line L and another range
/// starts at L or L+1, prefer the second (spec.md §4.E.3).
fn select_range(ranges: &[FoldingRange], symbol_idx: usize) -> Option<SelectedRange> {
    let containing = ranges
        .iter()
        .filter(|r| (r.start_line as usize) <= symbol_idx && (r.end_line as usize) >= symbol_idx)
        .min_by_key(|r| r.end_line - r.start_line)?;

    let starting_here = ranges
        .iter()
        .find(|r| r.start_line as usize == symbol_idx);

    let base = starting_here.unwrap_or(containing);
    let l = base.end_line as usize;

    let body_range = ranges.iter().find(|r| {
        let start = r.start_line as usize;
        start == l || start == l + 1
    });

    if let Some(body) = body_range {
        Some(SelectedRange { start: base.start_line as usize, end: body.end_line as usize })
    } else {
        Some(SelectedRange { start: base.start_line as usize, end: base.end_line as usize })
    }
}
