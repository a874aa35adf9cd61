//! Shared source-extraction helpers for `show`, `view`, and `interface`
//! (spec.md §4.E.2, §4.E.3, §4.E.7): comment-block backscan, line-range
//! slicing, and locating the document symbol enclosing a position.

use std::path::Path;
use tower_lsp::lsp_types::{DocumentSymbol, Range};

/// Read `path` and split it into lines, preserving the file's own line
/// breaks implicitly (each element is one physical line, no trailing `\n`).
pub async fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(contents.lines().map(|l| l.to_string()).collect())
}

/// Scan backwards from `start_line` (0-based, the symbol's own line) to find
/// the first line of a contiguous preceding comment block: lines that,
/// scanned backwards, begin with `//`, `/*`, `*`, or `*/`, stopping at the
/// first non-comment non-empty line. Returns `start_line` unchanged if there
/// is no such block directly above it (skipping at most one blank line).
pub fn comment_block_start(lines: &[String], start_line: usize) -> usize {
    if start_line == 0 {
        return start_line;
    }
    let mut cursor = start_line;
    let mut block_start = start_line;

    // Allow a single blank line directly above the symbol before the
    // comment block itself begins.
    if cursor > 0 && lines[cursor - 1].trim().is_empty() {
        cursor -= 1;
    }

    while cursor > 0 {
        let line = lines[cursor - 1].trim_start();
        if is_comment_line(line) {
            cursor -= 1;
            block_start = cursor;
        } else {
            break;
        }
    }
    block_start
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("//") || line.starts_with("/*") || line.starts_with('*') || line.starts_with("*/")
}

/// Join `lines[start..=end]` (both 0-based, inclusive) back into source
/// text. Clamps `end` to the last available line.
pub fn slice(lines: &[String], start: usize, end: usize) -> String {
    let end = end.min(lines.len().saturating_sub(1));
    if start > end || lines.is_empty() {
        return String::new();
    }
    lines[start..=end].join("\n")
}

/// Find the innermost document symbol whose range contains `(line,
/// character)`, descending into children first.
pub fn find_enclosing_symbol(symbols: &[DocumentSymbol], line: u32, character: u32) -> Option<&DocumentSymbol> {
    for symbol in symbols {
        if range_contains(&symbol.range, line, character) {
            if let Some(child) = find_enclosing_symbol(symbol.children.as_deref().unwrap_or(&[]), line, character) {
                return Some(child);
            }
            return Some(symbol);
        }
    }
    None
}

fn range_contains(range: &Range, line: u32, character: u32) -> bool {
    let after_start = line > range.start.line || (line == range.start.line && character >= range.start.character);
    let before_end = line < range.end.line || (line == range.end.line && character <= range.end.character);
    after_start && before_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_comment_block_above_symbol() {
        let lines: Vec<String> = vec![
            "int unrelated;".to_string(),
            "// Does a thing.".to_string(),
            "// Returns early on failure.".to_string(),
            "void DoThing() {".to_string(),
        ];
        assert_eq!(comment_block_start(&lines, 3), 1);
    }

    #[test]
    fn stops_at_non_comment_line() {
        let lines: Vec<String> = vec![
            "int x = 1;".to_string(),
            "void DoThing() {".to_string(),
        ];
        assert_eq!(comment_block_start(&lines, 1), 1);
    }
}
