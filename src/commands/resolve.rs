//! Input resolution: `name` or `path:line:column` → a concrete position
//! (spec.md §4.E "Input resolution").

use crate::commands::Engine;
use std::path::PathBuf;
use thiserror::Error;
use tower_lsp::lsp_types::SymbolInformation;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("symbol '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A resolved `(file, position)` plus whatever name information is
/// available. `name`/`container_name` are populated when resolution went
/// through a workspace-symbol lookup; a direct `path:line:col` resolution
/// leaves them `None` since clangd hasn't told us what's there yet.
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    pub path: PathBuf,
    /// 0-based, wire convention.
    pub line: u32,
    /// 0-based, wire convention.
    pub character: u32,
    pub name: Option<String>,
    pub container_name: Option<String>,
}

impl ResolvedSymbol {
    pub fn qualified_name(&self) -> Option<String> {
        match (&self.container_name, &self.name) {
            (Some(container), Some(name)) if !container.is_empty() => {
                Some(format!("{container}::{name}"))
            }
            (_, Some(name)) => Some(name.clone()),
            _ => None,
        }
    }
}

/// Resolve `input` per spec.md §4.E: either a `path:line:column` location or
/// a name to look up via `workspace/symbol`. Opens the resolved document so
/// callers can immediately issue position-based queries.
pub async fn resolve_input(engine: &Engine, input: &str) -> Result<ResolvedSymbol, ResolveError> {
    if let Some((path, line, column)) = parse_location(input) {
        let absolute = if path.is_absolute() {
            path
        } else {
            engine.project_root.join(path)
        };
        engine.clangd.open_document(&absolute).await?;
        return Ok(ResolvedSymbol {
            path: absolute,
            line: line.saturating_sub(1),
            character: column.saturating_sub(1),
            name: None,
            container_name: None,
        });
    }

    if input.split_whitespace().count() > 1 {
        log::warn!("search input '{input}' contains whitespace; clangd fuzzy matching is single-term");
    }

    let results = engine.clangd.workspace_symbol(input).await?;
    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::NotFound(input.to_string()))?;
    resolved_from_symbol_information(engine, first).await
}

async fn resolved_from_symbol_information(
    engine: &Engine,
    symbol: SymbolInformation,
) -> Result<ResolvedSymbol, ResolveError> {
    let path = uri_to_path(&symbol.location.uri)?;
    engine.clangd.open_document(&path).await?;
    Ok(ResolvedSymbol {
        path,
        line: symbol.location.range.start.line,
        character: symbol.location.range.start.character,
        name: Some(symbol.name),
        container_name: symbol.container_name,
    })
}

pub fn uri_to_path(uri: &tower_lsp::lsp_types::Url) -> Result<PathBuf, ResolveError> {
    uri.to_file_path()
        .map_err(|_| anyhow::anyhow!("non-file URI: {uri}").into())
}

/// Parse the `path:line:column` grammar. The path may itself contain `:`
/// (Windows drive letters); disambiguate by taking the last two
/// colon-separated segments as line/column only if both parse as digits.
fn parse_location(input: &str) -> Option<(PathBuf, u32, u32)> {
    let mut parts: Vec<&str> = input.split(':').collect();
    if parts.len() < 3 {
        return None;
    }
    let column_str = parts.pop()?;
    let line_str = parts.pop()?;
    let column: u32 = column_str.parse().ok()?;
    let line: u32 = line_str.parse().ok()?;
    let path_str = parts.join(":");
    if path_str.is_empty() {
        return None;
    }
    Some((PathBuf::from(path_str), line, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_location() {
        let (path, line, col) = parse_location("src/foo.cpp:42:7").unwrap();
        assert_eq!(path, PathBuf::from("src/foo.cpp"));
        assert_eq!(line, 42);
        assert_eq!(col, 7);
    }

    #[test]
    fn rejects_plain_names() {
        assert!(parse_location("GameObject::Update").is_none());
    }

    #[test]
    fn takes_last_two_numeric_segments_on_drive_paths() {
        let (path, line, col) = parse_location("C:/proj/src/foo.cpp:10:3").unwrap();
        assert_eq!(path, PathBuf::from("C:/proj/src/foo.cpp"));
        assert_eq!(line, 10);
        assert_eq!(col, 3);
    }
}
