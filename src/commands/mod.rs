//! Seven semantic commands built on top of the LSP client (spec.md §4.E).
//!
//! Grounded on `other_examples`'s symora `DaemonServer::dispatch`, which
//! routes a wire method name to a handler closure operating on a shared
//! `ProjectContext`; generalized here from "forward the raw LSP result" to
//! "compute the deterministic, formatted text §4.E specifies per command".

mod extract;
mod hierarchy;
mod interface;
mod resolve;
mod search;
mod show;
mod signature;
mod usages;
mod view;

pub use resolve::{ResolveError, ResolvedSymbol, resolve_input};

use crate::lsp_client::ClangdClient;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command needs to do its work: the shared `clangd` session
/// and the project root used to relativize paths in output.
#[derive(Clone)]
pub struct Engine {
    pub clangd: Arc<ClangdClient>,
    pub project_root: PathBuf,
}

impl Engine {
    pub fn new(clangd: Arc<ClangdClient>, project_root: PathBuf) -> Self {
        Self { clangd, project_root }
    }

    /// Render `path` relative to the project root for display, falling back
    /// to the absolute path if it is not under the root.
    pub fn relativize(&self, path: &std::path::Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

pub async fn run_search(engine: &Engine, query: &str, limit: Option<usize>) -> Result<String> {
    search::run(engine, query, limit).await
}

pub async fn run_show(engine: &Engine, symbol: &str) -> Result<String> {
    show::run(engine, symbol).await
}

pub async fn run_view(engine: &Engine, symbol: &str) -> Result<String> {
    view::run(engine, symbol).await
}

pub async fn run_usages(engine: &Engine, symbol: &str) -> Result<String> {
    usages::run(engine, symbol).await
}

pub async fn run_hierarchy(engine: &Engine, symbol: &str, limit: Option<usize>) -> Result<String> {
    hierarchy::run(engine, symbol, limit).await
}

pub async fn run_signature(engine: &Engine, symbol: &str) -> Result<String> {
    signature::run(engine, symbol).await
}

pub async fn run_interface(engine: &Engine, symbol: &str) -> Result<String> {
    interface::run(engine, symbol).await
}

/// Flatten a hover payload's `contents` (markup, a single marked string, or
/// an array of them) into one markdown blob for [`crate::hover_parser`].
pub fn hover_to_markdown(hover: tower_lsp::lsp_types::Hover) -> String {
    use tower_lsp::lsp_types::{HoverContents, MarkedString};
    fn marked_to_text(marked: MarkedString) -> String {
        match marked {
            MarkedString::String(s) => s,
            MarkedString::LanguageString(ls) => format!("```{}\n{}\n```", ls.language, ls.value),
        }
    }
    match hover.contents {
        HoverContents::Markup(markup) => markup.value,
        HoverContents::Scalar(marked) => marked_to_text(marked),
        HoverContents::Array(items) => items.into_iter().map(marked_to_text).collect::<Vec<_>>().join("\n\n"),
    }
}

/// Human form of an LSP `SymbolKind`, used by `search`'s output line and by
/// `interface`'s default-access fallback.
pub fn symbol_kind_name(kind: tower_lsp::lsp_types::SymbolKind) -> &'static str {
    use tower_lsp::lsp_types::SymbolKind;
    match kind {
        SymbolKind::FILE => "file",
        SymbolKind::MODULE => "module",
        SymbolKind::NAMESPACE => "namespace",
        SymbolKind::PACKAGE => "package",
        SymbolKind::CLASS => "class",
        SymbolKind::METHOD => "method",
        SymbolKind::PROPERTY => "property",
        SymbolKind::FIELD => "field",
        SymbolKind::CONSTRUCTOR => "constructor",
        SymbolKind::ENUM => "enum",
        SymbolKind::INTERFACE => "interface",
        SymbolKind::FUNCTION => "function",
        SymbolKind::VARIABLE => "variable",
        SymbolKind::CONSTANT => "constant",
        SymbolKind::STRING => "string",
        SymbolKind::NUMBER => "number",
        SymbolKind::BOOLEAN => "boolean",
        SymbolKind::ARRAY => "array",
        SymbolKind::OBJECT => "object",
        SymbolKind::KEY => "key",
        SymbolKind::NULL => "null",
        SymbolKind::ENUM_MEMBER => "enum member",
        SymbolKind::STRUCT => "struct",
        SymbolKind::EVENT => "event",
        SymbolKind::OPERATOR => "operator",
        SymbolKind::TYPE_PARAMETER => "type parameter",
        _ => "symbol",
    }
}

/// Wrap `text` to `width` columns, preserving existing paragraph breaks
/// (blank lines) and never splitting inside a word. Used by `signature` (80
/// columns) and `interface` (78 columns, two-space indented).
pub fn word_wrap(text: &str, width: usize, indent: &str) -> String {
    let mut out = String::new();
    for (i, paragraph) in text.split("\n\n").enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let mut line_len = 0usize;
        let mut first_on_line = true;
        for word in paragraph.split_whitespace() {
            let needed = if first_on_line { indent.len() + word.len() } else { line_len + 1 + word.len() };
            if !first_on_line && needed > width {
                out.push('\n');
                out.push_str(indent);
                out.push_str(word);
                line_len = indent.len() + word.len();
            } else {
                if first_on_line {
                    out.push_str(indent);
                    out.push_str(word);
                    line_len = indent.len() + word.len();
                } else {
                    out.push(' ');
                    out.push_str(word);
                    line_len += 1 + word.len();
                }
                first_on_line = false;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_wrap_respects_width_and_indent() {
        let text = "one two three four five six seven eight nine ten";
        let wrapped = word_wrap(text, 20, "  ");
        for line in wrapped.lines() {
            assert!(line.len() <= 20, "line too long: {line:?}");
        }
    }
}
