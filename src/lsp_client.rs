//! clangd process lifecycle and the typed LSP operation surface used by the
//! command engine (spec.md §4.B).
//!
//! Grounded on the teacher's `ClangdClient::spawn` (process setup) and
//! `ClangdSession`'s per-operation request builders in `clangd.rs`, extended
//! with the background-indexing readiness gate and the close/reopen reindex
//! workaround spec.md §4.B calls for, neither of which the teacher needed
//! since it proxies an already-running editor session instead of owning
//! clangd's startup.

use crate::transport::Transport;
use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tower_lsp::lsp_types::*;

/// Per-request timeout for ordinary clangd queries (spec.md §4.B).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// If no indexing-progress-end notification arrives within this window,
/// assume clangd is done (or never reports progress for a small project) and
/// stop blocking queries on it.
const INDEXING_FALLBACK: Duration = Duration::from_secs(5);

/// One filesystem change to report via `workspace/didChangeWatchedFiles`
/// (spec.md §4.B).
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

/// LSP's three watched-file change kinds (`FileChangeType` in the LSP spec:
/// Created=1, Changed=2, Deleted=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Changed,
    Deleted,
}

impl FileChangeKind {
    fn as_lsp_type(self) -> u8 {
        match self {
            FileChangeKind::Created => 1,
            FileChangeKind::Changed => 2,
            FileChangeKind::Deleted => 3,
        }
    }
}

/// An owned `clangd` subprocess plus the transport wrapping its stdio.
pub struct ClangdClient {
    child: tokio::sync::Mutex<Child>,
    transport: Transport,
    indexing_done: Arc<Notify>,
    indexing_signaled: Arc<AtomicBool>,
    opened_files: std::sync::Mutex<std::collections::HashSet<PathBuf>>,
}

impl ClangdClient {
    /// Spawn `clangd`, perform the `initialize`/`initialized` handshake, and
    /// arm the indexing-readiness gate before returning. Callers can issue
    /// queries immediately; `wait_for_indexing` is invoked internally by
    /// every read-only query per spec.md §4.B so the first query after
    /// startup blocks until indexing settles (or the fallback timer fires).
    pub async fn start(project_root: &Path, compile_commands_dir: &Path) -> Result<Self> {
        let clangd_path = locate_clangd()?;

        let mut child = Command::new(&clangd_path)
            .arg("--background-index")
            .arg(format!(
                "--compile-commands-dir={}",
                compile_commands_dir.display()
            ))
            .arg("--log=verbose")
            .arg("--header-insertion=never")
            .arg("--pch-storage=memory")
            .current_dir(project_root)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", clangd_path.display()))?;

        let stdin = child.stdin.take().context("clangd stdin not piped")?;
        let stdout = child.stdout.take().context("clangd stdout not piped")?;
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_forwarder(stderr);
        }

        let transport = Transport::new(stdin, stdout);

        let indexing_done = Arc::new(Notify::new());
        let indexing_signaled = Arc::new(AtomicBool::new(false));

        register_progress_handler(&transport, Arc::clone(&indexing_done), Arc::clone(&indexing_signaled));
        transport.register_notification_handler("textDocument/publishDiagnostics", |_params| {
            // Diagnostics are not surfaced by any of the seven commands; the
            // handler exists only so the notification does not log a warning.
        });
        transport.register_notification_handler("window/logMessage", |params| {
            if let Some(message) = params.get("message").and_then(|m| m.as_str()) {
                log::debug!("clangd: {message}");
            }
        });

        let client = ClangdClient {
            child: tokio::sync::Mutex::new(child),
            transport,
            indexing_done,
            indexing_signaled,
            opened_files: std::sync::Mutex::new(std::collections::HashSet::new()),
        };

        client.initialize(project_root).await?;
        Ok(client)
    }

    async fn initialize(&self, project_root: &Path) -> Result<()> {
        let root_uri = path_to_uri(project_root);
        let params = json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "synchronization": { "didSave": true },
                    "hover": { "contentFormat": ["markdown", "plaintext"] },
                    "definition": {},
                    "declaration": {},
                    "references": {},
                    "documentSymbol": { "hierarchicalDocumentSymbolSupport": true },
                    "foldingRange": { "rangeLimit": 5000 },
                    "typeHierarchy": {},
                },
                "workspace": {
                    "symbol": {},
                    "workspaceFolders": true,
                },
                "window": {
                    "workDoneProgress": true,
                },
            },
            "workspaceFolders": [{ "uri": root_uri, "name": "root" }],
        });

        self.transport
            .send_request("initialize", params, REQUEST_TIMEOUT)
            .await
            .context("clangd initialize request failed")?;
        self.transport
            .send_notification("initialized", json!({}))
            .await?;
        Ok(())
    }

    /// Open the first translation unit clangd sees so it starts indexing,
    /// then wait for the indexing-progress-end notification or the fallback
    /// timer, whichever comes first (spec.md §4.B).
    pub async fn prime_indexing(&self, first_source_file: &Path) -> Result<()> {
        self.open_document(first_source_file).await?;
        self.wait_for_indexing().await;
        Ok(())
    }

    async fn wait_for_indexing(&self) {
        if self.indexing_signaled.load(Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            _ = self.indexing_done.notified() => {}
            _ = tokio::time::sleep(INDEXING_FALLBACK) => {
                log::debug!("indexing-done notification not seen within fallback window, proceeding anyway");
                self.indexing_signaled.store(true, Ordering::SeqCst);
            }
        }
    }

    pub async fn open_document(&self, path: &Path) -> Result<()> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let uri = path_to_uri(path);
        self.transport
            .send_notification(
                "textDocument/didOpen",
                json!({
                    "textDocument": {
                        "uri": uri,
                        "languageId": "cpp",
                        "version": 1,
                        "text": text,
                    }
                }),
            )
            .await?;
        self.opened_files.lock().unwrap().insert(path.to_path_buf());
        Ok(())
    }

    pub async fn close_document(&self, path: &Path) -> Result<()> {
        let uri = path_to_uri(path);
        self.transport
            .send_notification(
                "textDocument/didClose",
                json!({ "textDocument": { "uri": uri } }),
            )
            .await?;
        self.opened_files.lock().unwrap().remove(path);
        Ok(())
    }

    /// Close and reopen `path` if it is already open, so clangd picks up
    /// on-disk changes it would otherwise have stale-cached. This is the
    /// workaround spec.md §4.B mandates in place of relying on
    /// `didChangeWatchedFiles`, which clangd only partially honors for files
    /// outside the build's watched roots.
    pub async fn reindex_if_open(&self, path: &Path) -> Result<()> {
        let was_open = self.opened_files.lock().unwrap().contains(path);
        if was_open {
            self.close_document(path).await?;
            self.open_document(path).await?;
        }
        Ok(())
    }

    /// Send `workspace/didChangeWatchedFiles` for a batch of changed paths,
    /// regardless of open-document membership, so creates and deletes are
    /// observed by clangd's index even for files it never opened (spec.md
    /// §4.B: "Regardless of open-set membership, also send
    /// `workspace/didChangeWatchedFiles` so that create/delete are observed
    /// by the index.").
    pub async fn notify_watched_files_changed(&self, changes: &[FileChange]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let events: Vec<Value> = changes
            .iter()
            .map(|change| {
                json!({
                    "uri": path_to_uri(&change.path),
                    "type": change.kind.as_lsp_type(),
                })
            })
            .collect();
        self.transport
            .send_notification("workspace/didChangeWatchedFiles", json!({ "changes": events }))
            .await
    }

    async fn query(&self, method: &str, params: Value) -> Result<Value> {
        self.wait_for_indexing().await;
        self.transport.send_request(method, params, REQUEST_TIMEOUT).await
    }

    pub async fn workspace_symbol(&self, query: &str) -> Result<Vec<SymbolInformation>> {
        let result = self
            .query("workspace/symbol", json!({ "query": query }))
            .await?;
        parse_or_empty(result)
    }

    pub async fn document_symbols(&self, path: &Path) -> Result<Vec<DocumentSymbol>> {
        let uri = path_to_uri(path);
        let result = self
            .query(
                "textDocument/documentSymbol",
                json!({ "textDocument": { "uri": uri } }),
            )
            .await?;
        parse_or_empty(result)
    }

    pub async fn definition(&self, path: &Path, line: u32, character: u32) -> Result<Vec<Location>> {
        let result = self.query("textDocument/definition", position_params(path, line, character)).await?;
        parse_locations(result)
    }

    pub async fn declaration(&self, path: &Path, line: u32, character: u32) -> Result<Vec<Location>> {
        let result = self.query("textDocument/declaration", position_params(path, line, character)).await?;
        parse_locations(result)
    }

    pub async fn references(&self, path: &Path, line: u32, character: u32, include_declaration: bool) -> Result<Vec<Location>> {
        let mut params = position_params(path, line, character);
        params["context"] = json!({ "includeDeclaration": include_declaration });
        let result = self.query("textDocument/references", params).await?;
        parse_or_empty(result)
    }

    pub async fn hover(&self, path: &Path, line: u32, character: u32) -> Result<Option<Hover>> {
        let result = self.query("textDocument/hover", position_params(path, line, character)).await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(serde_json::from_value(result).ok())
    }

    pub async fn folding_ranges(&self, path: &Path) -> Result<Vec<FoldingRange>> {
        let uri = path_to_uri(path);
        let result = self
            .query("textDocument/foldingRange", json!({ "textDocument": { "uri": uri } }))
            .await?;
        parse_or_empty(result)
    }

    pub async fn prepare_type_hierarchy(&self, path: &Path, line: u32, character: u32) -> Result<Vec<TypeHierarchyItem>> {
        let result = self
            .query("textDocument/prepareTypeHierarchy", position_params(path, line, character))
            .await?;
        parse_or_empty(result)
    }

    pub async fn supertypes(&self, item: &TypeHierarchyItem) -> Result<Vec<TypeHierarchyItem>> {
        let result = self
            .query("typeHierarchy/supertypes", json!({ "item": item }))
            .await?;
        parse_or_empty(result)
    }

    pub async fn subtypes(&self, item: &TypeHierarchyItem) -> Result<Vec<TypeHierarchyItem>> {
        let result = self
            .query("typeHierarchy/subtypes", json!({ "item": item }))
            .await?;
        parse_or_empty(result)
    }

    /// Request shutdown→exit per the LSP spec, giving clangd a couple of
    /// seconds before killing it outright. Takes `&self` so a shared
    /// `Arc<ClangdClient>` can be shut down without needing to be the sole
    /// owner.
    pub async fn shutdown(&self) {
        let shutdown = self.transport.send_request("shutdown", Value::Null, Duration::from_secs(5)).await;
        if shutdown.is_err() {
            log::warn!("clangd did not respond to shutdown request cleanly");
        }
        let _ = self.transport.send_notification("exit", Value::Null).await;

        let mut child = self.child.lock().await;
        let wait = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
        if wait.is_err() {
            log::warn!("clangd did not exit within 2s, killing");
            let _ = child.kill().await;
        }
    }
}

fn position_params(path: &Path, line: u32, character: u32) -> Value {
    json!({
        "textDocument": { "uri": path_to_uri(path) },
        "position": { "line": line, "character": character },
    })
}

fn parse_or_empty<T: serde::de::DeserializeOwned>(value: Value) -> Result<Vec<T>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).context("decoding clangd response")
}

/// `textDocument/definition` and friends may return a single `Location`, an
/// array, or `LocationLink[]` depending on server capability negotiation;
/// normalize all three shapes.
fn parse_locations(value: Value) -> Result<Vec<Location>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    if let Ok(single) = serde_json::from_value::<Location>(value.clone()) {
        return Ok(vec![single]);
    }
    if let Ok(list) = serde_json::from_value::<Vec<Location>>(value.clone()) {
        return Ok(list);
    }
    if let Ok(links) = serde_json::from_value::<Vec<LocationLink>>(value) {
        return Ok(links
            .into_iter()
            .map(|link| Location { uri: link.target_uri, range: link.target_selection_range })
            .collect());
    }
    bail!("unrecognized location response shape")
}

fn register_progress_handler(transport: &Transport, indexing_done: Arc<Notify>, indexing_signaled: Arc<AtomicBool>) {
    transport.register_notification_handler("$/progress", move |params| {
        let is_index_progress = params
            .get("token")
            .and_then(|t| t.as_str())
            .map(|t| t.contains("backgroundIndexProgress"))
            .unwrap_or(false);
        let is_end = params
            .get("value")
            .and_then(|v| v.get("kind"))
            .and_then(|k| k.as_str())
            == Some("end");
        if is_index_progress && is_end {
            indexing_signaled.store(true, Ordering::SeqCst);
            indexing_done.notify_waiters();
        }
    });
}

fn spawn_stderr_forwarder(stderr: tokio::process::ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log::debug!("clangd stderr: {line}");
        }
    });
}

fn path_to_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };
    format!("file://{}", percent_encode_path(&absolute.to_string_lossy()))
}

/// Percent-encode the handful of characters that are unsafe in a `file://`
/// URI path component (spec.md §3: "percent-encoded paths") but otherwise
/// leave the path readable, since `/` must stay unescaped.
fn percent_encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// `CLANGD_PATH` overrides the `clangd` executable (spec.md §6
/// "Environment").
fn locate_clangd() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CLANGD_PATH") {
        return Ok(PathBuf::from(path));
    }
    which_clangd().context("clangd executable not found on PATH; set CLANGD_PATH")
}

fn which_clangd() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join("clangd"))
        .find(|candidate| candidate.is_file())
}
