//! Filesystem watcher that triggers the close/reopen reindex workaround when
//! source files change outside clangd's own awareness (spec.md §4.B, §4.H).
//!
//! Grounded on `other_examples`'s Catenary `NotifyServer`, which bridges an
//! external file-change signal into an LSP client manager; here the signal
//! source is `notify`/`notify-debouncer-full` watching the project tree
//! directly instead of an editor hook.

use crate::lsp_client::{ClangdClient, FileChange, FileChangeKind};
use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Debounce window before a burst of filesystem events is delivered as one
/// batch (editors often write a file as several small events in quick
/// succession: truncate, write, rename-into-place).
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(400);

/// Start watching `project_root` for changes to C++ source/header files.
/// Reindexes any changed file that clangd currently has open. Runs until
/// `shutdown` fires; the debouncer itself is kept alive for the lifetime of
/// the returned task.
pub fn spawn(
    project_root: PathBuf,
    clangd: Arc<ClangdClient>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> Result<tokio::task::JoinHandle<()>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<FileChange>>();

    let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                let changes: Vec<FileChange> = events
                    .into_iter()
                    .flat_map(|event| {
                        let kind = change_kind(&event.kind);
                        event.paths.clone().into_iter().map(move |path| (path, kind))
                    })
                    .filter(|(path, _)| is_watched_source(path))
                    .map(|(path, kind)| FileChange { path, kind })
                    .collect();
                if !changes.is_empty() {
                    let _ = tx.send(changes);
                }
            }
            Err(errors) => {
                for error in errors {
                    log::warn!("file watcher error: {error}");
                }
            }
        }
    })
    .context("creating file watcher")?;

    debouncer
        .watch(&project_root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", project_root.display()))?;

    let handle = tokio::spawn(async move {
        // Keep the debouncer alive for the task's lifetime; dropping it
        // would stop delivery of further events.
        let _debouncer = debouncer;
        loop {
            tokio::select! {
                Some(changes) = rx.recv() => {
                    for change in &changes {
                        log::debug!("reindexing changed file: {}", change.path.display());
                        if let Err(e) = clangd.reindex_if_open(&change.path).await {
                            log::warn!("failed to reindex {}: {e:?}", change.path.display());
                        }
                    }
                    if let Err(e) = clangd.notify_watched_files_changed(&changes).await {
                        log::warn!("failed to send didChangeWatchedFiles: {e:?}");
                    }
                }
                _ = shutdown.recv() => {
                    break;
                }
                else => break,
            }
        }
    });

    Ok(handle)
}

/// Map `notify`'s event kind onto the three-way LSP `FileChangeType`.
/// Anything that isn't clearly a create or remove is reported as a change.
fn change_kind(kind: &EventKind) -> FileChangeKind {
    match kind {
        EventKind::Create(_) => FileChangeKind::Created,
        EventKind::Remove(_) => FileChangeKind::Deleted,
        _ => FileChangeKind::Changed,
    }
}

fn is_watched_source(path: &Path) -> bool {
    let is_cpp = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cc") | Some("cpp") | Some("cxx") | Some("c++") | Some("h") | Some("hh") | Some("hpp") | Some("hxx")
    );
    let under_cache = path.components().any(|c| c.as_os_str() == ".cache");
    is_cpp && !under_cache
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watches_cpp_extensions_only() {
        assert!(is_watched_source(Path::new("/proj/src/foo.cpp")));
        assert!(is_watched_source(Path::new("/proj/include/foo.hpp")));
        assert!(!is_watched_source(Path::new("/proj/README.md")));
    }

    #[test]
    fn ignores_the_build_cache() {
        assert!(!is_watched_source(Path::new("/proj/.cache/clangd-query/build/foo.cpp")));
    }
}
