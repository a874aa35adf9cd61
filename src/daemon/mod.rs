//! Daemon lifecycle: bootstrap, idle shutdown, signal handling (spec.md
//! §4.C, §4.D).
//!
//! Grounded on `other_examples`'s symora `DaemonServer::run`, which
//! sequences "prepare environment, start the long-lived backend, bind the
//! socket, accept until told to stop" behind a single entry point;
//! generalized here to clangd-query's own bootstrap order (lock, compile
//! database, clangd startup, file watcher, idle timer, signal handler).

pub mod dispatch;
pub mod protocol;
mod server;

use crate::commands::Engine;
use crate::lock::{self, LockError};
use crate::lsp_client::ClangdClient;
use crate::paths::ProjectPaths;
use crate::types::{DaemonStatus, LockRecord};
use crate::{compiledb, logging, watcher};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc};

/// A daemon sits idle this long with no request activity before it shuts
/// itself down (spec.md §4.C), unless overridden.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Shared state every connection handler and the idle timer read from.
pub struct DaemonState {
    pub engine: Engine,
    pub paths: ProjectPaths,
    pub start_time: Instant,
    pub total_requests: AtomicU64,
    pub connections: AtomicU64,
    pub idle_timeout: Duration,
    pub activity: mpsc::UnboundedSender<()>,
    pub shutdown: broadcast::Sender<()>,
}

impl DaemonState {
    pub fn status(&self) -> DaemonStatus {
        DaemonStatus {
            pid: std::process::id(),
            project_root: self.paths.project_root.clone(),
            uptime: self.start_time.elapsed().as_secs(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            idle_timeout: self.idle_timeout.as_secs(),
        }
    }

    /// Record that a request was just served, both for `status`'s counter
    /// and to reset the idle timer.
    pub fn note_activity(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let _ = self.activity.send(());
    }
}

/// Entry point for the hidden `daemon` subcommand (spec.md §4.D). Runs
/// until shut down by the `shutdown` method, an idle timeout, or a signal.
pub async fn run(project_root: PathBuf, verbose: bool) -> Result<()> {
    let paths = ProjectPaths::new(&project_root);
    paths.ensure_cache_dirs().context("preparing cache directories")?;
    logging::init_daemon_log(&paths.log_path, verbose).context("initializing daemon log")?;

    log::info!("starting daemon for {}", project_root.display());
    bootstrap_lock(&paths)?;

    let result = run_inner(project_root, paths.clone()).await;
    lock::remove_lock(&paths.lock_path);
    let _ = std::fs::remove_file(&paths.socket_path);

    if let Err(e) = &result {
        log::error!("daemon exiting with error: {e:?}");
    } else {
        log::info!("daemon shut down cleanly");
    }
    result
}

/// Write this process's lock record, first clearing out anyone else's stale
/// one (spec.md §4.C: "a daemon is stale if its pid is dead or the binary
/// was rebuilt since").
fn bootstrap_lock(paths: &ProjectPaths) -> Result<()> {
    match lock::read_lock(&paths.lock_path) {
        Ok(Some(existing)) if !lock::is_daemon_stale(&existing) => {
            anyhow::bail!(
                "a daemon for {} is already running (pid {})",
                paths.project_root.display(),
                existing.pid
            );
        }
        Ok(Some(stale)) => {
            if lock::pid_alive(stale.pid) {
                log::warn!("terminating stale daemon (pid {}, binary upgraded since)", stale.pid);
                lock::terminate_pid(stale.pid);
                std::thread::sleep(Duration::from_millis(300));
            } else {
                log::warn!("removing lock for dead daemon (pid {})", stale.pid);
            }
            lock::remove_lock(&paths.lock_path);
            let _ = std::fs::remove_file(&paths.socket_path);
        }
        Ok(None) => {}
        Err(LockError::Parse(e)) => {
            log::warn!("ignoring unparseable lock file: {e}");
            lock::remove_lock(&paths.lock_path);
        }
        Err(e) => return Err(e.into()),
    }

    let record = LockRecord {
        pid: std::process::id(),
        socket_path: paths.socket_path.clone(),
        build_time: lock::current_binary_build_time(),
        project_root: paths.project_root.clone(),
    };
    lock::write_lock(&paths.lock_path, &record).context("writing lock file")?;
    Ok(())
}

async fn run_inner(project_root: PathBuf, paths: ProjectPaths) -> Result<()> {
    compiledb::ensure_compile_commands(&project_root, &paths.build_dir).await?;

    log::info!("starting clangd");
    let clangd = ClangdClient::start(&project_root, &paths.build_dir).await?;
    if let Some(first_file) = compiledb::first_source_file(&paths.compile_commands_path).await? {
        clangd.prime_indexing(&project_root.join(&first_file)).await.unwrap_or_else(|e| {
            log::warn!("priming indexing on {}: {e:?}", first_file.display());
        });
    } else {
        log::warn!("compile_commands.json has no entries; indexing will start lazily");
    }
    let clangd = Arc::new(clangd);

    let (shutdown_tx, _) = broadcast::channel(1);
    let (activity_tx, activity_rx) = mpsc::unbounded_channel();

    let watcher_handle = match watcher::spawn(project_root.clone(), Arc::clone(&clangd), shutdown_tx.subscribe()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("file watcher disabled: {e:?}");
            None
        }
    };

    let idle_timeout = idle_timeout_from_env();
    let engine = Engine::new(Arc::clone(&clangd), project_root.clone());
    let state = Arc::new(DaemonState {
        engine,
        paths: paths.clone(),
        start_time: Instant::now(),
        total_requests: AtomicU64::new(0),
        connections: AtomicU64::new(0),
        idle_timeout,
        activity: activity_tx,
        shutdown: shutdown_tx.clone(),
    });

    spawn_idle_timer(activity_rx, idle_timeout, shutdown_tx.clone());
    spawn_signal_handler(shutdown_tx.clone());

    let listener = bind_socket(&paths.socket_path).await?;
    log::info!("listening on {}", paths.socket_path.display());

    server::accept_loop(listener, Arc::clone(&state), shutdown_tx.subscribe()).await;

    if let Some(handle) = watcher_handle {
        handle.abort();
    }
    log::info!("shutting down clangd");
    clangd.shutdown().await;
    Ok(())
}

async fn bind_socket(socket_path: &std::path::Path) -> Result<UnixListener> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("binding {}", socket_path.display()))?;
    set_owner_only_permissions(socket_path)?;
    Ok(listener)
}

#[cfg(unix)]
fn set_owner_only_permissions(socket_path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(socket_path, permissions)
        .with_context(|| format!("setting permissions on {}", socket_path.display()))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_socket_path: &std::path::Path) -> Result<()> {
    Ok(())
}

/// `CLANGD_DAEMON_TIMEOUT` overrides the idle shutdown window, in seconds
/// (spec.md §6 "Environment").
fn idle_timeout_from_env() -> Duration {
    std::env::var("CLANGD_DAEMON_TIMEOUT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_IDLE_TIMEOUT)
}

/// Fire `shutdown` once no activity has been reported for `idle_timeout`.
/// Every request handled resets the window by sending on `activity_rx`.
fn spawn_idle_timer(
    mut activity_rx: mpsc::UnboundedReceiver<()>,
    idle_timeout: Duration,
    shutdown: broadcast::Sender<()>,
) {
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown.subscribe();
        loop {
            tokio::select! {
                received = tokio::time::timeout(idle_timeout, activity_rx.recv()) => {
                    match received {
                        Ok(Some(())) => continue,
                        Ok(None) => break,
                        Err(_elapsed) => {
                            log::info!("idle for {}s, shutting down", idle_timeout.as_secs());
                            let _ = shutdown.send(());
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    });
}

#[cfg(unix)]
fn spawn_signal_handler(shutdown: broadcast::Sender<()>) {
    use tokio::signal::unix::{SignalKind, signal};
    tokio::spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {e}");
                return;
            }
        };
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to install SIGINT handler: {e}");
                return;
            }
        };
        tokio::select! {
            _ = term.recv() => log::info!("received SIGTERM"),
            _ = interrupt.recv() => log::info!("received SIGINT"),
        }
        let _ = shutdown.send(());
    });
}

#[cfg(not(unix))]
fn spawn_signal_handler(shutdown: broadcast::Sender<()>) {
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("received ctrl-c");
        let _ = shutdown.send(());
    });
}
