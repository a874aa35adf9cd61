//! Thin client: discover or start the per-project daemon, send one request
//! over its Unix socket, and return the response (spec.md §4.G, §6).
//!
//! Grounded on `other_examples`'s symora client-side `connect_or_spawn`
//! pattern (lock-file staleness check, spawn-and-retry-connect), adapted
//! from a TCP port to a per-project Unix socket path and from a single
//! global daemon to one daemon per project root.

use crate::lock::{self, LockError};
use crate::paths::ProjectPaths;
use crate::daemon::protocol::{Request, Response};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// How long to wait for a freshly spawned daemon to open its socket before
/// giving up (spec.md §4.G: indexing itself happens in the background, so
/// this only needs to cover process startup, not indexing completion).
const SPAWN_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Send `method`/`params` to the daemon for `project_root`, starting it
/// first if none is running. Returns the decoded `result` on success.
pub async fn send(project_root: &std::path::Path, method: &str, params: Value) -> Result<Value> {
    let paths = ProjectPaths::new(project_root);
    ensure_daemon_running(&paths).await?;

    let stream = connect_with_retry(&paths.socket_path, SPAWN_CONNECT_TIMEOUT)
        .await
        .context("connecting to daemon socket")?;
    let (read_half, mut write_half) = stream.into_split();

    let request = Request { id: 1, method: method.to_string(), params };
    let mut line = serde_json::to_string(&request)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await.context("writing request")?;

    let mut reader = BufReader::new(read_half);
    let mut response_line = String::new();
    let read = reader.read_line(&mut response_line).await.context("reading response")?;
    if read == 0 {
        bail!("daemon closed the connection without responding");
    }

    let response: Response = serde_json::from_str(response_line.trim()).context("decoding daemon response")?;
    match response {
        Response::Ok { result, .. } => Ok(result),
        Response::Err { error, .. } => bail!("{error}"),
    }
}

/// Start a daemon for `paths.project_root` if no live one is recorded in
/// its lock file (spec.md §4.C's staleness rule decides "live").
async fn ensure_daemon_running(paths: &ProjectPaths) -> Result<()> {
    match lock::read_lock(&paths.lock_path) {
        Ok(Some(record)) if !lock::is_daemon_stale(&record) => return Ok(()),
        Ok(Some(record)) => {
            if lock::pid_alive(record.pid) {
                log::warn!("terminating stale daemon (pid {}) before starting a new one", record.pid);
                lock::terminate_pid(record.pid);
                tokio::time::sleep(Duration::from_millis(300)).await;
            } else {
                log::warn!("removing lock for dead daemon (pid {})", record.pid);
            }
            lock::remove_lock(&paths.lock_path);
            let _ = std::fs::remove_file(&paths.socket_path);
        }
        Ok(None) => {}
        Err(LockError::Parse(_)) => {}
        Err(e) => return Err(e.into()),
    }
    spawn_daemon(&paths.project_root)
}

/// Fork off a detached `clangd-query daemon` process for `project_root`.
/// The daemon writes its own lock file once it has bound its socket;
/// [`connect_with_retry`] is what actually waits for that to happen.
fn spawn_daemon(project_root: &std::path::Path) -> Result<()> {
    let exe = std::env::current_exe().context("locating current executable")?;
    std::process::Command::new(exe)
        .arg("daemon")
        .arg("--project-root")
        .arg(project_root)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("spawning daemon process")?;
    Ok(())
}

/// Poll for the socket to appear and accept connections, since a freshly
/// spawned daemon needs time to run its CMake/clangd-startup bootstrap
/// before it binds.
async fn connect_with_retry(socket_path: &std::path::Path, timeout: Duration) -> Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
            Err(e) => return Err(e).context(format!("connecting to {}", socket_path.display())),
        }
    }
}
