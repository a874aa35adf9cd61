//! Accept loop and per-connection handling for the daemon's Unix socket
//! (spec.md §4.D, §6 "Daemon socket protocol"): one JSON object per
//! newline-terminated frame, in both directions, with as many concurrent
//! connections as clients choose to open.

use super::DaemonState;
use super::dispatch::dispatch;
use super::protocol::{Request, Response};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Accept connections until `shutdown` fires, draining any already-accepted
/// connections before returning.
pub async fn accept_loop(listener: UnixListener, state: Arc<DaemonState>, mut shutdown: broadcast::Receiver<()>) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let state = Arc::clone(&state);
                        let conn_shutdown = state.shutdown.subscribe();
                        connections.spawn(handle_connection(stream, state, conn_shutdown));
                    }
                    Err(e) => log::warn!("accept failed: {e}"),
                }
            }
            _ = shutdown.recv() => {
                log::info!("shutdown requested, draining {} connection(s)", connections.len());
                break;
            }
            Some(result) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = result {
                    log::warn!("connection task panicked: {e}");
                }
            }
        }
    }

    // Give in-flight connections a moment to finish their current request,
    // then stop waiting regardless.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while connections.join_next().await.is_some() {}
    })
    .await;
}

async fn handle_connection(stream: tokio::net::UnixStream, state: Arc<DaemonState>, mut shutdown: broadcast::Receiver<()>) {
    state.connections.fetch_add(1, Ordering::Relaxed);
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("reading from client: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let request: Request = match serde_json::from_str(&line) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("malformed request: {e}");
                        continue;
                    }
                };

                let response = dispatch(&state, request).await;
                state.note_activity();

                if let Err(e) = write_response(&mut write_half, &response).await {
                    log::warn!("writing response to client: {e}");
                    break;
                }
            }
            _ = shutdown.recv() => break,
        }
    }

    state.connections.fetch_sub(1, Ordering::Relaxed);
}

async fn write_response(write_half: &mut tokio::net::unix::OwnedWriteHalf, response: &Response) -> std::io::Result<()> {
    let mut line = serde_json::to_string(response).expect("Response always serializes");
    line.push('\n');
    write_half.write_all(line.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::super::protocol::Response;
    use serde_json::json;

    #[test]
    fn response_serializes_with_trailing_shape_clients_expect() {
        let response = Response::ok(1, json!({ "output": "hi" }));
        let wire = serde_json::to_string(&response).unwrap();
        assert!(wire.contains("\"result\""));
        assert!(!wire.contains("\"error\""));
    }
}
