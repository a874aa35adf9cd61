//! Framed JSON-RPC transport over a child process's stdio (spec.md §4.A).
//!
//! Grounded on the teacher's `Content-Length` framing loop
//! (`receive_data_backend`/`send_data_backend` in the original `main.rs`) and
//! its request/response correlation in `ClangdSession::send_request`,
//! generalized from a single in-flight request at a time into a pending-map
//! keyed by request id so any number of callers can have requests in flight
//! concurrently.

use anyhow::{Context, Result, anyhow};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::{Mutex, oneshot};

/// A single handler per notification method, registered once at startup.
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Bidirectional framed JSON-RPC transport. Cloning shares the same
/// underlying child process and pending-request map.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

struct Inner {
    writer: Mutex<ChildStdin>,
    next_id: AtomicI64,
    pending: DashMap<i64, oneshot::Sender<Result<Value, JsonRpcError>>>,
    handlers: DashMap<String, NotificationHandler>,
}

/// The `{code, message}` shape of a JSON-RPC error response.
#[derive(Debug, Clone)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

impl Transport {
    /// Wrap a child process's stdin/stdout. Spawns the read loop as a
    /// background task; call [`Transport::notification_handlers_mut`]-style
    /// registration *before* traffic starts, since handlers are looked up by
    /// reference and are meant to be write-once.
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        let inner = Arc::new(Inner {
            writer: Mutex::new(stdin),
            next_id: AtomicI64::new(1),
            pending: DashMap::new(),
            handlers: DashMap::new(),
        });

        let transport = Transport { inner };
        transport.spawn_read_loop(stdout);
        transport
    }

    /// Register the handler for `method`. Overwrites any prior handler for
    /// the same method, per spec.md §4.A's "single handler per method".
    pub fn register_notification_handler(
        &self,
        method: impl Into<String>,
        handler: impl Fn(Value) + Send + Sync + 'static,
    ) {
        self.inner.handlers.insert(method.into(), Arc::new(handler));
    }

    /// Send a request and await its response (or a local timeout, whichever
    /// comes first). The underlying LSP request is not cancelled on timeout;
    /// a later-arriving response for this id is simply dropped since the
    /// oneshot receiver has gone away.
    pub async fn send_request(
        &self,
        method: &str,
        params: Value,
        timeout: std::time::Duration,
    ) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        if let Err(e) = self.write_message(&message).await {
            self.inner.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(rpc_error))) => Err(anyhow!(rpc_error)),
            Ok(Err(_)) => Err(anyhow!("transport closed")),
            Err(_) => {
                self.inner.pending.remove(&id);
                Err(anyhow!("timeout"))
            }
        }
    }

    /// Fire-and-forget: no id, no response expected.
    pub async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_message(&message).await
    }

    async fn write_message(&self, message: &Value) -> Result<()> {
        let body = serde_json::to_string(message)?;
        let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let mut writer = self.inner.writer.lock().await;
        writer
            .write_all(framed.as_bytes())
            .await
            .context("writing framed LSP message")?;
        writer.flush().await.context("flushing LSP message")?;
        Ok(())
    }

    fn spawn_read_loop(&self, stdout: ChildStdout) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match read_one_frame(&mut reader).await {
                    Ok(Some(value)) => dispatch_incoming(&inner, value),
                    Ok(None) => break, // EOF
                    Err(e) => {
                        log::warn!("malformed LSP frame, skipping: {e:?}");
                        continue;
                    }
                }
            }
            fail_all_pending(&inner);
        });
    }
}

/// Read one `Content-Length`-framed message. Returns `Ok(None)` on a clean
/// EOF before any header bytes are read.
async fn read_one_frame(
    reader: &mut BufReader<ChildStdout>,
) -> Result<Option<Value>> {
    let mut content_length = None;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = Some(
                value
                    .trim()
                    .parse::<usize>()
                    .context("parsing Content-Length")?,
            );
        }
    }

    let content_length = content_length.context("frame missing Content-Length header")?;
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;
    let value: Value = serde_json::from_slice(&body).context("decoding JSON body")?;
    Ok(Some(value))
}

fn dispatch_incoming(inner: &Arc<Inner>, value: Value) {
    let has_id = value.get("id").is_some();
    let has_method = value.get("method").is_some();

    match (has_id, has_method) {
        (true, false) => deliver_response(inner, value),
        (false, true) => deliver_notification(inner, value),
        (true, true) => {
            // Server-to-client request. clangd only ever uses this for
            // window/workDoneProgress/create; reply with a null result.
            let id = value.get("id").cloned().unwrap_or(Value::Null);
            let reply = serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": Value::Null });
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                let writer_guard = inner.writer.lock().await;
                let mut writer = writer_guard;
                if let Ok(body) = serde_json::to_string(&reply) {
                    let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
                    let _ = writer.write_all(framed.as_bytes()).await;
                    let _ = writer.flush().await;
                }
            });
        }
        (false, false) => {
            log::warn!("dropping LSP frame with neither id nor method");
        }
    }
}

fn deliver_response(inner: &Arc<Inner>, value: Value) {
    let Some(id) = value.get("id").and_then(|v| v.as_i64()) else {
        return;
    };
    let Some((_, tx)) = inner.pending.remove(&id) else {
        // Already timed out locally, or duplicate id; drop silently.
        return;
    };
    if let Some(error) = value.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        let _ = tx.send(Err(JsonRpcError { code, message }));
    } else {
        let result = value.get("result").cloned().unwrap_or(Value::Null);
        let _ = tx.send(Ok(result));
    }
}

fn deliver_notification(inner: &Arc<Inner>, value: Value) {
    let Some(method) = value.get("method").and_then(|m| m.as_str()) else {
        return;
    };
    let Some(handler) = inner.handlers.get(method) else {
        return;
    };
    let handler = Arc::clone(&handler);
    let params = value.get("params").cloned().unwrap_or(Value::Null);
    // Dispatch onto a worker so a slow handler never blocks the read loop.
    tokio::spawn(async move {
        handler(params);
    });
}

fn fail_all_pending(inner: &Arc<Inner>) {
    let ids: Vec<i64> = inner.pending.iter().map(|e| *e.key()).collect();
    for id in ids {
        if let Some((_, tx)) = inner.pending.remove(&id) {
            let _ = tx.send(Err(JsonRpcError {
                code: -1,
                message: "transport closed".to_string(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_rpc_error_display_contains_code_and_message() {
        let e = JsonRpcError { code: -32601, message: "method not found".into() };
        assert_eq!(e.to_string(), "(-32601) method not found");
    }
}
