//! Request dispatch: built-in methods (`status`, `logs`, `shutdown`) plus
//! routing of the seven command methods to the command engine (spec.md
//! §4.D "Request dispatch").
//!
//! Grounded on `other_examples`'s symora `DaemonServer::dispatch`, which
//! routes a wire method name to a handler closure operating on shared
//! state; generalized here to this spec's exact method table, with every
//! handler's error logged once and converted to the `{code: -1, message}`
//! shape before it reaches the client (spec.md §4.D: "The daemon never
//! returns a non-logged error").

use super::DaemonState;
use super::protocol::{Request, Response};
use crate::commands;
use crate::logging;
use anyhow::Context;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
struct SymbolParams {
    symbol: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct LogsParams {
    #[serde(default = "default_log_level")]
    level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Dispatch one request to completion. Never errors itself: every failure
/// from the underlying handler is logged here and turned into an `Err`
/// response instead of propagating.
pub async fn dispatch(state: &DaemonState, request: Request) -> Response {
    let id = request.id;
    match run(state, &request.method, request.params).await {
        Ok(value) => Response::ok(id, value),
        Err(e) => {
            log::error!("{} failed: {e:?}", request.method);
            Response::err(id, e.to_string())
        }
    }
}

async fn run(state: &DaemonState, method: &str, params: Value) -> anyhow::Result<Value> {
    match method {
        "status" => Ok(serde_json::to_value(state.status())?),
        "logs" => {
            let params: LogsParams = parse_params(params)?;
            let level = logging::parse_level(&params.level);
            Ok(json!({ "logs": logging::tail_logs(level) }))
        }
        "shutdown" => {
            let shutdown = state.shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                let _ = shutdown.send(());
            });
            Ok(json!({ "status": "shutting down" }))
        }
        "search" => {
            let params: SearchParams = parse_params(params)?;
            let output = commands::run_search(&state.engine, &params.query, params.limit).await?;
            Ok(json!({ "output": output }))
        }
        "show" => {
            let params: SymbolParams = parse_params(params)?;
            let output = commands::run_show(&state.engine, &params.symbol).await?;
            Ok(json!({ "output": output }))
        }
        "view" => {
            let params: SymbolParams = parse_params(params)?;
            let output = commands::run_view(&state.engine, &params.symbol).await?;
            Ok(json!({ "output": output }))
        }
        "usages" => {
            let params: SymbolParams = parse_params(params)?;
            let output = commands::run_usages(&state.engine, &params.symbol).await?;
            Ok(json!({ "output": output }))
        }
        "hierarchy" => {
            let params: SymbolParams = parse_params(params)?;
            let output = commands::run_hierarchy(&state.engine, &params.symbol, params.limit).await?;
            Ok(json!({ "output": output }))
        }
        "signature" => {
            let params: SymbolParams = parse_params(params)?;
            let output = commands::run_signature(&state.engine, &params.symbol).await?;
            Ok(json!({ "output": output }))
        }
        "interface" => {
            let params: SymbolParams = parse_params(params)?;
            let output = commands::run_interface(&state.engine, &params.symbol).await?;
            Ok(json!({ "output": output }))
        }
        other => anyhow::bail!("unknown method: {other}"),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> anyhow::Result<T> {
    serde_json::from_value(params).context("parsing request params")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_params_without_limit_parses() {
        let params: SymbolParams = serde_json::from_value(json!({ "symbol": "Foo::Bar" })).unwrap();
        assert_eq!(params.symbol, "Foo::Bar");
        assert_eq!(params.limit, None);
    }

    #[test]
    fn logs_params_default_to_info() {
        let params: LogsParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.level, "info");
    }
}
