//! Wire protocol for the daemon socket (spec.md §6 "Daemon socket
//! protocol"): one JSON object per newline-terminated frame, in both
//! directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// `{ "id": <int>, "method": <string>, "params": { ... } }`
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: i64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Either `{ "id", "result" }` on success or `{ "id", "error" }` on failure.
/// `#[serde(untagged)]` picks the matching shape on both serialize and
/// deserialize since the two variants have disjoint field sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ok { id: i64, result: Value },
    Err { id: i64, error: DaemonRpcError },
}

impl Response {
    pub fn ok(id: i64, result: Value) -> Self {
        Response::Ok { id, result }
    }

    pub fn err(id: i64, message: impl Into<String>) -> Self {
        Response::Err { id, error: DaemonRpcError::new(message) }
    }
}

/// The `{code, message}` shape of a failed response. spec.md §4.D: "All
/// errors... are logged at the point they are produced and then surfaced to
/// the client as a JSON-RPC error with code −1".
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("({code}) {message}")]
pub struct DaemonRpcError {
    pub code: i64,
    pub message: String,
}

impl DaemonRpcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { code: -1, message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_round_trips() {
        let response = Response::ok(1, serde_json::json!({ "output": "hi" }));
        let wire = serde_json::to_string(&response).unwrap();
        let parsed: Response = serde_json::from_str(&wire).unwrap();
        match parsed {
            Response::Ok { id, result } => {
                assert_eq!(id, 1);
                assert_eq!(result["output"], "hi");
            }
            Response::Err { .. } => panic!("expected Ok"),
        }
    }

    #[test]
    fn err_response_round_trips() {
        let response = Response::err(2, "symbol not found");
        let wire = serde_json::to_string(&response).unwrap();
        let parsed: Response = serde_json::from_str(&wire).unwrap();
        match parsed {
            Response::Err { id, error } => {
                assert_eq!(id, 2);
                assert_eq!(error.code, -1);
                assert_eq!(error.message, "symbol not found");
            }
            Response::Ok { .. } => panic!("expected Err"),
        }
    }

    #[test]
    fn request_params_default_to_null() {
        let request: Request = serde_json::from_str(r#"{"id": 1, "method": "status"}"#).unwrap();
        assert!(request.params.is_null());
    }
}
