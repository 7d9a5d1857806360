//! Wire types for the local daemon IPC transport: newline-delimited JSON,
//! one request per line in, one response per line out. See spec.md §6.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_kind::ErrorKind;

/// `{id, method, params}`. `id` is chosen by the client and echoed back
/// verbatim in the matching response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// `{id, ok, result|error}`. Untagged on `ok` so a client that only checks
/// `ok` can do so without matching on a `type` discriminant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub id: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
}

impl IpcResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self { id, ok: true, result: Some(result), error: None }
    }

    pub fn err(id: u64, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(IpcError { kind, message: message.into() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Pipe-mode-only out-of-band event frame: `{method, params}`, no `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcEvent {
    pub method: String,
    pub params: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_round_trips() {
        let resp = IpcResponse::ok(1, serde_json::json!({"url": "about:blank"}));
        let raw = serde_json::to_string(&resp).unwrap();
        let back: IpcResponse = serde_json::from_str(&raw).unwrap();
        assert!(back.ok);
        assert_eq!(back.result.unwrap()["url"], "about:blank");
    }

    #[test]
    fn error_response_carries_kind() {
        let resp = IpcResponse::err(2, ErrorKind::NotFound, "no such element");
        let raw = serde_json::to_string(&resp).unwrap();
        assert!(raw.contains("\"not_found\""));
        let back: IpcResponse = serde_json::from_str(&raw).unwrap();
        assert!(!back.ok);
        assert_eq!(back.error.unwrap().kind, ErrorKind::NotFound);
    }
}
