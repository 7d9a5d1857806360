//! Envelope types for the BiDi wire protocol: one JSON object per WebSocket
//! text frame, distinguished by presence of `id` (a command response) vs.
//! `method` with no `id` (an event).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command sent to the browser: `{id, method, params}`.
#[derive(Debug, Clone, Serialize)]
pub struct BidiCommand {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

/// Either half of a BiDi response, or an event, deserialized from one
/// incoming frame. Untagged: the `id` field is what distinguishes a
/// response from an event, not an explicit `type` discriminant the caller
/// has to pre-declare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BidiMessage {
    Success(BidiSuccess),
    Error(BidiErrorResponse),
    Event(BidiEvent),
    /// Anything this client doesn't recognize yet. Logged and dropped
    /// rather than treated as fatal, so new BiDi event/command additions
    /// in a newer browser build don't break an older client.
    Unknown(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BidiSuccess {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: SuccessTag,
    pub result: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BidiErrorResponse {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ErrorTag,
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stacktrace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BidiEvent {
    pub method: String,
    pub params: Value,
}

/// Marker types so serde can select the `Success`/`Error` variants purely
/// by the literal value of `type`, without accepting any other string.
#[derive(Debug, Clone, Deserialize)]
pub enum SuccessTag {
    #[serde(rename = "success")]
    Success,
}

#[derive(Debug, Clone, Deserialize)]
pub enum ErrorTag {
    #[serde(rename = "error")]
    Error,
}

/// `session.new` parameters: a capability-negotiation bag we send mostly
/// empty, requesting the BiDi-only (non-CDP-bridged) session shape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionNewParams {
    pub capabilities: Value,
}

/// `session.subscribe` parameters.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSubscribeParams {
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

/// The event set every new connection subscribes to at `connect()` time,
/// per spec.md §4.1.
pub const CORE_EVENT_SET: &[&str] = &[
    "browsingContext.contextCreated",
    "browsingContext.contextDestroyed",
    "browsingContext.navigationStarted",
    "browsingContext.fragmentNavigated",
    "browsingContext.load",
    "browsingContext.domContentLoaded",
    "browsingContext.userPromptOpened",
    "browsingContext.userPromptClosed",
    "script.realmCreated",
    "script.realmDestroyed",
    "script.message",
    "log.entryAdded",
    "network.beforeRequestSent",
    "network.responseCompleted",
    "network.fetchError",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_parses() {
        let raw = r#"{"id": 7, "type": "success", "result": {"ok": true}}"#;
        let msg: BidiMessage = serde_json::from_str(raw).unwrap();
        match msg {
            BidiMessage::Success(s) => {
                assert_eq!(s.id, 7);
                assert_eq!(s.result["ok"], true);
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn error_response_parses() {
        let raw = r#"{"id": 3, "type": "error", "error": "no such node", "message": "gone"}"#;
        let msg: BidiMessage = serde_json::from_str(raw).unwrap();
        match msg {
            BidiMessage::Error(e) => {
                assert_eq!(e.id, 3);
                assert_eq!(e.error, "no such node");
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn event_parses() {
        let raw = r#"{"method": "browsingContext.contextCreated", "params": {"context": "c1"}}"#;
        let msg: BidiMessage = serde_json::from_str(raw).unwrap();
        match msg {
            BidiMessage::Event(e) => assert_eq!(e.method, "browsingContext.contextCreated"),
            other => panic!("expected Event, got {other:?}"),
        }
    }
}
