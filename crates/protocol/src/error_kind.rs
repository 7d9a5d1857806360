use serde::{Deserialize, Serialize};

/// The error taxonomy every tool, BiDi call, and IPC response reports
/// through. Crate-local error enums map onto this set via a `kind()`
/// accessor rather than exposing their own variants on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Element/context/tab not present. Not retried; surfaced to client.
    NotFound,
    /// Query matched multiple when uniqueness was required.
    Ambiguous,
    /// Actionability sub-check failed at deadline.
    NotActionable,
    /// Element ref's realm was destroyed.
    StaleElement,
    /// Deadline elapsed waiting for a condition or a BiDi response.
    Timeout,
    /// BiDi returned `error` (message passed through).
    Protocol,
    /// WebSocket/IPC read or write failure; fatal to the connection.
    Transport,
    /// Tool argument validation failed.
    Schema,
    /// Feature not available in the current browser/endpoint.
    Unsupported,
    /// Daemon or BiDi session is shutting down.
    Closed,
    /// Programmer error.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::NotActionable => "not_actionable",
            ErrorKind::StaleElement => "stale_element",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Transport => "transport",
            ErrorKind::Schema => "schema",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Closed => "closed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
