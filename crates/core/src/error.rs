use vibium_protocol::ErrorKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the tool layer and registry. Every variant maps onto
/// one of the wire-level [`ErrorKind`]s (SPEC_FULL.md §7); the daemon never
/// hands a bare tool error to a client without that mapping.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("selector matched {count} elements, expected one: {selector}")]
    Ambiguous { selector: String, count: usize },

    #[error("element not actionable: {check} check failed after {elapsed_ms}ms")]
    NotActionable { check: &'static str, elapsed_ms: u64 },

    #[error("element ref {0} is stale (its realm was destroyed)")]
    StaleElement(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Transport(#[from] vibium_bidi::Error),

    #[error("invalid arguments: {0}")]
    Schema(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("session is closed")]
    Closed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Ambiguous { .. } => ErrorKind::Ambiguous,
            Error::NotActionable { .. } => ErrorKind::NotActionable,
            Error::StaleElement(_) => ErrorKind::StaleElement,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Transport(inner) => match inner.kind() {
                ErrorKind::Closed => ErrorKind::Closed,
                other => other,
            },
            Error::Schema(_) => ErrorKind::Schema,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Closed => ErrorKind::Closed,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}
