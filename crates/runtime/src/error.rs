use vibium_protocol::ErrorKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("BiDi protocol error: {0}")]
    Protocol(String),

    #[error("BiDi call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection closed")]
    Closed,

    #[error("connection closed by remote: {0}")]
    ClosedByRemote(String),

    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to serialize/deserialize BiDi message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("browser binary not found: {0}")]
    BrowserNotInstalled(String),

    #[error("browser process exited during launch: {0}")]
    LaunchFailed(String),

    #[error("feature unsupported by this browser/endpoint: {0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Closed | Error::ClosedByRemote(_) => ErrorKind::Closed,
            Error::Transport(_) | Error::Json(_) => ErrorKind::Transport,
            Error::BrowserNotInstalled(_) | Error::LaunchFailed(_) => ErrorKind::Internal,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}
