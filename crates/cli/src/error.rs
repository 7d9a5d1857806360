//! CLI-facing error type. Wraps [`vibium_core::Error`] and the daemon's own
//! transport/IO failures, and maps every variant onto an exit code and an
//! [`ErrorKind`] shown to callers via [`crate::output::CommandResult`]
//! (spec.md §7). `130`/`143` (interrupted/terminated) never surface here:
//! the daemon traps `SIGINT`/`SIGTERM` in its own run loop and exits
//! cleanly, so every `CliError` maps to a plain failure exit code.

use vibium_core::Error as ToolError;
use vibium_protocol::ErrorKind;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("daemon is not running")]
    DaemonNotRunning,

    #[error("daemon did not become ready within the startup deadline")]
    DaemonStartTimeout,

    #[error(transparent)]
    Rpc(#[from] jsonrpsee::core::ClientError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    /// The process exit code this error should produce (spec.md §7: every
    /// non-signal failure is `1`).
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub fn error_kind(&self) -> ErrorKind {
        match self {
            CliError::Tool(err) => err.kind(),
            CliError::DaemonNotRunning | CliError::DaemonStartTimeout => ErrorKind::Closed,
            CliError::Rpc(_) => ErrorKind::Transport,
            CliError::Io(_) => ErrorKind::Transport,
            CliError::Json(_) => ErrorKind::Schema,
            CliError::Anyhow(_) => ErrorKind::Internal,
        }
    }
}
