//! XDG-ish path resolution for the daemon's PID/status files and runtime
//! socket (spec.md §4.6 "auto-start"), generalized across the runtime,
//! state, and cache directories spec.md names instead of hard-coding one.

use std::path::PathBuf;

/// Directory for ephemeral runtime state (PID file, status file). Prefers
/// `$XDG_RUNTIME_DIR`, falling back to the state dir on platforms (and CI
/// containers) that don't set it.
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir).join("vibium");
    }
    state_dir()
}

/// Directory for longer-lived daemon state, e.g. logs.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(dir).join("vibium");
    }
    if let Some(dir) = dirs::state_dir() {
        return dir.join("vibium");
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".vibium")
}

/// Directory for cached/derived artifacts (traces, downloaded browser
/// binaries) — not used by the daemon lifecycle itself, but resolved here
/// so every crate path decision lives in one place.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CACHE_HOME") {
        return PathBuf::from(dir).join("vibium");
    }
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache")).join("vibium")
}

pub fn pid_file() -> PathBuf {
    runtime_dir().join("daemon.pid")
}

pub fn status_file() -> PathBuf {
    runtime_dir().join("daemon.status")
}

pub fn log_file() -> PathBuf {
    state_dir().join("daemon.log")
}

pub fn ensure_runtime_dir() -> std::io::Result<()> {
    std::fs::create_dir_all(runtime_dir())
}
