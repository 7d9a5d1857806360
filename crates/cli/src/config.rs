//! Daemon configuration sourced from the environment (SPEC_FULL.md §6's
//! ambient env var list), read once into a small typed struct rather than
//! scattering `env::var` calls through the daemon/session code.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// `VIBIUM_CONNECT_URL`: attach to an existing BiDi endpoint instead of
    /// launching a browser.
    pub connect_url: Option<String>,
    /// `VIBIUM_CONNECT_API_KEY`: sent as an `Authorization: Bearer` header
    /// when attaching to `connect_url`.
    pub connect_api_key: Option<String>,
    /// `VIBIUM_ONESHOT`: shut down after the first client disconnects
    /// instead of waiting out the idle timeout.
    pub oneshot: bool,
    /// `VIBIUM_HEADLESS`: defaults to headless; set to `0`/`false` to show
    /// a window.
    pub headless: bool,
    /// `VIBIUM_ROUTE_GRACE_MS`: overrides `vibium_core`'s default bound on
    /// how long a registered route is given to resolve before the event
    /// pump gives up on it (`tools::network::DEFAULT_ROUTE_GRACE_MS`).
    pub route_grace_ms: u64,
    pub idle_timeout: Duration,
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self {
            connect_url: env_str("VIBIUM_CONNECT_URL"),
            connect_api_key: env_str("VIBIUM_CONNECT_API_KEY"),
            oneshot: env_bool("VIBIUM_ONESHOT", false),
            headless: env_bool("VIBIUM_HEADLESS", true),
            route_grace_ms: std::env::var("VIBIUM_ROUTE_GRACE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(vibium_core::tools::DEFAULT_ROUTE_GRACE_MS),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => !matches!(v.as_str(), "0" | "false" | "no"),
        Err(_) => default,
    }
}
