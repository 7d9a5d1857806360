//! Ties the browser process (`supervisor`) to its BiDi socket
//! (`connection`) and performs the `session.new`/`session.subscribe`
//! handshake every caller expects to already be done by the time they get a
//! `Client` back (SPEC_FULL.md §4.1).

use serde_json::{json, Value};
use tokio::sync::Mutex;
use vibium_protocol::bidi::CORE_EVENT_SET;

use crate::connection::{Connection, EventStream};
use crate::error::Result;
use crate::supervisor::{self, LaunchOptions, Launched};

/// A live BiDi session against one browser process: either one this client
/// launched and owns, or one it attached to by URL. `launched` sits behind
/// a mutex (not a plain field) so `close()` can run from a shared `&self`
/// — every other caller only ever reads the connection half.
pub struct Client {
    connection: Connection,
    launched: Mutex<Launched>,
}

impl Client {
    /// Launches a fresh browser per `opts`, connects, and negotiates a
    /// session. The returned `Client` owns the browser process.
    pub async fn launch(opts: LaunchOptions) -> Result<Self> {
        let launched = supervisor::launch(opts).await?;
        Self::handshake(launched).await
    }

    /// Connects to an already-running BiDi endpoint without spawning a
    /// process. `stop()` never kills the remote browser.
    pub async fn attach(url: impl Into<String>, headers: &[(String, String)]) -> Result<Self> {
        let launched = supervisor::attach(url);
        Self::handshake_with_headers(launched, headers).await
    }

    async fn handshake(launched: Launched) -> Result<Self> {
        Self::handshake_with_headers(launched, &[]).await
    }

    async fn handshake_with_headers(launched: Launched, headers: &[(String, String)]) -> Result<Self> {
        let connection = Connection::connect(launched.ws_url(), headers).await?;
        connection.send("session.new", json!({ "capabilities": {} }), None).await?;
        connection
            .send(
                "session.subscribe",
                json!({ "events": CORE_EVENT_SET }),
                None,
            )
            .await?;
        Ok(Self { connection, launched: Mutex::new(launched) })
    }

    /// Sends a BiDi command and waits for its response or `timeout`.
    pub async fn send(&self, method: &str, params: Value, timeout: Option<std::time::Duration>) -> Result<Value> {
        self.connection.send(method, params, timeout).await
    }

    /// Subscribes to events whose method starts with `prefix`.
    pub fn subscribe(&self, prefix: impl Into<String>) -> EventStream {
        self.connection.subscribe(prefix)
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Closes the BiDi socket and, if this client owns the browser process,
    /// stops it. Safe to call from a shared `Arc<Client>`.
    pub async fn close(&self) -> Result<()> {
        self.connection.close();
        self.launched.lock().await.stop().await
    }
}

#[cfg(test)]
mod tests {
    // `launch`/`attach` both require a real BiDi endpoint to handshake
    // against, so they're covered by vibium-cli's daemon integration tests
    // rather than unit tests here.
}
