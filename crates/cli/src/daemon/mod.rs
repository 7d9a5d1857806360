//! The daemon's RPC client/server pairing (spec.md §4.5). A thin seam over
//! jsonrpsee: `DaemonClient` is what `vibium <tool>` commands talk through,
//! auto-starting the daemon per spec.md §4.6 when it isn't already up.

mod client;
mod rpc;
mod server;

use anyhow::{Result, anyhow};
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::HttpClient;
pub use client::spawn_and_wait;
use rpc::VibiumRpcClient as _;
pub use rpc::DaemonStatus;
pub use server::Daemon;
use serde_json::Value;
use tracing::debug;

/// Loopback TCP port the daemon's jsonrpsee server binds (spec.md §4.5
/// substitutes a Unix socket / named pipe with a loopback HTTP transport —
/// see DESIGN.md for the grounding rationale).
pub const DAEMON_TCP_PORT: u16 = 19223;

#[derive(Debug, Clone)]
pub struct DaemonClient {
	client: HttpClient,
}

/// Probes for a running daemon without starting one.
pub async fn try_connect() -> Option<DaemonClient> {
	let probe = match client::connect_probe_client() {
		Ok(client) => client,
		Err(err) => {
			debug!(target: "vibium::daemon", error = %err, "failed to build daemon RPC client");
			return None;
		}
	};

	match probe.ping().await {
		Ok(true) => match client::connect_client() {
			Ok(client) => Some(DaemonClient { client }),
			Err(err) => {
				debug!(target: "vibium::daemon", error = %err, "failed to build daemon RPC client");
				None
			}
		},
		Ok(false) => None,
		Err(err) if is_not_running(&err) => None,
		Err(err) => {
			debug!(target: "vibium::daemon", error = %err, "daemon connection failed");
			None
		}
	}
}

/// Connects to the daemon, auto-starting it first if nothing answers
/// (spec.md §4.6). This is what every tool-invoking CLI command calls.
pub async fn connect_or_start() -> Result<DaemonClient> {
	if let Some(client) = try_connect().await {
		return Ok(client);
	}
	client::spawn_and_wait().await?;
	try_connect().await.ok_or_else(|| anyhow!("daemon started but did not become reachable"))
}

impl DaemonClient {
	pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value> {
		self.client.call_tool(name.to_string(), args).await.map_err(|err| anyhow!("daemon RPC `{name}` failed: {err}"))
	}

	pub async fn status(&self) -> Result<DaemonStatus> {
		self.client.status().await.map_err(|err| anyhow!("daemon RPC status failed: {err}"))
	}
}

pub async fn ping() -> Result<Option<bool>> {
	let client = client::connect_probe_client()?;
	match client.ping().await {
		Ok(value) => Ok(Some(value)),
		Err(err) if is_not_running(&err) => Ok(None),
		Err(err) => Err(anyhow!("daemon RPC ping failed: {err}")),
	}
}

pub async fn status() -> Result<Option<DaemonStatus>> {
	let client = client::connect_probe_client()?;
	match client.status().await {
		Ok(status) => Ok(Some(status)),
		Err(err) if is_not_running(&err) => Ok(None),
		Err(err) => Err(anyhow!("daemon RPC status failed: {err}")),
	}
}

pub async fn shutdown() -> Result<Option<()>> {
	let probe = client::connect_probe_client()?;
	match probe.ping().await {
		Ok(true) => {}
		Ok(false) => return Ok(None),
		Err(err) if is_not_running(&err) => return Ok(None),
		Err(err) => return Err(anyhow!("daemon RPC ping failed before shutdown: {err}")),
	}

	let client = client::connect_client()?;
	match client.shutdown().await {
		Ok(()) => Ok(Some(())),
		Err(err) if is_not_running(&err) => Ok(None),
		Err(err) => Err(anyhow!("daemon RPC shutdown failed: {err}")),
	}
}

fn is_not_running(err: &ClientError) -> bool {
	client::is_not_running_error(err)
}
