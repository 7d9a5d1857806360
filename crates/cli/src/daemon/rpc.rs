//! The daemon's RPC surface (spec.md §4.5 "Daemon protocol"). One browser
//! session per daemon, so unlike a pool that leases browsers out by port,
//! this trait has exactly one tool-dispatch method plus status/lifecycle —
//! every tool name in `vibium_core::TOOL_NAMES` goes through `call_tool`
//! rather than one hand-written RPC method per tool.

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
	pub version: String,
	pub pid: u32,
	pub uptime_ms: u64,
	pub idle_ms: u64,
	/// The loopback address the RPC server listens on (`127.0.0.1:<port>`),
	/// kept under this name for continuity with spec.md's status schema
	/// even though this daemon has no socket file.
	pub socket_path: String,
	/// In-flight `browser_call`/`daemon_status` requests, not open
	/// connections — jsonrpsee's HTTP transport has no persistent
	/// per-client connection to count.
	pub connected_clients: u32,
	pub current_url: Option<String>,
}

#[rpc(client, server)]
pub trait VibiumRpc {
	/// Liveness probe used by [`super::client::connect_probe_client`] before
	/// the caller commits to the normal-timeout client.
	#[method(name = "daemon_ping")]
	async fn ping(&self) -> RpcResult<bool>;

	#[method(name = "daemon_status")]
	async fn status(&self) -> RpcResult<DaemonStatus>;

	/// Dispatches one tool call by name (spec.md §4.4's tool catalog),
	/// forwarding `args` verbatim to `vibium_core::dispatch`.
	#[method(name = "browser_call")]
	async fn call_tool(&self, name: String, args: Value) -> RpcResult<Value>;

	#[method(name = "daemon_shutdown")]
	async fn shutdown(&self) -> RpcResult<()>;
}
