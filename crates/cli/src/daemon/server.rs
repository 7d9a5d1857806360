//! The daemon process: one [`vibium_core::Session`] behind a jsonrpsee RPC
//! server (spec.md §4.5). This daemon owns exactly one browser for its
//! whole lifetime rather than leasing browsers out of a pool — spec.md's
//! single-session model has no multi-tenant lease to track, so `Daemon` is
//! a thin wrapper around `Session` plus the idle timer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use jsonrpsee::core::{RpcResult, async_trait};
use jsonrpsee::server::ServerBuilder;
use jsonrpsee::types::error::ErrorObjectOwned;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{info, warn};
use vibium_bidi::{Client, LaunchOptions};
use vibium_core::Session;

use super::DAEMON_TCP_PORT;
use super::rpc::{DaemonStatus, VibiumRpcServer};
use crate::config::DaemonConfig;

const RPC_TOOL_FAILED: i32 = -32050;
const RPC_SHUTDOWN_FAILED: i32 = -32051;

/// How often the idle-timeout loop polls [`Session::idle_for_ms`]
/// (spec.md §4.5 "idle timeout").
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Counts in-flight `browser_call`/`daemon_status` requests. jsonrpsee's
/// `HttpClient` is stateless per-request, so there is no socket-level
/// connection to track; this is the closest analogue to "a client is
/// connected" the transport affords (SPEC_FULL.md §4.5).
#[derive(Clone, Default)]
struct ConnectedClients(Arc<AtomicU32>);

impl ConnectedClients {
	fn enter(&self) -> ConnectedClientGuard {
		self.0.fetch_add(1, Ordering::SeqCst);
		ConnectedClientGuard(self.0.clone())
	}

	fn count(&self) -> u32 {
		self.0.load(Ordering::SeqCst)
	}
}

struct ConnectedClientGuard(Arc<AtomicU32>);

impl Drop for ConnectedClientGuard {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

struct VibiumRpcHandler {
	session: Session,
	shutdown_tx: watch::Sender<bool>,
	addr: String,
	connected_clients: ConnectedClients,
}

#[async_trait]
impl VibiumRpcServer for VibiumRpcHandler {
	async fn ping(&self) -> RpcResult<bool> {
		Ok(true)
	}

	async fn status(&self) -> RpcResult<DaemonStatus> {
		let _guard = self.connected_clients.enter();
		let current_url = match self.session.current_context() {
			Ok(context) => self.session.eval(&context, "location.href", false).await.ok().and_then(|v| v.get("value").and_then(Value::as_str).map(str::to_string)),
			Err(_) => None,
		};
		Ok(DaemonStatus {
			version: vibium_core::SERVER_VERSION.to_string(),
			pid: std::process::id(),
			uptime_ms: self.session.uptime_ms(),
			idle_ms: self.session.idle_for_ms(),
			socket_path: self.addr.clone(),
			connected_clients: self.connected_clients.count(),
			current_url,
		})
	}

	async fn call_tool(&self, name: String, args: Value) -> RpcResult<Value> {
		let _guard = self.connected_clients.enter();
		vibium_core::dispatch(&self.session, &name, args).await.map_err(|err| rpc_error(RPC_TOOL_FAILED, anyhow!(err)))
	}

	async fn shutdown(&self) -> RpcResult<()> {
		self.session.shutdown().await.map_err(|err| rpc_error(RPC_SHUTDOWN_FAILED, anyhow!(err)))?;
		let _ = self.shutdown_tx.send(true);
		Ok(())
	}
}

pub struct Daemon {
	session: Session,
	config: DaemonConfig,
	shutdown_tx: watch::Sender<bool>,
	shutdown_rx: watch::Receiver<bool>,
}

impl Daemon {
	/// Launches (or attaches to, per `VIBIUM_CONNECT_URL`) the one browser
	/// this daemon manages for its lifetime (spec.md §4.2/§4.5).
	pub async fn start(config: DaemonConfig) -> Result<Self> {
		let client = match &config.connect_url {
			Some(url) => {
				let headers = config
					.connect_api_key
					.as_ref()
					.map(|key| vec![("Authorization".to_string(), format!("Bearer {key}"))])
					.unwrap_or_default();
				Client::attach(url.clone(), &headers).await.map_err(|e| anyhow!(e.to_string()))?
			}
			None => {
				let options = LaunchOptions { headless: config.headless, ..Default::default() };
				Client::launch(options).await.map_err(|e| anyhow!(e.to_string()))?
			}
		};
		let session = Session::with_route_grace(client, config.route_grace_ms);
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		Ok(Self { session, config, shutdown_tx, shutdown_rx })
	}

	pub async fn run(mut self) -> Result<()> {
		let addr = format!("127.0.0.1:{}", DAEMON_TCP_PORT);
		let server = ServerBuilder::default().build(&addr).await.with_context(|| format!("failed to bind daemon RPC server: {addr}"))?;

		let connected_clients = ConnectedClients::default();
		let rpc = VibiumRpcHandler {
			session: self.session.clone(),
			shutdown_tx: self.shutdown_tx.clone(),
			addr: addr.clone(),
			connected_clients: connected_clients.clone(),
		};
		let handle = server.start(rpc.into_rpc());
		info!(target: "vibium::daemon", addr = %addr, pid = std::process::id(), "daemon listening");

		self.write_status_file(&addr)?;
		self.spawn_idle_timer(connected_clients);
		self.spawn_transport_watcher();

		#[cfg(unix)]
		{
			use tokio::signal::unix::{SignalKind, signal};

			let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
			let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

			loop {
				tokio::select! {
					_ = self.shutdown_rx.changed() => {
						if *self.shutdown_rx.borrow() {
							info!(target: "vibium::daemon", "shutdown requested via RPC or idle timeout");
							break;
						}
					}
					_ = sigterm.recv() => {
						info!(target: "vibium::daemon", "received SIGTERM, shutting down");
						break;
					}
					_ = sigint.recv() => {
						info!(target: "vibium::daemon", "received SIGINT, shutting down");
						break;
					}
				}
			}
		}

		#[cfg(windows)]
		{
			loop {
				tokio::select! {
					_ = self.shutdown_rx.changed() => {
						if *self.shutdown_rx.borrow() {
							info!(target: "vibium::daemon", "shutdown requested via RPC or idle timeout");
							break;
						}
					}
					_ = tokio::signal::ctrl_c() => {
						info!(target: "vibium::daemon", "received Ctrl+C, shutting down");
						break;
					}
				}
			}
		}

		let _ = self.session.shutdown().await;
		self.remove_status_file();
		let _ = handle.stop();
		handle.stopped().await;
		Ok(())
	}

	fn write_status_file(&self, addr: &str) -> Result<()> {
		crate::paths::ensure_runtime_dir()?;
		let status = json!({
			"pid": std::process::id(),
			"addr": addr,
			"version": vibium_core::SERVER_VERSION,
		});
		let tmp = crate::paths::status_file().with_extension("tmp");
		std::fs::write(&tmp, serde_json::to_vec_pretty(&status)?)?;
		std::fs::rename(&tmp, crate::paths::status_file())?;
		std::fs::write(crate::paths::pid_file(), std::process::id().to_string())?;
		Ok(())
	}

	fn remove_status_file(&self) {
		let _ = std::fs::remove_file(crate::paths::status_file());
		let _ = std::fs::remove_file(crate::paths::pid_file());
	}

	/// Polls the session's idle clock and triggers shutdown once it exceeds
	/// `config.idle_timeout` *and* no request is in flight (spec.md §4.5,
	/// SPEC_FULL.md §8 testable property #5). `VIBIUM_ONESHOT` shortens the
	/// idle threshold to one check interval, matching a single
	/// request/response client that disconnects immediately after.
	fn spawn_idle_timer(&self, connected_clients: ConnectedClients) {
		let session = self.session.clone();
		let shutdown_tx = self.shutdown_tx.clone();
		let idle_timeout_ms = self.config.idle_timeout.as_millis() as u64;
		let oneshot = self.config.oneshot;
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(IDLE_CHECK_INTERVAL);
			loop {
				interval.tick().await;
				let idle = session.idle_for_ms();
				let threshold = if oneshot { IDLE_CHECK_INTERVAL.as_millis() as u64 } else { idle_timeout_ms };
				if idle >= threshold && connected_clients.count() == 0 {
					warn!(target: "vibium::daemon", idle_ms = idle, "idle timeout reached with no client connected, shutting down");
					let _ = shutdown_tx.send(true);
					break;
				}
			}
		});
	}

	/// Watches the BiDi connection and triggers shutdown if it dies out from
	/// under the daemon (spec.md §7: "transport loss against the browser
	/// triggers daemon shutdown; the daemon does not attempt to relaunch").
	fn spawn_transport_watcher(&self) {
		let session = self.session.clone();
		let shutdown_tx = self.shutdown_tx.clone();
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(IDLE_CHECK_INTERVAL);
			loop {
				interval.tick().await;
				if session.client().is_closed() {
					warn!(target: "vibium::daemon", "BiDi transport lost, shutting down");
					let _ = shutdown_tx.send(true);
					break;
				}
			}
		});
	}
}

fn rpc_error(rpc_code: i32, err: anyhow::Error) -> ErrorObjectOwned {
	ErrorObjectOwned::owned(rpc_code, err.to_string(), None::<()>)
}
