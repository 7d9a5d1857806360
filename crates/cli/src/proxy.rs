//! Pipe/proxy front-end (spec.md §4.7): makes one browser session
//! addressable over inherited stdio instead of the daemon's IPC endpoint,
//! for bindings that prefer fork-exec to naming a socket. Reads
//! newline-delimited JSON requests from stdin, writes responses/events to
//! stdout, and forwards diagnostics to stderr via `tracing`. Uses the same
//! `{id,method,params}` / `{id,ok,result|error}` / `{method,params}` wire
//! types the daemon's own IPC transport defines (spec.md §4.5/§4.7 share
//! one wire format).

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use vibium_bidi::{Client, LaunchOptions};
use vibium_core::Session;
use vibium_protocol::ipc::{IpcEvent, IpcRequest, IpcResponse};

use crate::config::DaemonConfig;

/// Binds one stdio client to one browser and routes messages until stdin
/// closes or the process is signaled (spec.md §4.7).
pub struct Router {
	session: Session,
}

impl Router {
	pub async fn bind(config: &DaemonConfig) -> anyhow::Result<Self> {
		let client = match &config.connect_url {
			Some(url) => {
				let headers = config
					.connect_api_key
					.as_ref()
					.map(|key| vec![("Authorization".to_string(), format!("Bearer {key}"))])
					.unwrap_or_default();
				Client::attach(url.clone(), &headers).await?
			}
			None => Client::launch(LaunchOptions { headless: config.headless, ..Default::default() }).await?,
		};
		Ok(Self { session: Session::with_route_grace(client, config.route_grace_ms) })
	}

	/// Runs the router to completion: emits `vibium:ready`, then reads one
	/// stdin line per loop iteration and dispatches it on its own task,
	/// forwarding BiDi events to stdout concurrently, until stdin hits EOF
	/// or a shutdown signal arrives.
	pub async fn run(self) -> anyhow::Result<()> {
		let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
		self.spawn_event_forwarder(Arc::clone(&stdout));

		write_line(&stdout, &IpcEvent { method: "vibium:ready".to_string(), params: serde_json::json!({}) }).await?;

		let stdin = tokio::io::stdin();
		let mut lines = BufReader::new(stdin).lines();

		#[cfg(unix)]
		let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

		loop {
			#[cfg(unix)]
			let next_line = tokio::select! {
				line = lines.next_line() => line,
				_ = sigterm.recv() => {
					debug!(target: "vibium::proxy", "received SIGTERM, closing");
					break;
				}
			};
			#[cfg(not(unix))]
			let next_line = lines.next_line().await;

			let Some(line) = next_line? else {
				debug!(target: "vibium::proxy", "stdin closed, shutting down");
				break;
			};
			if line.trim().is_empty() {
				continue;
			}

			let stdout = Arc::clone(&stdout);
			let session = self.session.clone();
			tokio::spawn(async move {
				let response = handle_line(&session, &line).await;
				if let Err(err) = write_line(&stdout, &response).await {
					warn!(target: "vibium::proxy", error = %err, "failed writing response");
				}
			});
		}

		let _ = self.session.shutdown().await;
		Ok(())
	}

	/// Feeds every BiDi event the session's client is subscribed to back to
	/// stdout as a no-`id` [`IpcEvent`] (spec.md §4.7 "routed tool calls or
	/// verbatim BiDi commands").
	fn spawn_event_forwarder(&self, stdout: Arc<Mutex<tokio::io::Stdout>>) {
		let mut events = self.session.client().subscribe("");
		tokio::spawn(async move {
			while let Some(event) = events.recv().await {
				let method = event.get("method").and_then(Value::as_str).unwrap_or("unknown").to_string();
				let params = event.get("params").cloned().unwrap_or(Value::Null);
				if write_line(&stdout, &IpcEvent { method, params }).await.is_err() {
					break;
				}
			}
		});
	}
}

async fn handle_line(session: &Session, line: &str) -> IpcResponse {
	let request: IpcRequest = match serde_json::from_str(line) {
		Ok(req) => req,
		Err(err) => return IpcResponse::err(0, vibium_protocol::ErrorKind::Schema, err.to_string()),
	};

	// A method containing a dot (e.g. `browsingContext.navigate`) is a
	// verbatim BiDi command the client chose to send directly, bypassing
	// the tool layer (spec.md §4.7).
	let outcome = if request.method.contains('.') {
		session.client().send(&request.method, request.params, None).await.map_err(vibium_core::Error::from)
	} else {
		vibium_core::dispatch(session, &request.method, request.params).await
	};

	match outcome {
		Ok(result) => IpcResponse::ok(request.id, result),
		Err(err) => IpcResponse::err(request.id, err.kind(), err.to_string()),
	}
}

async fn write_line<T: serde::Serialize>(stdout: &Arc<Mutex<tokio::io::Stdout>>, value: &T) -> anyhow::Result<()> {
	let mut line = serde_json::to_string(value)?;
	line.push('\n');
	let mut stdout = stdout.lock().await;
	stdout.write_all(line.as_bytes()).await?;
	stdout.flush().await?;
	Ok(())
}
