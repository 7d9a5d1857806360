//! Daemon RPC client plumbing, plus the auto-start sequence (spec.md §4.6):
//! dial, and on failure clean up a stale PID file and spawn a detached
//! daemon process, then poll with exponential backoff before retrying.

use std::io::ErrorKind;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};

use super::DAEMON_TCP_PORT;

const DAEMON_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Auto-start polling backoff (spec.md §4.6): starts at 50ms, doubles each
/// attempt, caps at 500ms per step, bounded at 5s total.
const AUTO_START_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const AUTO_START_MAX_BACKOFF: Duration = Duration::from_millis(500);
const AUTO_START_DEADLINE: Duration = Duration::from_secs(5);

pub(crate) fn daemon_endpoint_url() -> String {
	format!("http://127.0.0.1:{DAEMON_TCP_PORT}")
}

pub(crate) fn connect_client() -> Result<HttpClient> {
	build_client(None)
}

pub(crate) fn connect_probe_client() -> Result<HttpClient> {
	build_client(Some(DAEMON_PROBE_TIMEOUT))
}

fn build_client(request_timeout: Option<Duration>) -> Result<HttpClient> {
	let mut builder = HttpClientBuilder::default();
	if let Some(timeout) = request_timeout {
		builder = builder.request_timeout(timeout);
	}
	builder.build(daemon_endpoint_url()).context("failed to create daemon RPC client")
}

pub(crate) fn is_not_running_error(err: &ClientError) -> bool {
	if matches!(err, ClientError::RestartNeeded(_) | ClientError::RequestTimeout | ClientError::ParseError(_)) {
		return true;
	}

	if let ClientError::Transport(transport_err) = err {
		if let Some(io_err) = transport_err.downcast_ref::<std::io::Error>() {
			if matches!(
				io_err.kind(),
				ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::NotConnected | ErrorKind::TimedOut
			) {
				return true;
			}
		}
	}

	let msg = err.to_string().to_ascii_lowercase();
	msg.contains("connection refused")
		|| msg.contains("connection reset")
		|| msg.contains("error trying to connect")
		|| msg.contains("dns error")
		|| msg.contains("tcp connect error")
		|| msg.contains("request timeout")
		|| msg.contains("connection closed before message completed")
}

/// Removes a PID file whose process is no longer alive. A live PID that
/// isn't answering RPC at all is left alone — it may just be mid-startup.
fn clean_stale_pid_file() {
	let pid_path = crate::paths::pid_file();
	let Ok(contents) = std::fs::read_to_string(&pid_path) else { return };
	let Ok(pid) = contents.trim().parse::<u32>() else {
		let _ = std::fs::remove_file(&pid_path);
		return;
	};
	if !process_is_alive(pid) {
		let _ = std::fs::remove_file(&pid_path);
		let _ = std::fs::remove_file(crate::paths::status_file());
	}
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
	// Signal 0 performs no action but still validates the pid exists and is
	// owned by this user (std has no direct kill() wrapper).
	std::process::Command::new("kill").arg("-0").arg(pid.to_string()).status().map(|s| s.success()).unwrap_or(false)
}

#[cfg(windows)]
fn process_is_alive(pid: u32) -> bool {
	std::process::Command::new("tasklist")
		.args(["/FI", &format!("PID eq {pid}"), "/NH"])
		.output()
		.map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
		.unwrap_or(false)
}

/// Spawns a detached `daemon start` process and polls until it answers
/// `daemon_ping`, per spec.md §4.6's auto-start sequence.
pub async fn spawn_and_wait() -> Result<()> {
	clean_stale_pid_file();

	let exe = std::env::current_exe().context("failed to get executable path")?;
	std::process::Command::new(&exe)
		.arg("daemon")
		.arg("start")
		.stdin(std::process::Stdio::null())
		.stdout(std::process::Stdio::null())
		.stderr(std::process::Stdio::null())
		.spawn()
		.context("failed to spawn daemon process")?;

	let deadline = tokio::time::Instant::now() + AUTO_START_DEADLINE;
	let mut backoff = AUTO_START_INITIAL_BACKOFF;
	loop {
		if tokio::time::Instant::now() >= deadline {
			return Err(anyhow!("daemon did not become ready within {:?}", AUTO_START_DEADLINE));
		}
		tokio::time::sleep(backoff).await;
		if let Ok(probe) = connect_probe_client() {
			use super::rpc::VibiumRpcClient as _;
			if probe.ping().await.unwrap_or(false) {
				return Ok(());
			}
		}
		backoff = (backoff * 2).min(AUTO_START_MAX_BACKOFF);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_timeout_is_not_running() {
		assert!(is_not_running_error(&ClientError::RequestTimeout));
	}

	#[test]
	fn transport_connection_refused_is_not_running() {
		let err = ClientError::Transport(Box::new(std::io::Error::new(ErrorKind::ConnectionRefused, "refused")));
		assert!(is_not_running_error(&err));
	}
}
