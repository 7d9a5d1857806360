//! Locates a BiDi-capable browser binary on disk.
//!
//! Tiered resolution order (env override, then platform-known paths, then
//! `which`):
//! 1. `VIBIUM_BROWSER_BINARY` — explicit override, used as-is.
//! 2. Well-known install locations per platform.
//! 3. `which`/`where` lookup of common binary names.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Error, Result};

const ENV_OVERRIDE: &str = "VIBIUM_BROWSER_BINARY";

/// Chromium-family binary names tried, in order, on the current platform.
#[cfg(target_os = "linux")]
const CANDIDATE_NAMES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "google-chrome-stable"];
#[cfg(target_os = "macos")]
const CANDIDATE_NAMES: &[&str] = &["chromium", "google-chrome"];
#[cfg(target_os = "windows")]
const CANDIDATE_NAMES: &[&str] = &["chrome.exe", "chromium.exe"];

#[cfg(target_os = "macos")]
const APP_BUNDLE_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const COMMON_PATHS: &[&str] = &[
    "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
    "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
];

/// Finds a browser binary, returning its absolute path.
///
/// # Errors
///
/// [`Error::BrowserNotInstalled`] if none of the resolution tiers find a
/// usable binary.
pub fn find_browser_binary() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_OVERRIDE) {
        let path = PathBuf::from(path);
        if binary_is_usable(&path) {
            return Ok(path);
        }
        debug!(target: "vibium::bidi", ?path, "VIBIUM_BROWSER_BINARY set but not usable");
    }

    #[cfg(target_os = "macos")]
    for candidate in APP_BUNDLE_PATHS {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }

    #[cfg(target_os = "windows")]
    for candidate in COMMON_PATHS {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            return Ok(path);
        }
    }

    for name in CANDIDATE_NAMES {
        if let Ok(path) = which::which(name) {
            if binary_is_usable(&path) {
                return Ok(path);
            }
        }
    }

    Err(Error::BrowserNotInstalled(format!(
        "no BiDi-capable browser found; tried {ENV_OVERRIDE} and {CANDIDATE_NAMES:?} on PATH"
    )))
}

/// Spawns `binary --version` and checks it exits cleanly before trusting
/// a discovered path.
fn binary_is_usable(binary: &std::path::Path) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_missing_binary_is_rejected() {
        // SAFETY: test-local env mutation; no other test in this module
        // reads this variable concurrently.
        unsafe { std::env::set_var(ENV_OVERRIDE, "/definitely/not/a/browser") };
        let result = find_browser_binary();
        unsafe { std::env::remove_var(ENV_OVERRIDE) };
        // Either the override is rejected and we fall through to PATH
        // lookup (which may or may not find a real browser in CI), or it
        // surfaces BrowserNotInstalled. Both are acceptable; what matters
        // is we never silently "succeed" with the bogus path.
        if let Ok(path) = result {
            assert_ne!(path, PathBuf::from("/definitely/not/a/browser"));
        }
    }
}
