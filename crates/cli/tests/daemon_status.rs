//! Subprocess-level smoke tests for `vibium daemon status`/`--help`, run
//! against the built binary rather than a browser — no browser binary or
//! network access required, matching what CI can run unconditionally.

use std::path::PathBuf;
use std::process::Command;

fn vibium_binary() -> PathBuf {
	let mut path = std::env::current_exe().unwrap();
	path.pop();
	if path.ends_with("deps") {
		path.pop();
	}
	path.push("vibium");
	path
}

fn run(args: &[&str]) -> (bool, String, String) {
	let runtime_dir = std::env::temp_dir().join("vibium-cli-tests");
	let _ = std::fs::create_dir_all(&runtime_dir);
	let output = Command::new(vibium_binary()).args(args).env("XDG_RUNTIME_DIR", &runtime_dir).output().expect("failed to spawn vibium binary");
	(output.status.success(), String::from_utf8_lossy(&output.stdout).to_string(), String::from_utf8_lossy(&output.stderr).to_string())
}

#[test]
fn help_lists_subcommands() {
	let (ok, stdout, _) = run(&["--help"]);
	assert!(ok);
	assert!(stdout.contains("daemon"));
	assert!(stdout.contains("call"));
	assert!(stdout.contains("proxy"));
}

#[test]
fn status_reports_not_running_with_no_daemon() {
	let (ok, stdout, _) = run(&["daemon", "status"]);
	assert!(ok, "daemon status should exit 0 even when nothing is running");
	let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("daemon status prints one JSON line");
	assert_eq!(value["ok"], true);
	assert_eq!(value["data"]["running"], false);
}

#[test]
fn stop_is_a_no_op_with_no_daemon() {
	let (ok, stdout, _) = run(&["daemon", "stop"]);
	assert!(ok);
	let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("daemon stop prints one JSON line");
	assert_eq!(value["data"]["stopped"], false);
}

#[test]
fn call_without_a_daemon_auto_starts_or_reports_a_tool_error_cleanly() {
	// No browser binary is guaranteed to exist in a CI sandbox, so this
	// asserts the failure mode is a clean structured error rather than a
	// panic or a hang, not that the tool call itself succeeds.
	let (_, stdout, _) = run(&["call", "get_url"]);
	let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("call prints one JSON line even on failure");
	assert_eq!(value["command"], "get_url");
}
