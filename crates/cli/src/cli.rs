//! Clap surface: `vibium daemon {start,stop,status}`, `vibium call <tool>`,
//! and `vibium proxy` (spec.md §4.5/§4.6/§4.7) — the one thing this
//! daemon's narrower, single-session tool surface needs: a way to name a
//! tool and pass it arguments.

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "vibium")]
#[command(about = "Session daemon and CLI for BiDi browser automation")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Manage the session daemon.
	#[command(subcommand)]
	Daemon(DaemonCommand),

	/// Invoke one tool against the running (or auto-started) daemon.
	Call {
		/// Tool name, e.g. `navigate`, `click`, `screenshot` (see
		/// `vibium_core::TOOL_NAMES` for the full catalog).
		tool: String,

		/// Argument as `key=value`; repeatable. Values are parsed as JSON
		/// when possible, else kept as a string.
		#[arg(long = "arg", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
		args: Vec<String>,

		/// Raw JSON object of arguments, merged over `--arg` entries.
		#[arg(long, value_name = "JSON")]
		json: Option<String>,
	},

	/// Run the stdio proxy/pipe front-end (spec.md §4.7), bypassing the
	/// daemon entirely — binds one browser directly to this process's
	/// stdin/stdout.
	Proxy,
}

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
	/// Start the daemon. Runs in the foreground unless `--background`.
	Start {
		#[arg(long)]
		background: bool,
	},
	/// Request a clean shutdown of the running daemon.
	Stop,
	/// Report whether the daemon is running and its current state.
	Status,
}

/// Parses `--arg key=value` pairs into a JSON object, used by `call`.
pub fn args_to_json(pairs: &[String], json_override: Option<&str>) -> anyhow::Result<serde_json::Value> {
	let mut map = serde_json::Map::new();
	for pair in pairs {
		let (key, value) = pair.split_once('=').ok_or_else(|| anyhow::anyhow!("invalid --arg `{pair}`, expected key=value"))?;
		let parsed = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
		map.insert(key.to_string(), parsed);
	}
	let mut value = serde_json::Value::Object(map);
	if let Some(raw) = json_override {
		let overrides: serde_json::Value = serde_json::from_str(raw)?;
		if let (Some(base), Some(extra)) = (value.as_object_mut(), overrides.as_object()) {
			for (k, v) in extra {
				base.insert(k.clone(), v.clone());
			}
		}
	}
	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn args_to_json_parses_pairs() {
		let value = args_to_json(&["url=https://example.com".to_string(), "full_page=true".to_string()], None).unwrap();
		assert_eq!(value["url"], "https://example.com");
		assert_eq!(value["full_page"], true);
	}

	#[test]
	fn args_to_json_rejects_missing_equals() {
		assert!(args_to_json(&["bogus".to_string()], None).is_err());
	}

	#[test]
	fn json_override_merges_over_pairs() {
		let value = args_to_json(&["url=a".to_string()], Some(r#"{"url":"b","extra":1}"#)).unwrap();
		assert_eq!(value["url"], "b");
		assert_eq!(value["extra"], 1);
	}
}
