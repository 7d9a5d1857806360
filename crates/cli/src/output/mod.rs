//! Structured output envelope for all CLI commands.
//!
//! Provides a consistent JSON output format for machine consumption (agent/API usage).
//!
//! ## Output Contract
//!
//! Every command produces a result envelope on stdout:
//!
//! ```json
//! {
//!   "ok": true,
//!   "command": "navigate",
//!   "data": { ... },
//!   "timings": { "duration_ms": 1234 }
//! }
//! ```
//!
//! On failure:
//!
//! ```json
//! {
//!   "ok": false,
//!   "command": "navigate",
//!   "error": {
//!     "code": "timeout",
//!     "message": "timed out after 30s",
//!     "details": { ... }
//!   }
//! }
//! ```

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vibium_protocol::ErrorKind;

/// Current schema version for command output.
///
/// Increment this when making breaking changes to the output structure.
pub const SCHEMA_VERSION: u32 = 1;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// JSON output (default)
	#[default]
	Json,
	/// Newline-delimited JSON (streaming; used by `vibium proxy`)
	Ndjson,
	/// Human-readable text
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			other => Err(format!("unknown output format `{other}`")),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
	pub schema_version: u32,
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
	/// One of [`vibium_protocol::ErrorKind`]'s `snake_case` names.
	pub code: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(d: Duration) -> Self {
		Self { duration_ms: d.as_millis() as u64 }
	}
}

/// Fluent builder for [`CommandResult`], trimmed to the fields this
/// daemon's single-tool-surface output actually needs.
pub struct ResultBuilder {
	command: String,
	data: Option<Value>,
	error: Option<CommandError>,
	started_at: Instant,
}

impl ResultBuilder {
	pub fn new(command: impl Into<String>) -> Self {
		Self { command: command.into(), data: None, error: None, started_at: Instant::now() }
	}

	pub fn data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
		self.error = Some(CommandError { code: kind.as_str().to_string(), message: message.into(), details: None });
		self
	}

	pub fn error_with_details(mut self, kind: ErrorKind, message: impl Into<String>, details: Value) -> Self {
		self.error = Some(CommandError { code: kind.as_str().to_string(), message: message.into(), details: Some(details) });
		self
	}

	pub fn build(self) -> CommandResult {
		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok: self.error.is_none(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(self.started_at.elapsed().into()),
		}
	}
}

/// Builds a [`CommandResult`] from a tool-dispatch outcome, translating a
/// [`crate::error::CliError`] into the wire-level [`ErrorKind`] taxonomy.
pub fn result_from(command: &str, outcome: Result<Value, crate::error::CliError>) -> CommandResult {
	let builder = ResultBuilder::new(command);
	match outcome {
		Ok(data) => builder.data(data).build(),
		Err(err) => builder.error(err.error_kind(), err.to_string()).build(),
	}
}

pub fn print_result(result: &CommandResult, format: OutputFormat) {
	match format {
		OutputFormat::Json | OutputFormat::Ndjson => {
			if let Ok(line) = serde_json::to_string(result) {
				println!("{line}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
	let _ = io::stdout().flush();
}

fn print_result_text(result: &CommandResult) {
	if result.ok {
		println!("{}: ok", result.command);
		if let Some(data) = &result.data {
			println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
		}
	} else if let Some(error) = &result.error {
		eprintln!("{}: error [{}] {}", result.command, error.code, error.message);
	}
}

pub fn print_error_stderr(command: &str, err: &crate::error::CliError) {
	eprintln!("{command}: error [{}] {err}", err.error_kind().as_str());
}
