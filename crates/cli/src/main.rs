mod cli;
mod config;
mod daemon;
mod error;
mod logging;
mod output;
mod paths;
mod proxy;
mod styles;

use clap::Parser;

use cli::{Cli, Command, DaemonCommand};
use error::CliError;
use output::{print_error_stderr, print_result, result_from, OutputFormat};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	if let Err(err) = run(cli).await {
		print_error_stderr("vibium", &err);
		if format != OutputFormat::Text {
			print_result(&result_from("vibium", Err(err.clone_display())), format);
		}
		std::process::exit(err.exit_code());
	}
}

impl CliError {
	/// `thiserror` variants here don't derive `Clone` (jsonrpsee's error
	/// type doesn't), so the top-level error path re-renders via `Display`
	/// into a fresh, reportable variant instead of cloning the original.
	fn clone_display(&self) -> CliError {
		CliError::Anyhow(anyhow::anyhow!(self.to_string()))
	}
}

async fn run(cli: Cli) -> error::Result<()> {
	let format = cli.format;
	match cli.command {
		Command::Daemon(DaemonCommand::Start { background }) => daemon_start(background).await,
		Command::Daemon(DaemonCommand::Stop) => daemon_stop(format).await,
		Command::Daemon(DaemonCommand::Status) => daemon_status(format).await,
		Command::Call { tool, args, json } => call_tool(&tool, &args, json.as_deref(), format).await,
		Command::Proxy => run_proxy().await,
	}
}

async fn daemon_start(background: bool) -> error::Result<()> {
	if background {
		daemon::spawn_and_wait().await.map_err(CliError::Anyhow)?;
		return Ok(());
	}
	let config = config::DaemonConfig::from_env();
	let server = daemon::Daemon::start(config).await.map_err(CliError::Anyhow)?;
	server.run().await.map_err(CliError::Anyhow)
}

async fn daemon_stop(format: OutputFormat) -> error::Result<()> {
	let stopped = daemon::shutdown().await.map_err(CliError::Anyhow)?;
	print_result(&result_from("daemon stop", Ok(serde_json::json!({ "stopped": stopped.is_some() }))), format);
	Ok(())
}

async fn daemon_status(format: OutputFormat) -> error::Result<()> {
	let status = daemon::status().await.map_err(CliError::Anyhow)?;
	let data = match status {
		Some(status) => serde_json::json!({ "running": true, "status": status }),
		None => serde_json::json!({ "running": false }),
	};
	print_result(&result_from("daemon status", Ok(data)), format);
	Ok(())
}

async fn call_tool(tool: &str, args: &[String], json: Option<&str>, format: OutputFormat) -> error::Result<()> {
	let args = cli::args_to_json(args, json).map_err(CliError::Anyhow)?;
	let outcome = call_tool_via_daemon(tool, args).await;
	print_result(&result_from(tool, outcome), format);
	Ok(())
}

/// Connects (auto-starting if needed) and dispatches one tool call,
/// reporting any failure from either step against the tool's own name
/// rather than letting it surface as a bare top-level `vibium` error.
async fn call_tool_via_daemon(tool: &str, args: serde_json::Value) -> Result<serde_json::Value, CliError> {
	let client = daemon::connect_or_start().await.map_err(CliError::Anyhow)?;
	client.call_tool(tool, args).await.map_err(CliError::Anyhow)
}

async fn run_proxy() -> error::Result<()> {
	let config = config::DaemonConfig::from_env();
	let router = proxy::Router::bind(&config).await.map_err(CliError::Anyhow)?;
	router.run().await.map_err(CliError::Anyhow)
}
