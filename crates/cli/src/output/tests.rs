use serde_json::json;
use vibium_protocol::ErrorKind;

use super::*;

#[test]
fn result_builder_success() {
	let result = ResultBuilder::new("navigate").data(json!({ "url": "https://example.com" })).build();

	assert!(result.ok);
	assert_eq!(result.command, "navigate");
	assert!(result.data.is_some());
	assert!(result.error.is_none());
}

#[test]
fn result_builder_error() {
	let result = ResultBuilder::new("navigate").error(ErrorKind::Timeout, "timed out after 30s").build();

	assert!(!result.ok);
	assert!(result.data.is_none());
	let error = result.error.unwrap();
	assert_eq!(error.code, "timeout");
	assert_eq!(error.message, "timed out after 30s");
}

#[test]
fn output_format_parses_from_str() {
	assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
	assert_eq!("ndjson".parse::<OutputFormat>().unwrap(), OutputFormat::Ndjson);
	assert!("bogus".parse::<OutputFormat>().is_err());
}
