//! Thin tool-layer wrappers around [`crate::trace::TracingController`]
//! (spec.md §4.4 "Tracing" / §6 trace archive format).

use base64::Engine;
use serde_json::{json, Value};

use crate::error::Result;
use crate::session::Session;
use crate::tools::optional_str;
use crate::trace::{TraceScreenshotFormat, TraceStartOptions};

/// Gathers the viewport size and user agent of the current tab for the
/// trace's `context-options` record (spec.md §4.4), falling back to a null
/// viewport when no tab is open yet rather than failing `trace_start`.
async fn current_context_options(session: &Session) -> Value {
    let Ok(context) = session.current_context() else {
        return json!({ "viewport": Value::Null, "userAgent": Value::Null });
    };
    let expression = "JSON.stringify({ viewport: { width: window.innerWidth, height: window.innerHeight }, userAgent: navigator.userAgent })";
    match session.eval(&context, expression, false).await {
        Ok(result) => {
            let raw = result.get("value").and_then(Value::as_str).unwrap_or("{}");
            serde_json::from_str(raw).unwrap_or_else(|_| json!({ "viewport": Value::Null, "userAgent": Value::Null }))
        }
        Err(_) => json!({ "viewport": Value::Null, "userAgent": Value::Null }),
    }
}

pub async fn trace_start(session: &Session, args: Value) -> Result<Value> {
    let options = TraceStartOptions {
        screenshots: crate::tools::optional_bool(&args, "screenshots", true),
        snapshots: crate::tools::optional_bool(&args, "snapshots", true),
        format: match optional_str(&args, "format") {
            Some("png") => TraceScreenshotFormat::Png,
            _ => TraceScreenshotFormat::Jpeg,
        },
        quality: args.get("quality").and_then(Value::as_u64).map(|q| q as u8),
        name: optional_str(&args, "name").map(str::to_string),
    };
    let context_options = current_context_options(session).await;
    session.trace().start(options, context_options)?;
    Ok(Value::Null)
}

pub async fn trace_stop(session: &Session, _args: Value) -> Result<Value> {
    let archive = session.trace().stop()?;
    Ok(json!(base64::engine::general_purpose::STANDARD.encode(archive)))
}

pub async fn trace_start_chunk(session: &Session, args: Value) -> Result<Value> {
    let name = optional_str(&args, "name").map(str::to_string);
    session.trace().start_chunk(name)?;
    Ok(Value::Null)
}

pub async fn trace_stop_chunk(session: &Session, _args: Value) -> Result<Value> {
    let archive = session.trace().stop_chunk()?;
    Ok(json!(base64::engine::general_purpose::STANDARD.encode(archive)))
}
