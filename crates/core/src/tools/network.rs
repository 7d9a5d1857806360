//! Network tools (spec.md §4.4 "Network"): `route`/`unroute`, intercepting
//! requests matching a URL glob and continuing/aborting/fulfilling them via
//! BiDi's `network.addIntercept`/`network.continueRequest` family.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::tools::required_str;
use vibium_protocol::types::RouteAction;

/// Default bound on how long the event pump waits for [`resolve_intercept`]
/// before giving up on a registered route, per the Open Question in
/// SPEC_FULL.md §4.4 (resolved in favor of a bounded wait rather than
/// blocking network delivery indefinitely on a slow route resolution).
/// Overridden per-session by `VIBIUM_ROUTE_GRACE_MS` (see `Session::new`).
pub const DEFAULT_ROUTE_GRACE_MS: u64 = 500;

pub async fn route(session: &Session, args: Value) -> Result<Value> {
    let pattern = required_str(&args, "pattern")?;
    let action: RouteAction = serde_json::from_value(args.get("action").cloned().unwrap_or(json!({ "type": "continue" })))
        .map_err(|e| Error::Schema(format!("invalid route action: {e}")))?;

    let intercept = session
        .client()
        .send(
            "network.addIntercept",
            json!({ "phases": ["beforeRequestSent"], "urlPatterns": [{ "type": "pattern", "pattern": pattern }] }),
            None,
        )
        .await?;
    let intercept_id = intercept.get("intercept").and_then(Value::as_str).unwrap_or_default();

    session.registry().register_route(pattern, intercept_id, action);
    Ok(json!({ "intercept": intercept_id }))
}

pub async fn unroute(session: &Session, args: Value) -> Result<Value> {
    let pattern = required_str(&args, "pattern")?;
    if let Some(intercept_id) = session.registry().unregister_route(pattern) {
        session
            .client()
            .send("network.removeIntercept", json!({ "intercept": intercept_id }), None)
            .await?;
    }
    Ok(Value::Null)
}

/// Applies a registered route's action once a `network.beforeRequestSent`
/// event names a matching intercept, called from the session's event pump
/// rather than the tool layer directly (matching spec.md §4.3's "events
/// drive the registry" split between discovery and reaction).
pub async fn resolve_intercept(session: &Session, request_id: &str, action: &RouteAction) -> Result<()> {
    match action {
        RouteAction::Continue => {
            session.client().send("network.continueRequest", json!({ "request": request_id }), None).await?;
        }
        RouteAction::Abort => {
            session.client().send("network.failRequest", json!({ "request": request_id }), None).await?;
        }
        RouteAction::Fulfill { status, headers, body } => {
            session
                .client()
                .send(
                    "network.provideResponse",
                    json!({
                        "request": request_id,
                        "statusCode": status,
                        "headers": headers,
                        "body": { "type": "string", "value": body },
                    }),
                    None,
                )
                .await?;
        }
    }
    Ok(())
}
