//! Navigation tools (spec.md §4.4 "Navigation").

use serde_json::{json, Value};

use crate::error::Result;
use crate::session::Session;
use crate::tools::{optional_u64, required_str};

const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

pub async fn navigate(session: &Session, args: Value) -> Result<Value> {
    let url = required_str(&args, "url")?;
    let context = session.current_context()?;
    let wait = args.get("wait_until").and_then(Value::as_str).unwrap_or("load");
    session
        .client()
        .send(
            "browsingContext.navigate",
            json!({ "context": context.0, "url": url, "wait": wait }),
            Some(std::time::Duration::from_millis(optional_u64(&args, "timeout_ms", DEFAULT_NAV_TIMEOUT_MS))),
        )
        .await?;
    Ok(Value::Null)
}

pub async fn back(session: &Session) -> Result<Value> {
    traverse(session, "browsingContext.traverseHistory", -1).await
}

pub async fn forward(session: &Session) -> Result<Value> {
    traverse(session, "browsingContext.traverseHistory", 1).await
}

async fn traverse(session: &Session, method: &str, delta: i64) -> Result<Value> {
    let context = session.current_context()?;
    session.client().send(method, json!({ "context": context.0, "delta": delta }), None).await?;
    Ok(Value::Null)
}

pub async fn reload(session: &Session) -> Result<Value> {
    let context = session.current_context()?;
    session.client().send("browsingContext.reload", json!({ "context": context.0, "wait": "load" }), None).await?;
    Ok(Value::Null)
}

pub async fn get_url(session: &Session) -> Result<Value> {
    let context = session.current_context()?;
    let ctx = session.registry().context(&context).ok_or_else(|| crate::error::Error::NotFound("current context closed".into()))?;
    Ok(json!(ctx.url))
}

pub async fn get_title(session: &Session) -> Result<Value> {
    let context = session.current_context()?;
    let title = session.eval(&context, "document.title", false).await?;
    Ok(json!(title.get("value").cloned().unwrap_or(Value::Null)))
}

/// Replaces the document via `document.open/write/close`, the DOM-level
/// equivalent of navigating to a data URL without a real navigation event.
pub async fn set_content(session: &Session, args: Value) -> Result<Value> {
    let html = required_str(&args, "html")?;
    let context = session.current_context()?;
    let expression = format!(
        "(() => {{ document.open(); document.write({}); document.close(); }})()",
        serde_json::to_string(html).unwrap()
    );
    session.eval(&context, &expression, false).await?;
    Ok(Value::Null)
}
