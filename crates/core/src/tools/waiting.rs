//! Waiting tools (spec.md §4.4 "Waiting"): `wait`, `wait_for_url`,
//! `wait_for_text`, `wait_for_fn`, `wait_for_load`, each polling at a fixed
//! interval up to a timeout.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::script::NAMESPACE;
use crate::session::Session;
use crate::tools::discovery::{query_elements, resolve_selector, ResolvedSelector};
use crate::tools::{optional_u64, required_str};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// `wait(selector, state, timeout_ms)`: polls an element's presence/
/// visibility until it reaches `state` (`attached`, `visible`, or `hidden`,
/// default `visible`), per spec.md §4.4's element-state wait.
pub async fn wait(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?.to_string();
    let state = args.get("state").and_then(Value::as_str).unwrap_or("visible").to_string();
    let timeout = optional_u64(&args, "timeout_ms", DEFAULT_WAIT_TIMEOUT_MS);

    poll_until(timeout, || {
        let session = session.clone();
        let selector = selector.clone();
        let state = state.clone();
        async move {
            let context = session.current_context()?;
            let attached_visible = element_attached_and_visible(&session, &context, &selector).await?;
            Ok(match (state.as_str(), attached_visible) {
                ("attached", outcome) => outcome.is_some(),
                ("hidden", outcome) => !matches!(outcome, Some(true)),
                (_, outcome) => matches!(outcome, Some(true)),
            })
        }
    })
    .await?;
    Ok(Value::Null)
}

/// Resolves `selector` in `context` and returns `None` if no element
/// matches (not attached), or `Some(visible)` otherwise.
async fn element_attached_and_visible(
    session: &Session,
    context: &vibium_protocol::types::ContextId,
    selector: &str,
) -> Result<Option<bool>> {
    let handle = match resolve_selector(selector) {
        ResolvedSelector::Ref(alias) => session.registry().resolve_ref(context, &alias).ok().map(|elem| elem.handle),
        _ => query_elements(session, context, selector).await?.into_iter().next().map(|(handle, _, _)| handle),
    };
    let Some(handle) = handle else { return Ok(None) };

    let result = session
        .call_function(context, &format!("(el) => {NAMESPACE}.probe(el).visible"), Some(&handle), Vec::new(), false)
        .await?;
    Ok(Some(result.get("value").and_then(Value::as_bool).unwrap_or(false)))
}

async fn poll_until<F, Fut>(timeout_ms: u64, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if check().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout(Duration::from_millis(timeout_ms)));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Matches `pattern` against the current URL using shell-glob semantics
/// (`*`/`?`), the same matching spec.md §4.4 uses for `route()`.
pub async fn wait_for_url(session: &Session, args: Value) -> Result<Value> {
    let pattern = required_str(&args, "pattern")?.to_string();
    let timeout = optional_u64(&args, "timeout_ms", DEFAULT_WAIT_TIMEOUT_MS);
    let glob_pattern = glob::Pattern::new(&pattern).map_err(|e| Error::Schema(format!("invalid url pattern: {e}")))?;

    poll_until(timeout, || {
        let session = session.clone();
        let glob_pattern = glob_pattern.clone();
        async move {
            let context = session.current_context()?;
            let url = session.registry().context(&context).map(|c| c.url).unwrap_or_default();
            Ok(glob_pattern.matches(&url))
        }
    })
    .await?;
    Ok(Value::Null)
}

/// Case-sensitive substring match against `document.body.innerText`.
pub async fn wait_for_text(session: &Session, args: Value) -> Result<Value> {
    let text = required_str(&args, "text")?.to_string();
    let timeout = optional_u64(&args, "timeout_ms", DEFAULT_WAIT_TIMEOUT_MS);

    poll_until(timeout, || {
        let session = session.clone();
        let text = text.clone();
        async move {
            let context = session.current_context()?;
            let result = session.eval(&context, "document.body ? document.body.innerText : ''", false).await?;
            let body = result.get("value").and_then(Value::as_str).unwrap_or("");
            Ok(body.contains(&text))
        }
    })
    .await?;
    Ok(Value::Null)
}

/// Polls an arbitrary JS expression until it evaluates truthy.
pub async fn wait_for_fn(session: &Session, args: Value) -> Result<Value> {
    let expression = required_str(&args, "expression")?.to_string();
    let timeout = optional_u64(&args, "timeout_ms", DEFAULT_WAIT_TIMEOUT_MS);

    poll_until(timeout, || {
        let session = session.clone();
        let expression = expression.clone();
        async move {
            let context = session.current_context()?;
            let result = session.eval(&context, &format!("!!({expression})"), false).await?;
            Ok(result.get("value").and_then(Value::as_bool).unwrap_or(false))
        }
    })
    .await?;
    Ok(Value::Null)
}

/// Waits for `document.readyState` to reach `state` (default: `"complete"`).
pub async fn wait_for_load(session: &Session, args: Value) -> Result<Value> {
    let state = args.get("state").and_then(Value::as_str).unwrap_or("complete").to_string();
    let timeout = optional_u64(&args, "timeout_ms", DEFAULT_WAIT_TIMEOUT_MS);

    poll_until(timeout, || {
        let session = session.clone();
        let state = state.clone();
        async move {
            let context = session.current_context()?;
            let result = session.eval(&context, "document.readyState", false).await?;
            let ready = result.get("value").and_then(Value::as_str).unwrap_or("");
            Ok(ready == state || (state == "load" && ready == "complete"))
        }
    })
    .await?;
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    #[test]
    fn url_glob_patterns_compile() {
        assert!(glob::Pattern::new("https://example.com/*").is_ok());
    }
}
