//! Dialog tools (spec.md §4.4 "Dialogs"): accept/dismiss the pending
//! `beforeunload`/`alert`/`confirm`/`prompt` via `browsingContext.handleUserPrompt`.

use serde_json::{json, Value};

use crate::error::Result;
use crate::session::Session;
use crate::tools::optional_str;

pub async fn accept(session: &Session, args: Value) -> Result<Value> {
    let context = session.current_context()?;
    let mut params = json!({ "context": context.0, "accept": true });
    if let Some(text) = optional_str(&args, "text") {
        params["userText"] = json!(text);
    }
    session.client().send("browsingContext.handleUserPrompt", params, None).await?;
    Ok(Value::Null)
}

pub async fn dismiss(session: &Session, _args: Value) -> Result<Value> {
    let context = session.current_context()?;
    session
        .client()
        .send("browsingContext.handleUserPrompt", json!({ "context": context.0, "accept": false }), None)
        .await?;
    Ok(Value::Null)
}
