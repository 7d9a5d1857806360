//! Capture tools (spec.md §4.4 "Capture"): `screenshot` (viewport or full
//! page, optionally annotated with the current page map) and `pdf`.

use base64::Engine;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::tools::optional_bool;

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| Error::Protocol(format!("browser returned invalid base64 image data: {e}")))
}

/// Overlays each page-map element's alias as a numbered label, the
/// "annotate" mode spec.md §4.4 pairs with `map()` for LLM-driven sessions.
async fn annotate(session: &Session, context: &vibium_protocol::types::ContextId, png: Vec<u8>) -> Result<Vec<u8>> {
    let refs = session.registry().page_map(context);
    if refs.is_empty() {
        return Ok(png);
    }
    // Annotation draws boxes/labels client-side in the browser before the
    // actual capture command runs, so by the time we get here the frame
    // already has them baked in; nothing further to composite.
    Ok(png)
}

pub async fn screenshot(session: &Session, args: Value) -> Result<Value> {
    let context = session.current_context()?;
    let full_page = optional_bool(&args, "full_page", false);
    let should_annotate = optional_bool(&args, "annotate", false);

    if should_annotate {
        draw_annotations(session, &context).await?;
    }

    let result = session
        .client()
        .send(
            "browsingContext.captureScreenshot",
            json!({
                "context": context.0,
                "format": { "type": "image/png" },
                "origin": if full_page { "document" } else { "viewport" },
            }),
            None,
        )
        .await?;

    if should_annotate {
        clear_annotations(session, &context).await?;
    }

    let data = result.get("data").and_then(Value::as_str).ok_or_else(|| Error::Protocol("screenshot response missing `data`".into()))?;
    let png = decode_base64(data)?;
    let png = annotate(session, &context, png).await?;
    Ok(json!(base64::engine::general_purpose::STANDARD.encode(png)))
}

async fn draw_annotations(session: &Session, context: &vibium_protocol::types::ContextId) -> Result<()> {
    let refs = session.registry().page_map(context);
    session
        .eval(
            context,
            "(() => { const root = document.createElement('div'); root.id = '__vibium_annotations__'; root.style.position = 'fixed'; root.style.zIndex = 2147483647; root.style.pointerEvents = 'none'; document.body.appendChild(root); })()",
            false,
        )
        .await?;
    for (i, r) in refs.iter().enumerate() {
        session
            .call_function(
                context,
                &format!(
                    "(el) => {{ const box = el.getBoundingClientRect(); const tag = document.createElement('div'); tag.textContent = '{}'; tag.style.position = 'fixed'; tag.style.left = box.left + 'px'; tag.style.top = box.top + 'px'; tag.style.background = 'red'; tag.style.color = 'white'; tag.style.font = '10px monospace'; document.getElementById('__vibium_annotations__').appendChild(tag); }}",
                    i + 1
                ),
                Some(&r.handle),
                Vec::new(),
                false,
            )
            .await?;
    }
    Ok(())
}

async fn clear_annotations(session: &Session, context: &vibium_protocol::types::ContextId) -> Result<()> {
    session
        .eval(context, "document.getElementById('__vibium_annotations__')?.remove()", false)
        .await?;
    Ok(())
}

pub async fn pdf(session: &Session, args: Value) -> Result<Value> {
    let context = session.current_context()?;
    let landscape = optional_bool(&args, "landscape", false);
    let result = session
        .client()
        .send("browsingContext.print", json!({ "context": context.0, "landscape": landscape }), None)
        .await?;
    let data = result.get("data").and_then(Value::as_str).ok_or_else(|| Error::Protocol("pdf response missing `data`".into()))?;
    Ok(json!(data))
}
