//! Input tools (spec.md §4.4 "Input"): click, type, fill, hover, check,
//! select, focus, press, scroll_into_view, upload, drag. Each is
//! actionability-gated (bypassable with `force: true`, which never skips
//! Enabled/Editable).

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::script::NAMESPACE;
use crate::session::Session;
use crate::tools::actionability::{
    probe_actionability, ActionabilityCheck, DEFAULT_ACTIONABILITY_TIMEOUT_MS,
};
use crate::tools::discovery::resolve_selector;
use crate::tools::{optional_bool, optional_str, optional_u64, required_str};
use vibium_protocol::types::ContextId;

/// Resolves `args["selector"]` (required) to a live element handle,
/// allocating a ref if it isn't one already.
async fn resolve_handle(session: &Session, context: &ContextId, selector: &str) -> Result<String> {
    if let crate::tools::discovery::ResolvedSelector::Ref(alias) = resolve_selector(selector) {
        let elem = session.registry().resolve_ref(context, &alias)?;
        return Ok(elem.handle);
    }
    let found = crate::tools::discovery::find(session, json!({ "selector": selector })).await?;
    let alias = found.get("alias").and_then(Value::as_str).ok_or_else(|| Error::Internal("find() returned no alias".into()))?;
    let elem = session.registry().resolve_ref(context, alias)?;
    Ok(elem.handle)
}

fn gate(args: &Value) -> (Vec<ActionabilityCheck>, u64) {
    let force = optional_bool(args, "force", false);
    let timeout = optional_u64(args, "timeout_ms", DEFAULT_ACTIONABILITY_TIMEOUT_MS);
    let checks = if force {
        vec![ActionabilityCheck::Enabled]
    } else {
        vec![
            ActionabilityCheck::Visible,
            ActionabilityCheck::Stable,
            ActionabilityCheck::ReceivesEvents,
            ActionabilityCheck::Enabled,
        ]
    };
    (checks, timeout)
}

/// Like [`gate`], but for the text-entry tools (`type`, `fill`, `clear`):
/// `Editable` is required regardless of `--force`, since writing into a
/// non-editable element is never the right outcome (§10 Open Question #1).
fn gate_text_entry(args: &Value) -> (Vec<ActionabilityCheck>, u64) {
    let (mut checks, timeout) = gate(args);
    if !checks.contains(&ActionabilityCheck::Editable) {
        checks.push(ActionabilityCheck::Editable);
    }
    (checks, timeout)
}

async fn dispatch_click(session: &Session, context: &ContextId, handle: &str, click_count: u32) -> Result<()> {
    let expression = format!(
        "(el) => {NAMESPACE}.probe && (() => {{ const box = el.getBoundingClientRect(); const cx = box.left + box.width/2; const cy = box.top + box.height/2; el.dispatchEvent(new MouseEvent('pointerdown', {{bubbles: true, clientX: cx, clientY: cy}})); for (let i = 0; i < {click_count}; i++) el.dispatchEvent(new MouseEvent('click', {{bubbles: true, clientX: cx, clientY: cy}})); el.dispatchEvent(new MouseEvent('pointerup', {{bubbles: true, clientX: cx, clientY: cy}})); }})()"
    );
    session.call_function(context, &expression, Some(handle), Vec::new(), false).await?;
    Ok(())
}

pub async fn click(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let (checks, timeout) = gate(&args);
    probe_actionability(session, &context, &handle, &checks, timeout).await?;
    dispatch_click(session, &context, &handle, 1).await?;
    Ok(Value::Null)
}

pub async fn dblclick(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let (checks, timeout) = gate(&args);
    probe_actionability(session, &context, &handle, &checks, timeout).await?;
    dispatch_click(session, &context, &handle, 2).await?;
    Ok(Value::Null)
}

pub async fn hover(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let (mut checks, timeout) = gate(&args);
    checks.retain(|c| *c != ActionabilityCheck::Enabled);
    probe_actionability(session, &context, &handle, &checks, timeout).await?;
    session
        .call_function(
            &context,
            &format!("(el) => {{ const box = el.getBoundingClientRect(); el.dispatchEvent(new MouseEvent('pointermove', {{bubbles: true, clientX: box.left + box.width/2, clientY: box.top + box.height/2}})); }}"),
            Some(&handle),
            Vec::new(),
            false,
        )
        .await?;
    Ok(Value::Null)
}

pub async fn focus(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    session.call_function(&context, "(el) => el.focus()", Some(&handle), Vec::new(), false).await?;
    Ok(Value::Null)
}

/// Dispatches real `keydown`/`input`/`keyup` per character rather than
/// setting `.value` directly, matching spec.md §4.4's "type simulates key
/// events" note (distinguished from `fill`, which sets the value in bulk).
pub async fn type_text(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let text = required_str(&args, "text")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let (checks, timeout) = gate_text_entry(&args);
    probe_actionability(session, &context, &handle, &checks, timeout).await?;
    session
        .call_function(
            &context,
            "(el, text) => { el.focus(); for (const ch of text) { el.dispatchEvent(new KeyboardEvent('keydown', {bubbles: true, key: ch})); el.value = (el.value || '') + ch; el.dispatchEvent(new Event('input', {bubbles: true})); el.dispatchEvent(new KeyboardEvent('keyup', {bubbles: true, key: ch})); } }",
            Some(&handle),
            vec![json!(text)],
            false,
        )
        .await?;
    Ok(Value::Null)
}

pub async fn fill(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let value = required_str(&args, "value")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let (checks, timeout) = gate_text_entry(&args);
    probe_actionability(session, &context, &handle, &checks, timeout).await?;
    session
        .call_function(
            &context,
            "(el, value) => { el.focus(); el.value = value; el.dispatchEvent(new Event('input', {bubbles: true})); el.dispatchEvent(new Event('change', {bubbles: true})); }",
            Some(&handle),
            vec![json!(value)],
            false,
        )
        .await?;
    Ok(Value::Null)
}

pub async fn clear(session: &Session, args: Value) -> Result<Value> {
    let mut args = args;
    args["value"] = json!("");
    fill(session, args).await
}

pub async fn check(session: &Session, args: Value, checked: bool) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let (checks, timeout) = gate(&args);
    probe_actionability(session, &context, &handle, &checks, timeout).await?;
    session
        .call_function(
            &context,
            "(el, want) => { if (el.checked !== want) { el.checked = want; el.dispatchEvent(new Event('input', {bubbles: true})); el.dispatchEvent(new Event('change', {bubbles: true})); } }",
            Some(&handle),
            vec![json!(checked)],
            false,
        )
        .await?;
    Ok(Value::Null)
}

pub async fn select(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let values = args
        .get("values")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_else(|| vec![Value::String(required_str(&args, "value").unwrap_or_default().to_string())]);
    let (checks, timeout) = gate(&args);
    probe_actionability(session, &context, &handle, &checks, timeout).await?;
    session
        .call_function(
            &context,
            "(el, values) => { for (const opt of el.options) opt.selected = values.includes(opt.value); el.dispatchEvent(new Event('input', {bubbles: true})); el.dispatchEvent(new Event('change', {bubbles: true})); }",
            Some(&handle),
            vec![json!(values)],
            false,
        )
        .await?;
    Ok(Value::Null)
}

pub async fn press(session: &Session, args: Value) -> Result<Value> {
    let key = required_str(&args, "key")?;
    let context = session.current_context()?;
    let target = optional_str(&args, "selector");
    let handle = match target {
        Some(selector) => Some(resolve_handle(session, &context, selector).await?),
        None => None,
    };
    let expression = "(el, key) => { const target = el || document.activeElement; target.dispatchEvent(new KeyboardEvent('keydown', {bubbles: true, key})); target.dispatchEvent(new KeyboardEvent('keyup', {bubbles: true, key})); }";
    match &handle {
        Some(h) => session.call_function(&context, expression, Some(h), vec![json!(key)], false).await?,
        None => session.call_function(&context, expression, None, vec![Value::Null, json!(key)], false).await?,
    };
    Ok(Value::Null)
}

pub async fn scroll_into_view(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    session
        .call_function(&context, "(el) => el.scrollIntoView({block: 'center', inline: 'center'})", Some(&handle), Vec::new(), false)
        .await?;
    Ok(Value::Null)
}

/// Sets `<input type=file>`'s files via a `FilePayload` (base64-decoded
/// by the caller into a data-transfer-shaped structure the bundle consumes).
pub async fn upload(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let handle = resolve_handle(session, &context, selector).await?;
    let files = args.get("files").and_then(Value::as_array).cloned().unwrap_or_default();
    for file in &files {
        let name = file.get("name").and_then(Value::as_str).ok_or_else(|| Error::Schema("file payload missing `name`".into()))?;
        let mime_type = file.get("mime_type").and_then(Value::as_str).unwrap_or("application/octet-stream");
        let buffer = file.get("buffer").and_then(Value::as_str).ok_or_else(|| Error::Schema("file payload missing `buffer`".into()))?;
        session
            .call_function(
                &context,
                "(el, name, mimeType, base64) => { const bytes = Uint8Array.from(atob(base64), c => c.charCodeAt(0)); const file = new File([bytes], name, {type: mimeType}); const dt = new DataTransfer(); dt.items.add(file); el.files = dt.files; el.dispatchEvent(new Event('input', {bubbles: true})); el.dispatchEvent(new Event('change', {bubbles: true})); }",
                Some(&handle),
                vec![json!(name), json!(mime_type), json!(buffer)],
                false,
            )
            .await?;
    }
    Ok(Value::Null)
}

/// Simulates a pointer-down → move → pointer-up sequence from `selector` to
/// `target_selector`, the drag-and-drop analogue of `click`.
pub async fn drag(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let target_selector = required_str(&args, "target")?;
    let context = session.current_context()?;
    let source = resolve_handle(session, &context, selector).await?;
    let target = resolve_handle(session, &context, target_selector).await?;
    let (checks, timeout) = gate(&args);
    probe_actionability(session, &context, &source, &checks, timeout).await?;
    session
        .call_function(
            &context,
            "(source, target) => { const s = source.getBoundingClientRect(); const t = target.getBoundingClientRect(); const opts = (x, y) => ({bubbles: true, clientX: x, clientY: y}); source.dispatchEvent(new MouseEvent('pointerdown', opts(s.left + s.width/2, s.top + s.height/2))); target.dispatchEvent(new MouseEvent('pointermove', opts(t.left + t.width/2, t.top + t.height/2))); target.dispatchEvent(new MouseEvent('drop', opts(t.left + t.width/2, t.top + t.height/2))); source.dispatchEvent(new MouseEvent('pointerup', opts(t.left + t.width/2, t.top + t.height/2))); }",
            Some(&source),
            vec![json!({ "handle": target })],
            false,
        )
        .await?;
    Ok(Value::Null)
}
