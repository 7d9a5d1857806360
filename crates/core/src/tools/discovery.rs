//! Element discovery tools (spec.md §4.4 "Element discovery"): selector
//! resolution order (ref → XPath → role/semantic → CSS), `find`/`find_all`/
//! `map`/`count`.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::script::NAMESPACE;
use crate::session::Session;
use crate::tools::{optional_u64, required_str};

/// How a raw selector string was classified, per spec.md §4.4's
/// resolution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSelector {
    /// An existing `@eN` alias, resolved directly without a new query.
    Ref(String),
    XPath(String),
    Role { name: String, accessible_name: Option<String> },
    Css(String),
}

/// Classifies `selector` per spec.md §4.4's selector resolution order. Does
/// not perform the query itself — callers dispatch on the variant.
pub fn resolve_selector(selector: &str) -> ResolvedSelector {
    if let Some(alias) = selector.strip_prefix('@') {
        return ResolvedSelector::Ref(format!("@{alias}"));
    }
    if selector.starts_with("//") || selector.starts_with("(//") {
        return ResolvedSelector::XPath(selector.to_string());
    }
    if let Some(rest) = selector.strip_prefix("role=") {
        let (name, bracket) = match rest.find('[') {
            Some(idx) => (&rest[..idx], Some(&rest[idx..])),
            None => (rest, None),
        };
        let accessible_name = bracket.and_then(|b| {
            let inner = b.trim_start_matches('[').trim_end_matches(']');
            inner.strip_prefix("name=").map(|s| s.trim_matches('"').to_string())
        });
        return ResolvedSelector::Role { name: name.to_string(), accessible_name };
    }
    ResolvedSelector::Css(selector.to_string())
}

/// Runs the resolved query against `context`'s DOM via the injected script
/// bundle, returning `(handle, realm, label)` for every match.
pub(crate) async fn query_elements(session: &Session, context: &vibium_protocol::types::ContextId, selector: &str) -> Result<Vec<(String, String, String)>> {
    let resolved = resolve_selector(selector);
    let expression = match &resolved {
        ResolvedSelector::Ref(_) => return Err(Error::Internal("query_elements called on a live ref".into())),
        ResolvedSelector::XPath(expr) => format!(
            "{NAMESPACE}.queryXPath({}, document)",
            serde_json::to_string(expr).unwrap()
        ),
        ResolvedSelector::Role { name, accessible_name } => format!(
            "{NAMESPACE}.queryRole({}, {}, document)",
            serde_json::to_string(name).unwrap(),
            serde_json::to_string(&accessible_name.as_ref().map(|n| json!({ "name": n }))).unwrap()
        ),
        ResolvedSelector::Css(css) => format!("Array.from(document.querySelectorAll({}))", serde_json::to_string(css).unwrap()),
    };

    let nodes = session
        .call_function(
            context,
            &format!("() => {expression}"),
            None,
            Vec::new(),
            false,
        )
        .await?;

    let handles = nodes.get("value").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut out = Vec::new();
    for node in handles {
        let Some(handle) = node.get("handle").and_then(Value::as_str) else { continue };
        let label = element_label(&node);
        out.push((handle.to_string(), main_realm_placeholder(), label));
    }
    Ok(out)
}

/// `script.callFunction` doesn't hand back the realm id of the node
/// directly; the registry resolves realm liveness via `script.realmCreated`
/// bookkeeping instead, so discovery tools attach the *context's* current
/// realm at allocation time rather than re-deriving it per element.
fn main_realm_placeholder() -> String {
    String::new()
}

fn element_label(node: &Value) -> String {
    let tag = node.get("sharedId").and_then(Value::as_str).unwrap_or("element");
    format!("<{tag}>")
}

pub async fn find(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;

    if let ResolvedSelector::Ref(alias) = resolve_selector(selector) {
        let elem = session.registry().resolve_ref(&context, &alias)?;
        return Ok(json!({ "alias": elem.alias, "label": elem.label }));
    }

    let matches = query_elements(session, &context, selector).await?;
    let first_match = optional_bool(&args, "first");
    if matches.is_empty() {
        return Err(Error::NotFound(format!("no element matched `{selector}`")));
    }
    if matches.len() > 1 && !first_match {
        return Err(Error::Ambiguous { selector: selector.to_string(), count: matches.len() });
    }
    let (handle, realm, label) = &matches[0];
    let alias = session.registry().allocate_ref(&context, realm, None, handle, label);
    Ok(json!({ "alias": alias, "label": label }))
}

fn optional_bool(args: &Value, field: &str) -> bool {
    args.get(field).and_then(Value::as_bool).unwrap_or(false)
}

pub async fn find_all(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let limit = optional_u64(&args, "limit", 10) as usize;
    let context = session.current_context()?;

    let matches = query_elements(session, &context, selector).await?;
    let mut results = Vec::new();
    for (handle, realm, label) in matches.into_iter().take(limit) {
        let alias = session.registry().allocate_ref(&context, &realm, None, &handle, &label);
        results.push(json!({ "alias": alias, "label": label }));
    }
    Ok(json!(results))
}

/// Replaces the page map wholesale with fresh refs for every element
/// matching `selector` (default: every interactive/labelled element).
pub async fn map(session: &Session, args: Value) -> Result<Value> {
    let selector = args.get("selector").and_then(Value::as_str).unwrap_or("a, button, input, select, textarea, [role]");
    let context = session.current_context()?;

    let matches = query_elements(session, &context, selector).await?;
    let mut aliases = Vec::new();
    let mut results = Vec::new();
    for (handle, realm, label) in matches {
        let alias = session.registry().allocate_ref(&context, &realm, None, &handle, &label);
        aliases.push(alias.clone());
        results.push(json!({ "alias": alias, "label": label }));
    }
    session.registry().set_page_map(&context, aliases);
    Ok(json!(results))
}

pub async fn count(session: &Session, args: Value) -> Result<Value> {
    let selector = required_str(&args, "selector")?;
    let context = session.current_context()?;
    let matches = query_elements(session, &context, selector).await?;
    Ok(json!(matches.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_selectors_are_recognized() {
        assert_eq!(resolve_selector("@e3"), ResolvedSelector::Ref("@e3".to_string()));
    }

    #[test]
    fn xpath_selectors_are_recognized() {
        assert_eq!(resolve_selector("//button[1]"), ResolvedSelector::XPath("//button[1]".to_string()));
        assert_eq!(resolve_selector("(//a)[2]"), ResolvedSelector::XPath("(//a)[2]".to_string()));
    }

    #[test]
    fn role_selectors_parse_the_accessible_name() {
        match resolve_selector("role=button[name=\"Submit\"]") {
            ResolvedSelector::Role { name, accessible_name } => {
                assert_eq!(name, "button");
                assert_eq!(accessible_name.as_deref(), Some("Submit"));
            }
            other => panic!("expected Role, got {other:?}"),
        }
    }

    #[test]
    fn everything_else_is_css() {
        assert_eq!(resolve_selector("#submit-button"), ResolvedSelector::Css("#submit-button".to_string()));
    }
}
