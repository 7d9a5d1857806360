//! Storage tools (spec.md §4.4 "Storage"): `storage_state`/`restore_storage`,
//! snapshotting and replaying cookies plus per-origin local/session storage.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::session::Session;
use vibium_protocol::types::{Cookie, OriginStorage, SameSite, StorageState};

pub async fn storage_state(session: &Session) -> Result<Value> {
    let cookies_result = session.client().send("storage.getCookies", json!({}), None).await?;
    let cookies = cookies_result
        .get("cookies")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| parse_cookie(&c))
        .collect();

    let context = session.current_context()?;
    let origin_result = session
        .eval(
            &context,
            "JSON.stringify({ origin: location.origin, localStorage: {...localStorage}, sessionStorage: {...sessionStorage} })",
            false,
        )
        .await?;
    let raw = origin_result.get("value").and_then(Value::as_str).unwrap_or("{}");
    let parsed: Value = serde_json::from_str(raw).unwrap_or(json!({}));
    let origins = vec![OriginStorage {
        origin: parsed.get("origin").and_then(Value::as_str).unwrap_or_default().to_string(),
        local_storage: object_to_pairs(parsed.get("localStorage")),
        session_storage: object_to_pairs(parsed.get("sessionStorage")),
    }];

    let state = StorageState { cookies, origins };
    serde_json::to_value(state).map_err(|e| Error::Internal(format!("failed to serialize storage state: {e}")))
}

fn object_to_pairs(value: Option<&Value>) -> Vec<(String, String)> {
    value
        .and_then(Value::as_object)
        .map(|obj| obj.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

fn parse_cookie(raw: &Value) -> Option<Cookie> {
    Some(Cookie {
        name: raw.get("name")?.as_str()?.to_string(),
        value: raw.get("value")?.get("value").and_then(Value::as_str).unwrap_or_default().to_string(),
        domain: raw.get("domain")?.as_str()?.to_string(),
        path: raw.get("path").and_then(Value::as_str).unwrap_or("/").to_string(),
        expires: raw.get("expiry").and_then(Value::as_f64),
        http_only: raw.get("httpOnly").and_then(Value::as_bool).unwrap_or(false),
        secure: raw.get("secure").and_then(Value::as_bool).unwrap_or(false),
        same_site: Some(match raw.get("sameSite").and_then(Value::as_str) {
            Some("strict") => SameSite::Strict,
            Some("none") => SameSite::None,
            _ => SameSite::Lax,
        }),
    })
}

pub async fn restore_storage(session: &Session, args: Value) -> Result<Value> {
    let state: StorageState = serde_json::from_value(args).map_err(|e| Error::Schema(format!("invalid storage state: {e}")))?;

    for cookie in &state.cookies {
        session
            .client()
            .send(
                "storage.setCookie",
                json!({
                    "cookie": {
                        "name": cookie.name,
                        "value": { "type": "string", "value": cookie.value },
                        "domain": cookie.domain,
                        "path": cookie.path,
                        "httpOnly": cookie.http_only,
                        "secure": cookie.secure,
                    }
                }),
                None,
            )
            .await?;
    }

    let context = session.current_context()?;
    for origin in &state.origins {
        let entries = serde_json::to_string(&origin.local_storage).unwrap_or_default();
        session
            .eval(
                &context,
                &format!("Object.entries({entries}).forEach(([k, v]) => localStorage.setItem(k, v))"),
                false,
            )
            .await?;
    }
    Ok(Value::Null)
}
