//! The process-wide session (spec.md §3 "Session"): the BiDi client, the
//! page registry, the tracing controller, and the idle-activity clock. One
//! instance lives for the whole daemon lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex as SyncMutex;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;
use vibium_bidi::Client;
use vibium_protocol::types::ContextId;

use crate::error::{Error, Result};
use crate::registry::{Registry, SharedRegistry};
use crate::trace::TracingController;

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

type TabLocks = Arc<SyncMutex<HashMap<ContextId, Arc<AsyncMutex<()>>>>>;

/// Owns everything a tool invocation needs. Cheap to clone — every field is
/// an `Arc` or atomic, matching spec.md §5's "BiDi client is shared" /
/// "page registry is a single reader-writer map" shared-resource model.
#[derive(Clone)]
pub struct Session {
    client: Arc<Client>,
    registry: SharedRegistry,
    tracing: Arc<TracingController>,
    last_activity_ms: Arc<AtomicU64>,
    started_at_ms: u64,
    route_grace_ms: u64,
    tab_locks: TabLocks,
}

impl Session {
    pub fn new(client: Client) -> Self {
        Self::with_route_grace(client, crate::tools::DEFAULT_ROUTE_GRACE_MS)
    }

    /// Like [`Session::new`], but overrides how long the event pump waits
    /// for a registered route to resolve before giving up (`VIBIUM_ROUTE_GRACE_MS`).
    pub fn with_route_grace(client: Client, route_grace_ms: u64) -> Self {
        let session = Self {
            client: Arc::new(client),
            registry: Arc::new(Registry::new()),
            tracing: Arc::new(TracingController::new()),
            last_activity_ms: Arc::new(AtomicU64::new(now_ms())),
            started_at_ms: now_ms(),
            route_grace_ms,
            tab_locks: Arc::new(SyncMutex::new(HashMap::new())),
        };
        session.spawn_event_pump();
        session.spawn_preload_install();
        session
    }

    /// Installs the injected script bundle as a BiDi preload script so it
    /// survives navigation (spec.md §6 "Injected script contract"). Fired
    /// from a background task rather than awaited in `new` so callers get a
    /// `Session` back immediately; every tool call happens well after this
    /// single round trip completes in practice.
    fn spawn_preload_install(&self) {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            let _ = client
                .send(
                    "script.addPreloadScript",
                    json!({ "functionDeclaration": format!("() => {{ {} }}", crate::script::BUNDLE_SOURCE) }),
                    None,
                )
                .await;
        });
    }

    /// Spawns the task that feeds every BiDi event into the registry. This
    /// is the one place `script.realmDestroyed`/`browsingContext.*` events
    /// become registry mutations (spec.md §4.3's event-driven table), and
    /// the one place `network.beforeRequestSent` resolves a registered
    /// route (spec.md §4.4) — a request an intercept holds open is never
    /// otherwise released.
    fn spawn_event_pump(&self) {
        let mut events = self.client.subscribe("");
        let registry = Arc::clone(&self.registry);
        let session = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                registry.apply_event(&event);
                if event.method == "network.beforeRequestSent" {
                    session.resolve_route(&event);
                }
            }
        });
    }

    /// Looks up the route registered for an intercepted request's URL and
    /// resolves it, bounded by `route_grace_ms` so a stuck resolution never
    /// wedges the event pump (SPEC_FULL.md §4.4 Open Question).
    fn resolve_route(&self, event: &vibium_protocol::bidi::BidiEvent) {
        let Some(request_id) = event.params.get("request").and_then(|r| r.get("request")).and_then(Value::as_str) else {
            return;
        };
        let Some(url) = event.params.get("request").and_then(|r| r.get("url")).and_then(Value::as_str) else { return };
        let Some(action) = self.registry.route_action_for(url) else { return };

        let session = self.clone();
        let request_id = request_id.to_string();
        let grace = std::time::Duration::from_millis(self.route_grace_ms);
        tokio::spawn(async move {
            if tokio::time::timeout(grace, crate::tools::resolve_intercept(&session, &request_id, &action)).await.is_err() {
                tracing::warn!(target: "vibium_core::network", request_id, "route resolution exceeded grace period");
            }
        });
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn trace(&self) -> &TracingController {
        &self.tracing
    }

    /// Advances the activity clock. Called on every tool *dispatch*, not
    /// completion, so a long `screenshot(fullPage)` never starves the idle
    /// timer (SPEC_FULL.md §9 design note).
    pub fn touch(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn idle_for_ms(&self) -> u64 {
        now_ms().saturating_sub(self.last_activity_ms.load(Ordering::Relaxed))
    }

    pub fn uptime_ms(&self) -> u64 {
        now_ms().saturating_sub(self.started_at_ms)
    }

    pub async fn shutdown(&self) -> crate::error::Result<()> {
        self.client.close().await?;
        Ok(())
    }

    /// The context tools default to when the caller doesn't name one
    /// (spec.md §4.3 "current tab").
    pub fn current_context(&self) -> Result<ContextId> {
        self.registry.current().ok_or_else(|| Error::NotFound("no open browsing context".into()))
    }

    /// Acquires the per-tab mutex for the current tab, serializing tool
    /// invocations against it (SPEC_FULL.md §4.5/§5: "tool invocations on
    /// the same current tab are serialized through a per-tab mutex;
    /// different tabs run concurrently"). Returns `None` when there is no
    /// current tab yet — nothing to serialize against.
    pub async fn lock_current_tab(&self) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        let context = self.registry.current()?;
        let lock = {
            let mut locks = self.tab_locks.lock();
            locks.entry(context).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        Some(lock.lock_owned().await)
    }

    /// Evaluates a JS expression in `context`'s main realm via
    /// `script.evaluate`, unwrapping the BiDi remote-value envelope into a
    /// plain [`Value`] for the common case (primitives, plain objects).
    pub async fn eval(&self, context: &ContextId, expression: &str, await_promise: bool) -> Result<Value> {
        let result = self
            .client
            .send(
                "script.evaluate",
                json!({
                    "expression": expression,
                    "target": { "context": context.0 },
                    "awaitPromise": await_promise,
                    "serializationOptions": { "maxObjectDepth": 4, "maxDomDepth": 2 },
                }),
                None,
            )
            .await?;

        if result.get("type").and_then(Value::as_str) == Some("exception") {
            let message = result
                .get("exceptionDetails")
                .and_then(|d| d.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script evaluation failed")
                .to_string();
            return Err(Error::Protocol(message));
        }
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Calls a function declaration (e.g. `"() => ..."`) with `this` bound
    /// to the handle named in `this_handle`, used to invoke script-bundle
    /// helpers against a specific element.
    pub async fn call_function(
        &self,
        context: &ContextId,
        function_declaration: &str,
        this_handle: Option<&str>,
        arguments: Vec<Value>,
        await_promise: bool,
    ) -> Result<Value> {
        let mut params = json!({
            "functionDeclaration": function_declaration,
            "target": { "context": context.0 },
            "arguments": arguments,
            "awaitPromise": await_promise,
            "serializationOptions": { "maxObjectDepth": 4, "maxDomDepth": 2 },
        });
        if let Some(handle) = this_handle {
            params["this"] = json!({ "handle": handle });
        }
        let result = self.client.send("script.callFunction", params, None).await?;
        if result.get("type").and_then(Value::as_str) == Some("exception") {
            let message = result
                .get("exceptionDetails")
                .and_then(|d| d.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script evaluation failed")
                .to_string();
            return Err(Error::Protocol(message));
        }
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
