//! The page/context registry (SPEC_FULL.md §4.3 / spec.md §4.3): the
//! authoritative model of tabs, frames, and element references, kept in
//! sync by feeding it every `browsingContext.*`/`script.realm*` event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use vibium_protocol::bidi::BidiEvent;
use vibium_protocol::types::{ContextId, RouteAction};

/// One node in the browsing-context forest.
#[derive(Debug, Clone)]
pub struct BrowsingContext {
    pub id: ContextId,
    pub url: String,
    pub parent: Option<ContextId>,
    pub children: Vec<ContextId>,
    pub created_order: u64,
}

/// A live or tombstoned `@eN` alias, bound to a BiDi remote-object handle
/// within one realm.
#[derive(Debug, Clone)]
pub struct ElementRef {
    pub alias: String,
    pub context: ContextId,
    pub realm: String,
    pub sandbox: Option<String>,
    pub label: String,
    pub handle: String,
    pub created_at_ms: u64,
    pub stale: bool,
}

/// Per-context scratch state: its element refs, the last `map`, and realm
/// bookkeeping needed to tombstone refs on navigation/realm destruction.
#[derive(Debug, Default)]
struct ContextState {
    next_alias: u64,
    refs: HashMap<String, ElementRef>,
    page_map: Vec<String>,
    main_realm: Option<String>,
}

/// The full registry: the context forest, per-context element-ref tables,
/// and the "current tab" pointer tools default to.
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    contexts: HashMap<ContextId, BrowsingContext>,
    states: HashMap<ContextId, ContextState>,
    current: Option<ContextId>,
    creation_counter: u64,
    routes: HashMap<String, RouteEntry>,
}

/// One active `route()` registration: the intercept id BiDi assigned plus
/// the action to apply when a matching request arrives.
struct RouteEntry {
    intercept_id: String,
    action: RouteAction,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    /// Applies one BiDi event, mutating the context tree and/or tombstoning
    /// element refs. This is the single writer of registry state — tools
    /// only ever read or allocate refs, never touch the tree directly
    /// (spec.md §3 invariant: "the registry reconciles on every relevant
    /// event rather than on a poll").
    pub fn apply_event(&self, event: &BidiEvent) {
        match event.method.as_str() {
            "browsingContext.contextCreated" => self.on_context_created(event),
            "browsingContext.contextDestroyed" => self.on_context_destroyed(event),
            "browsingContext.navigationStarted" | "browsingContext.fragmentNavigated" => {
                self.on_navigation(event)
            }
            "script.realmCreated" => self.on_realm_created(event),
            "script.realmDestroyed" => self.on_realm_destroyed(event),
            _ => {}
        }
    }

    fn on_context_created(&self, event: &BidiEvent) {
        let Some(id) = event.params.get("context").and_then(|v| v.as_str()) else { return };
        let id = ContextId(id.to_string());
        let parent = event.params.get("parent").and_then(|v| v.as_str()).map(|s| ContextId(s.to_string()));
        let url = event.params.get("url").and_then(|v| v.as_str()).unwrap_or("about:blank").to_string();

        let mut inner = self.inner.write();
        inner.creation_counter += 1;
        let order = inner.creation_counter;
        if let Some(parent_id) = &parent {
            if let Some(parent_ctx) = inner.contexts.get_mut(parent_id) {
                parent_ctx.children.push(id.clone());
            }
        }
        let is_top_level = parent.is_none();
        inner
            .contexts
            .insert(id.clone(), BrowsingContext { id: id.clone(), url, parent, children: Vec::new(), created_order: order });
        inner.states.entry(id.clone()).or_default();
        if is_top_level && inner.current.is_none() {
            inner.current = Some(id);
        }
    }

    fn on_context_destroyed(&self, event: &BidiEvent) {
        let Some(id) = event.params.get("context").and_then(|v| v.as_str()) else { return };
        let id = ContextId(id.to_string());

        let mut inner = self.inner.write();
        let mut to_remove = vec![id.clone()];
        let mut i = 0;
        while i < to_remove.len() {
            let next = inner.contexts.get(&to_remove[i]).map(|ctx| ctx.children.clone()).unwrap_or_default();
            to_remove.extend(next);
            i += 1;
        }
        for removed in &to_remove {
            inner.contexts.remove(removed);
            inner.states.remove(removed);
            if inner.current.as_ref() == Some(removed) {
                inner.current = None;
            }
        }
    }

    fn on_navigation(&self, event: &BidiEvent) {
        let Some(id) = event.params.get("context").and_then(|v| v.as_str()) else { return };
        let id = ContextId(id.to_string());
        let Some(url) = event.params.get("url").and_then(|v| v.as_str()) else { return };

        let mut inner = self.inner.write();
        if let Some(ctx) = inner.contexts.get_mut(&id) {
            ctx.url = url.to_string();
        }
        // Decided in SPEC_FULL.md §10 (Open Question): `map` aliases reset
        // on navigation for that context, not only on realm destruction.
        if let Some(state) = inner.states.get_mut(&id) {
            state.page_map.clear();
        }
    }

    fn on_realm_created(&self, event: &BidiEvent) {
        let Some(id) = event.params.get("context").and_then(|v| v.as_str()) else { return };
        let id = ContextId(id.to_string());
        let Some(realm) = event.params.get("realm").and_then(|v| v.as_str()) else { return };
        let sandbox = event.params.get("sandbox").and_then(|v| v.as_str());

        let mut inner = self.inner.write();
        if sandbox.is_none() {
            if let Some(state) = inner.states.get_mut(&id) {
                state.main_realm = Some(realm.to_string());
            }
        }
    }

    fn on_realm_destroyed(&self, event: &BidiEvent) {
        let Some(realm) = event.params.get("realm").and_then(|v| v.as_str()) else { return };

        let mut inner = self.inner.write();
        for state in inner.states.values_mut() {
            for elem in state.refs.values_mut() {
                if elem.realm == realm {
                    elem.stale = true;
                }
            }
        }
    }

    /// Allocates a fresh, dense `@eN` alias for `context` bound to
    /// `(realm, handle)`, carrying `label` for agent legibility.
    pub fn allocate_ref(&self, context: &ContextId, realm: &str, sandbox: Option<&str>, handle: &str, label: &str) -> String {
        let mut inner = self.inner.write();
        let state = inner.states.entry(context.clone()).or_default();
        state.next_alias += 1;
        let alias = format!("@e{}", state.next_alias);
        state.refs.insert(
            alias.clone(),
            ElementRef {
                alias: alias.clone(),
                context: context.clone(),
                realm: realm.to_string(),
                sandbox: sandbox.map(str::to_string),
                label: label.to_string(),
                handle: handle.to_string(),
                created_at_ms: now_ms(),
                stale: false,
            },
        );
        alias
    }

    /// Replaces the page map for `context` wholesale (spec.md §3: "Replaced
    /// wholesale on each `map` call").
    pub fn set_page_map(&self, context: &ContextId, aliases: Vec<String>) {
        let mut inner = self.inner.write();
        let state = inner.states.entry(context.clone()).or_default();
        state.page_map = aliases;
    }

    pub fn page_map(&self, context: &ContextId) -> Vec<ElementRef> {
        let inner = self.inner.read();
        let Some(state) = inner.states.get(context) else { return Vec::new() };
        state.page_map.iter().filter_map(|alias| state.refs.get(alias).cloned()).collect()
    }

    /// Resolves a live alias, failing with [`crate::Error::StaleElement`] or
    /// [`crate::Error::NotFound`] as appropriate. Tools never clone a ref
    /// without going through here — that's the single checkpoint for the
    /// "never resolves to a different element" invariant (spec.md §8.2).
    pub fn resolve_ref(&self, context: &ContextId, alias: &str) -> crate::error::Result<ElementRef> {
        let inner = self.inner.read();
        let state = inner.states.get(context).ok_or_else(|| crate::error::Error::NotFound(format!("unknown context {context:?}")))?;
        let elem = state.refs.get(alias).ok_or_else(|| crate::error::Error::NotFound(format!("no such element ref {alias}")))?;
        if elem.stale {
            return Err(crate::error::Error::StaleElement(alias.to_string()));
        }
        Ok(elem.clone())
    }

    pub fn current(&self) -> Option<ContextId> {
        self.inner.read().current.clone()
    }

    pub fn set_current(&self, context: ContextId) {
        self.inner.write().current = Some(context);
    }

    pub fn context(&self, id: &ContextId) -> Option<BrowsingContext> {
        self.inner.read().contexts.get(id).cloned()
    }

    pub fn contexts(&self) -> Vec<BrowsingContext> {
        self.inner.read().contexts.values().cloned().collect()
    }

    pub fn register_route(&self, pattern: &str, intercept_id: &str, action: RouteAction) {
        self.inner.write().routes.insert(pattern.to_string(), RouteEntry { intercept_id: intercept_id.to_string(), action });
    }

    /// Removes `pattern`'s route registration, returning its intercept id
    /// so the caller can tell BiDi to stop intercepting it.
    pub fn unregister_route(&self, pattern: &str) -> Option<String> {
        self.inner.write().routes.remove(pattern).map(|entry| entry.intercept_id)
    }

    /// Finds the action registered for the intercept named in a
    /// `network.beforeRequestSent` event, by matching the request's URL
    /// against every registered pattern.
    pub fn route_action_for(&self, url: &str) -> Option<RouteAction> {
        let inner = self.inner.read();
        inner.routes.iter().find_map(|(pattern, entry)| {
            glob::Pattern::new(pattern).ok().filter(|p| p.matches(url)).map(|_| entry.action.clone())
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Shared handle to the registry, cheap to clone into every tool call.
pub type SharedRegistry = Arc<Registry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(method: &str, params: serde_json::Value) -> BidiEvent {
        BidiEvent { method: method.to_string(), params }
    }

    #[test]
    fn context_created_becomes_current_when_top_level() {
        let registry = Registry::new();
        registry.apply_event(&event("browsingContext.contextCreated", json!({"context": "c1", "url": "about:blank"})));
        assert_eq!(registry.current(), Some(ContextId("c1".to_string())));
    }

    #[test]
    fn destroying_a_context_removes_its_descendants() {
        let registry = Registry::new();
        registry.apply_event(&event("browsingContext.contextCreated", json!({"context": "c1", "url": "about:blank"})));
        registry.apply_event(&event("browsingContext.contextCreated", json!({"context": "c2", "parent": "c1", "url": "about:blank"})));
        registry.apply_event(&event("browsingContext.contextDestroyed", json!({"context": "c1"})));
        assert!(registry.context(&ContextId("c1".to_string())).is_none());
        assert!(registry.context(&ContextId("c2".to_string())).is_none());
    }

    #[test]
    fn aliases_are_dense_and_increasing_per_context() {
        let registry = Registry::new();
        let ctx = ContextId("c1".to_string());
        let a = registry.allocate_ref(&ctx, "r1", None, "h1", "button");
        let b = registry.allocate_ref(&ctx, "r1", None, "h2", "input");
        assert_eq!(a, "@e1");
        assert_eq!(b, "@e2");
    }

    #[test]
    fn realm_destroyed_tombstones_refs_bound_to_it() {
        let registry = Registry::new();
        let ctx = ContextId("c1".to_string());
        let alias = registry.allocate_ref(&ctx, "r1", None, "h1", "button");
        registry.apply_event(&event("script.realmDestroyed", json!({"realm": "r1"})));
        let result = registry.resolve_ref(&ctx, &alias);
        assert!(matches!(result, Err(crate::error::Error::StaleElement(_))));
    }

    #[test]
    fn navigation_resets_the_page_map_for_that_context() {
        let registry = Registry::new();
        let ctx = ContextId("c1".to_string());
        registry.allocate_ref(&ctx, "r1", None, "h1", "button");
        registry.set_page_map(&ctx, vec!["@e1".to_string()]);
        assert_eq!(registry.page_map(&ctx).len(), 1);
        registry.apply_event(&event("browsingContext.navigationStarted", json!({"context": "c1", "url": "https://example.com"})));
        assert_eq!(registry.page_map(&ctx).len(), 0);
    }
}
