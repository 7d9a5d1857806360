//! The injected page-side script contract (spec.md §6 "Injected script
//! contract"): a single idempotent bundle installed as a BiDi preload
//! script so it survives navigation, exposing accessible-name computation,
//! actionability probes, and XPath/role querying under one `window`
//! namespace.

/// Reserved global the bundle installs itself under. Re-evaluating the
/// bundle must be a no-op if this is already present — that's what makes
/// installing it once per realm (rather than tracking "have we run this
/// exact realm before") safe.
pub const NAMESPACE: &str = "__vibium__";

/// The bundle source, installed via `script.addPreloadScript` on session
/// start and explicitly re-evaluated after `set_content`/`navigate` when a
/// preload script race is possible. Exposes, under [`NAMESPACE`]:
///
/// - `accessibleName(el)` — accessible-name computation per the same
///   algorithm the accessibility-tree walk in `find`/`map` relies on.
/// - `probe(el)` — returns `{visible, stable, receivesEvents, enabled,
///   editable}` for the actionability loop (SPEC_FULL.md §4.4).
/// - `queryXPath(expr, root)` / `queryRole(name, opts, root)` — selector
///   resolution helpers for the non-CSS selector forms.
/// - `mediaEmulationOverrides` — hooks tools can flip for `prefers-color-scheme`
///   etc. without a full BiDi round trip.
pub const BUNDLE_SOURCE: &str = include_str!("script_bundle.js");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_guards_against_double_install() {
        assert!(BUNDLE_SOURCE.contains(NAMESPACE));
        assert!(BUNDLE_SOURCE.contains("if (window[NS])"));
    }
}
