//! Actionability polling (spec.md §4.4 "Actionability model"): Visible,
//! Stable, ReceivesEvents, Enabled, Editable, polled at a fixed interval
//! until satisfied or a timeout elapses.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::script::NAMESPACE;
use crate::session::Session;
use vibium_protocol::types::ContextId;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_ACTIONABILITY_TIMEOUT_MS: u64 = 30_000;

/// One property from the bundle's `probe()` helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionabilityCheck {
    Visible,
    Stable,
    ReceivesEvents,
    Enabled,
    Editable,
}

impl ActionabilityCheck {
    fn label(self) -> &'static str {
        match self {
            ActionabilityCheck::Visible => "visible",
            ActionabilityCheck::Stable => "stable",
            ActionabilityCheck::ReceivesEvents => "receives_events",
            ActionabilityCheck::Enabled => "enabled",
            ActionabilityCheck::Editable => "editable",
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct Probe {
    visible: bool,
    stable: bool,
    #[serde(rename = "receivesEvents")]
    receives_events: bool,
    enabled: bool,
    editable: bool,
}

impl Probe {
    fn satisfies(&self, check: ActionabilityCheck) -> bool {
        match check {
            ActionabilityCheck::Visible => self.visible,
            ActionabilityCheck::Stable => self.stable,
            ActionabilityCheck::ReceivesEvents => self.receives_events,
            ActionabilityCheck::Enabled => self.enabled,
            ActionabilityCheck::Editable => self.editable,
        }
    }
}

pub struct ActionabilityOutcome {
    pub elapsed: Duration,
}

/// Polls `handle` in `context` until every check in `required` passes, or
/// fails with `NotActionable` naming the first check still failing when the
/// timeout elapses. `--force` (handled by callers) skips Visible/Stable/
/// ReceivesEvents but never Enabled or Editable — this function only ever
/// sees the checks its caller decided still apply.
pub async fn probe_actionability(
    session: &Session,
    context: &ContextId,
    handle: &str,
    required: &[ActionabilityCheck],
    timeout_ms: u64,
) -> Result<ActionabilityOutcome> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let started = Instant::now();
    let mut last_failure = required.first().copied();

    loop {
        let probe = run_probe(session, context, handle).await?;
        let failing = required.iter().copied().find(|check| !probe.satisfies(*check));
        match failing {
            None => return Ok(ActionabilityOutcome { elapsed: started.elapsed() }),
            Some(check) => last_failure = Some(check),
        }

        if Instant::now() >= deadline {
            let check = last_failure.unwrap_or(ActionabilityCheck::Visible);
            return Err(Error::NotActionable { check: check.label(), elapsed_ms: started.elapsed().as_millis() as u64 });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn run_probe(session: &Session, context: &ContextId, handle: &str) -> Result<Probe> {
    let result = session
        .call_function(context, &format!("(el) => {NAMESPACE}.probe(el)"), Some(handle), Vec::new(), false)
        .await?;
    let value = result.get("value").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| Error::Protocol(format!("malformed actionability probe result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_deserializes_the_bundles_camelcase_field() {
        let probe: Probe = serde_json::from_value(serde_json::json!({
            "visible": true, "stable": true, "receivesEvents": false, "enabled": true, "editable": false
        }))
        .unwrap();
        assert!(!probe.satisfies(ActionabilityCheck::ReceivesEvents));
        assert!(probe.satisfies(ActionabilityCheck::Visible));
    }
}
