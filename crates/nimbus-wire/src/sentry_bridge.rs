//! `/webhooks/sentry-bridge` payload shape (spec §6): Sentry issue events
//! proxied through an internal signer, using the same `v1=hex` scheme as
//! `nimbus-core::auth::verify_webhook`. This module only carries the
//! payload shape the routing-rule evaluator (`nimbus-orchestrator::rules`)
//! matches against; signature verification reuses the shared primitive.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RawSentryIssueEvent {
    pub id: String,
    pub level: Option<String>,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub title: String,
    pub culprit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_minimal_event() {
        let raw: RawSentryIssueEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "title": "NullPointerException in handler",
        }))
        .unwrap();
        assert_eq!(raw.title, "NullPointerException in handler");
        assert!(raw.level.is_none());
    }
}
