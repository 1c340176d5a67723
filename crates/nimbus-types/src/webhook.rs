use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a logged inbound webhook delivery. Terminal once `Processed`,
/// `Failed`, or `Ignored` — see `WebhookEvent` invariants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processing,
    Processed,
    Failed,
    Ignored,
}

/// An append-only log entry for one inbound webhook delivery.
///
/// `(source, external_event_id)` is unique whenever `external_event_id` is
/// present; this is the idempotency key that gives at-most-once
/// processed-effect over an at-least-once delivery guarantee from the
/// source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub external_event_id: Option<String>,
    pub payload: serde_json::Value,
    pub headers: BTreeMap<String, String>,
    pub status: WebhookStatus,
    pub error_message: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            event_type: event_type.into(),
            external_event_id: None,
            payload,
            headers: BTreeMap::new(),
            status: WebhookStatus::Received,
            error_message: None,
            received_at: Utc::now(),
            processed_at: None,
        }
    }

    pub fn dedupe_key(&self) -> Option<(&str, &str)> {
        self.external_event_id
            .as_deref()
            .map(|ext| (self.source.as_str(), ext))
    }
}
