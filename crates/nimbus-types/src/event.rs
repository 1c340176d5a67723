use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An internal domain event broadcast on the process-local event bus —
/// notification sends, sequence step completions, worker tick summaries.
/// Not to be confused with `WebhookEvent`, which is the durable inbound
/// log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub event_type: String,
    pub properties: Value,
    pub emitted_at: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(event_type: impl Into<String>, properties: Value) -> Self {
        Self {
            event_type: event_type.into(),
            properties,
            emitted_at: Utc::now(),
        }
    }
}
