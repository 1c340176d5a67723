use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use nimbus_types::{WebhookEvent, WebhookStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Append-only log of inbound webhooks, keyed by `(source, external_event_id)`
/// for at-most-once processing (spec §3/§4.3). A dedupe-key collision still
/// appends a row — every delivery gets a `WebhookEvent` of its own — it just
/// stamps the new row `ignored` instead of letting it proceed to `processing`,
/// so ∀ rows sharing a key at most one ever reaches `processed`/`processing`.
#[derive(Clone, Default)]
pub struct EventLog {
    by_id: Arc<RwLock<HashMap<Uuid, WebhookEvent>>>,
    dedupe_index: Arc<RwLock<HashMap<(String, String), Uuid>>>,
}

pub enum InsertOutcome {
    Inserted(WebhookEvent),
    Duplicate { existing: WebhookEvent, ignored: WebhookEvent },
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new event. If its `(source, external_event_id)` key already
    /// has a row on file, the new event is still inserted — as its own row,
    /// stamped `ignored` with `processed_at` set — and both it and the
    /// original row are returned.
    pub async fn insert(&self, mut event: WebhookEvent) -> InsertOutcome {
        if let Some(key) = event.dedupe_key() {
            let key = (key.0.to_string(), key.1.to_string());
            let mut dedupe_index = self.dedupe_index.write().await;
            if let Some(existing_id) = dedupe_index.get(&key).copied() {
                let mut by_id = self.by_id.write().await;
                if let Some(existing) = by_id.get(&existing_id).cloned() {
                    event.status = WebhookStatus::Ignored;
                    event.processed_at = Some(Utc::now());
                    by_id.insert(event.id, event.clone());
                    return InsertOutcome::Duplicate { existing, ignored: event };
                }
            }
            dedupe_index.insert(key, event.id);
        }
        let mut by_id = self.by_id.write().await;
        by_id.insert(event.id, event.clone());
        InsertOutcome::Inserted(event)
    }

    pub async fn get(&self, id: Uuid) -> Option<WebhookEvent> {
        self.by_id.read().await.get(&id).cloned()
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: WebhookStatus,
        error_message: Option<String>,
    ) -> Option<WebhookEvent> {
        let mut by_id = self.by_id.write().await;
        let event = by_id.get_mut(&id)?;
        event.status = status;
        event.error_message = error_message;
        if matches!(
            status,
            WebhookStatus::Processed | WebhookStatus::Failed | WebhookStatus::Ignored
        ) {
            event.processed_at = Some(Utc::now());
        }
        Some(event.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event(external_id: &str) -> WebhookEvent {
        let mut event = WebhookEvent::new("meetingbaas", "bot.status_changed", json!({}));
        event.external_event_id = Some(external_id.to_string());
        event
    }

    #[tokio::test]
    async fn duplicate_external_event_id_is_deduplicated() {
        let log = EventLog::new();
        let first = sample_event("evt_1");
        let second = sample_event("evt_1");

        let InsertOutcome::Inserted(inserted) = log.insert(first).await else {
            panic!("expected first insert to succeed");
        };
        match log.insert(second).await {
            InsertOutcome::Duplicate { existing, ignored } => {
                assert_eq!(existing.id, inserted.id);
                assert_ne!(ignored.id, inserted.id);
                assert_eq!(ignored.status, WebhookStatus::Ignored);
                assert!(ignored.processed_at.is_some());

                let stored_ignored = log.get(ignored.id).await.expect("ignored row persisted under its own id");
                assert_eq!(stored_ignored.status, WebhookStatus::Ignored);
                let stored_existing = log.get(existing.id).await.expect("original row untouched");
                assert_eq!(stored_existing.status, inserted.status);
            }
            InsertOutcome::Inserted(_) => panic!("expected duplicate to be detected"),
        }
    }

    #[tokio::test]
    async fn set_status_stamps_processed_at_on_terminal_status() {
        let log = EventLog::new();
        let event = sample_event("evt_2");
        let InsertOutcome::Inserted(inserted) = log.insert(event).await else {
            panic!("expected insert to succeed");
        };
        let updated = log
            .set_status(inserted.id, WebhookStatus::Processed, None)
            .await
            .expect("event exists");
        assert!(updated.processed_at.is_some());
    }
}
