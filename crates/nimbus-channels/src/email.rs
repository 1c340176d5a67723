use async_trait::async_trait;
use nimbus_types::NotificationQueueItem;
use reqwest::Client;
use serde_json::{json, Value};

use crate::{ChannelDriver, ChannelError};

/// Hands a notification off to an external mailer (black-box collaborator,
/// spec §2 Non-goals). Success means "accepted for delivery", not delivered.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn accept(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError>;
}

/// Posts to a transactional email API's send endpoint, the same
/// bearer-token-over-reqwest shape [`crate::slack::SlackDmDriver`] uses for
/// Slack's Web API.
pub struct HttpMailer {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn accept(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(format!("{}/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "to": to, "subject": subject, "text": body }))
            .send()
            .await
            .map_err(|e| ChannelError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let retryable = status.as_u16() == 429 || status.is_server_error();
            let body = resp.text().await.unwrap_or_default();
            return if retryable {
                Err(ChannelError::Transient(format!("mailer returned {status}: {body}")))
            } else {
                Err(ChannelError::Permanent(format!("mailer returned {status}: {body}")))
            };
        }
        Ok(())
    }
}

pub struct EmailDriver<M: Mailer> {
    mailer: M,
}

impl<M: Mailer> EmailDriver<M> {
    pub fn new(mailer: M) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl<M: Mailer + Sync> ChannelDriver for EmailDriver<M> {
    async fn send(&self, item: &NotificationQueueItem) -> Result<(), ChannelError> {
        let to = item
            .payload
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Permanent("payload missing recipient email".into()))?;
        let subject = item
            .payload
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or("Notification");
        let body = item
            .payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.mailer.accept(to, subject, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nimbus_types::{NotificationChannel, NotificationPriority};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    struct RecordingMailer {
        accepted: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn accept(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), ChannelError> {
            self.accepted.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn item_with_payload(payload: serde_json::Value) -> NotificationQueueItem {
        NotificationQueueItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest",
            NotificationChannel::Email,
            NotificationPriority::Normal,
            payload,
            Utc::now(),
            3,
        )
    }

    #[tokio::test]
    async fn send_accepts_valid_payload() {
        let accepted = Arc::new(AtomicBool::new(false));
        let driver = EmailDriver::new(RecordingMailer { accepted: accepted.clone() });
        let item = item_with_payload(json!({ "to": "a@example.com", "subject": "Hi", "text": "body" }));
        driver.send(&item).await.expect("send succeeds");
        assert!(accepted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn send_rejects_payload_without_recipient() {
        let driver = EmailDriver::new(RecordingMailer { accepted: Arc::new(AtomicBool::new(false)) });
        let item = item_with_payload(json!({ "subject": "Hi" }));
        assert!(driver.send(&item).await.is_err());
    }
}
