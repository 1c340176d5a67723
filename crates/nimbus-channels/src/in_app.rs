use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_types::NotificationQueueItem;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct InAppNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// In-app notifications table stand-in: success is a row insert (spec §4.6
/// in_app). The real table lives in the out-of-scope relational store; this
/// mirrors its insert semantics for the engine's own process.
#[derive(Clone, Default)]
pub struct InAppDriver {
    rows: Arc<RwLock<Vec<InAppNotification>>>,
}

impl InAppDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows_for_user(&self, user_id: Uuid) -> Vec<InAppNotification> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl crate::ChannelDriver for InAppDriver {
    async fn send(&self, item: &NotificationQueueItem) -> Result<(), crate::ChannelError> {
        self.rows.write().await.push(InAppNotification {
            id: Uuid::new_v4(),
            user_id: item.user_id,
            org_id: item.org_id,
            payload: item.payload.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}
