use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    SlackDm,
    SlackChannel,
    Email,
    InApp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    /// One step down; saturates at `Low`.
    pub fn downgrade(self) -> Self {
        match self {
            Self::Urgent => Self::High,
            Self::High => Self::Normal,
            Self::Normal => Self::Low,
            Self::Low => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationQueueStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
    Delayed,
}

/// Invariant: a row in `Processing` with `locked_at` older than the stale
/// threshold is reclaimable by any worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationQueueItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub notification_type: String,
    pub channel: NotificationChannel,
    pub priority: NotificationPriority,
    pub payload: serde_json::Value,
    pub scheduled_for: DateTime<Utc>,
    pub optimal_send_time: Option<DateTime<Utc>>,
    pub next_allowed_at: Option<DateTime<Utc>>,
    pub status: NotificationQueueStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl NotificationQueueItem {
    pub fn new(
        user_id: Uuid,
        org_id: Uuid,
        notification_type: impl Into<String>,
        channel: NotificationChannel,
        priority: NotificationPriority,
        payload: serde_json::Value,
        scheduled_for: DateTime<Utc>,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            org_id,
            notification_type: notification_type.into(),
            channel,
            priority,
            payload,
            scheduled_for,
            optimal_send_time: None,
            next_allowed_at: None,
            status: NotificationQueueStatus::Pending,
            attempt_count: 0,
            max_attempts,
            locked_by: None,
            locked_at: None,
            last_error: None,
        }
    }

    pub fn is_stale_processing(&self, now: DateTime<Utc>, stale_threshold: chrono::Duration) -> bool {
        self.status == NotificationQueueStatus::Processing
            && self
                .locked_at
                .is_some_and(|locked_at| now - locked_at > stale_threshold)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationInteraction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub notification_type: String,
    pub delivered_at: DateTime<Utc>,
    pub delivered_via: NotificationChannel,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub last_app_active_at: Option<DateTime<Utc>>,
    pub last_slack_active_at: Option<DateTime<Utc>>,
    pub preferred_notification_frequency: NotificationFrequency,
    pub notification_fatigue_level: u8,
    pub overall_engagement_score: u8,
    pub notifications_since_last_feedback: u32,
    pub last_feedback_requested_at: Option<DateTime<Utc>>,
}

impl UserMetrics {
    /// User feedback deltas to `notification_fatigue_level`, clamped to
    /// `[0, 100]`.
    pub fn apply_feedback(&mut self, feedback: NotificationFeedback) {
        let delta: i16 = match feedback {
            NotificationFeedback::NotHelpful => 10,
            NotificationFeedback::Less => 30,
            NotificationFeedback::Helpful => -5,
            NotificationFeedback::More => -20,
        };
        let current = i16::from(self.notification_fatigue_level);
        self.notification_fatigue_level = (current + delta).clamp(0, 100) as u8;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFeedback {
    NotHelpful,
    Less,
    Helpful,
    More,
}
