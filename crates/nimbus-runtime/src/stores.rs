//! In-process domain stores for the worker layer, following
//! `nimbus-core::events::EventLog`'s `Arc<RwLock<HashMap<Uuid, T>>>` shape.
//! The relational store is an out-of-scope external dependency (spec §6);
//! these stand in for it within this process the same way `EventLog` stands
//! in for the webhook table.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nimbus_types::{
    BotDeployment, NotificationChannel, NotificationFeedback, NotificationFrequency,
    NotificationPriority, NotificationQueueItem, NotificationQueueStatus, Recording, RetryJob,
    UserMetrics,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct NotificationQueueStore {
    rows: Arc<RwLock<HashMap<Uuid, NotificationQueueItem>>>,
}

impl NotificationQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, item: NotificationQueueItem) -> Uuid {
        let id = item.id;
        self.rows.write().await.insert(id, item);
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<NotificationQueueItem> {
        self.rows.read().await.get(&id).cloned()
    }

    /// Atomically claims up to `batch_size` pending, due items, ordered by
    /// priority then `scheduled_for` (spec §4.6 worker algorithm step 1-2).
    pub async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
        locked_by: &str,
    ) -> Vec<NotificationQueueItem> {
        let mut rows = self.rows.write().await;
        let mut candidates: Vec<Uuid> = rows
            .values()
            .filter(|item| item.status == NotificationQueueStatus::Pending && item.scheduled_for <= now)
            .map(|item| item.id)
            .collect();

        candidates.sort_by(|a, b| {
            let item_a = &rows[a];
            let item_b = &rows[b];
            item_b.priority.cmp(&item_a.priority).then(item_a.scheduled_for.cmp(&item_b.scheduled_for))
        });

        candidates
            .into_iter()
            .take(batch_size)
            .filter_map(|id| {
                let item = rows.get_mut(&id)?;
                item.status = NotificationQueueStatus::Processing;
                item.locked_by = Some(locked_by.to_string());
                item.locked_at = Some(now);
                Some(item.clone())
            })
            .collect()
    }

    pub async fn mark_sent(&self, id: Uuid) {
        if let Some(item) = self.rows.write().await.get_mut(&id) {
            item.status = NotificationQueueStatus::Sent;
            item.locked_by = None;
            item.locked_at = None;
        }
    }

    /// Leaves the item `pending` with a backoff-delayed `scheduled_for`
    /// after a retryable channel failure (spec §4.6 step 4).
    pub async fn requeue_with_backoff(&self, id: Uuid, error: &str, retry_after: Duration, now: DateTime<Utc>) {
        if let Some(item) = self.rows.write().await.get_mut(&id) {
            item.attempt_count += 1;
            item.last_error = Some(nimbus_types::NimbusError::truncate_diagnostic(error));
            item.status = NotificationQueueStatus::Pending;
            item.scheduled_for = now + retry_after;
            item.locked_by = None;
            item.locked_at = None;
        }
    }

    pub async fn mark_failed(&self, id: Uuid, error: &str) {
        if let Some(item) = self.rows.write().await.get_mut(&id) {
            item.attempt_count += 1;
            item.last_error = Some(nimbus_types::NimbusError::truncate_diagnostic(error));
            item.status = NotificationQueueStatus::Failed;
            item.locked_by = None;
            item.locked_at = None;
        }
    }

    /// Marks an item `delayed` with `next_allowed_at`, optionally recording
    /// the one-step priority downgrade the frequency check attempted.
    pub async fn mark_delayed(&self, id: Uuid, next_allowed_at: DateTime<Utc>, downgraded: Option<NotificationPriority>) {
        if let Some(item) = self.rows.write().await.get_mut(&id) {
            item.status = NotificationQueueStatus::Delayed;
            item.next_allowed_at = Some(next_allowed_at);
            item.locked_by = None;
            item.locked_at = None;
            if let Some(priority) = downgraded {
                item.priority = priority;
            }
        }
    }

    pub async fn set_priority(&self, id: Uuid, priority: NotificationPriority) {
        if let Some(item) = self.rows.write().await.get_mut(&id) {
            item.priority = priority;
        }
    }

    /// Delayed items whose gate has elapsed become `pending` again (spec
    /// §4.6c).
    pub async fn promote_elapsed_delayed(&self, now: DateTime<Utc>) -> usize {
        let mut rows = self.rows.write().await;
        let mut promoted = 0;
        for item in rows.values_mut() {
            if item.status == NotificationQueueStatus::Delayed
                && item.next_allowed_at.is_some_and(|next| next <= now)
            {
                item.status = NotificationQueueStatus::Pending;
                item.next_allowed_at = None;
                promoted += 1;
            }
        }
        promoted
    }

    /// Reclaims `processing` rows whose lock is older than `stale_threshold`
    /// back to `pending` (spec §4.6 step 5 / §5 cancellation).
    pub async fn reclaim_stale(&self, now: DateTime<Utc>, stale_threshold: Duration) -> usize {
        let mut rows = self.rows.write().await;
        let mut reclaimed = 0;
        for item in rows.values_mut() {
            if item.is_stale_processing(now, stale_threshold) {
                item.status = NotificationQueueStatus::Pending;
                item.locked_by = None;
                item.locked_at = None;
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Bulk-cancels pending items whose `scheduled_for + stale_threshold`
    /// has passed (spec §4.6 "Stale cancellation").
    pub async fn cancel_stale_pending(&self, now: DateTime<Utc>, stale_threshold: Duration) -> usize {
        let mut rows = self.rows.write().await;
        let mut cancelled = 0;
        for item in rows.values_mut() {
            if item.status == NotificationQueueStatus::Pending && item.scheduled_for + stale_threshold < now {
                item.status = NotificationQueueStatus::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }
}

#[derive(Debug, Clone)]
struct UserNotificationState {
    metrics: UserMetrics,
    send_log: Vec<DateTime<Utc>>,
}

impl UserNotificationState {
    fn fresh(user_id: Uuid, org_id: Uuid) -> Self {
        Self {
            metrics: UserMetrics {
                user_id,
                org_id,
                last_app_active_at: None,
                last_slack_active_at: None,
                preferred_notification_frequency: NotificationFrequency::Moderate,
                notification_fatigue_level: 0,
                overall_engagement_score: 50,
                notifications_since_last_feedback: 0,
                last_feedback_requested_at: None,
            },
            send_log: Vec::new(),
        }
    }
}

/// User engagement/fatigue state plus a rolling send history, keyed by
/// `user_id`. The send history backs the hourly/daily frequency counters
/// (spec §4.6a) without needing a separate interaction query.
#[derive(Clone, Default)]
pub struct UserMetricsStore {
    rows: Arc<RwLock<HashMap<Uuid, UserNotificationState>>>,
}

impl UserMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, metrics: UserMetrics) {
        let mut rows = self.rows.write().await;
        let user_id = metrics.user_id;
        rows.insert(user_id, UserNotificationState { metrics, send_log: Vec::new() });
    }

    pub async fn get_or_create(&self, user_id: Uuid, org_id: Uuid) -> UserMetrics {
        let mut rows = self.rows.write().await;
        rows.entry(user_id).or_insert_with(|| UserNotificationState::fresh(user_id, org_id)).metrics.clone()
    }

    pub async fn last_send_at(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.rows.read().await.get(&user_id).and_then(|state| state.send_log.last().copied())
    }

    pub async fn sent_in_last(&self, user_id: Uuid, now: DateTime<Utc>, window: Duration) -> u32 {
        self.rows
            .read()
            .await
            .get(&user_id)
            .map(|state| state.send_log.iter().filter(|at| now - **at <= window).count() as u32)
            .unwrap_or(0)
    }

    pub async fn record_send(&self, user_id: Uuid, org_id: Uuid, now: DateTime<Utc>) {
        let mut rows = self.rows.write().await;
        let state = rows.entry(user_id).or_insert_with(|| UserNotificationState::fresh(user_id, org_id));
        state.send_log.push(now);
        state.metrics.notifications_since_last_feedback += 1;
    }

    pub async fn apply_feedback(&self, user_id: Uuid, feedback: NotificationFeedback) {
        if let Some(state) = self.rows.write().await.get_mut(&user_id) {
            state.metrics.apply_feedback(feedback);
        }
    }

    pub async fn mark_feedback_requested(&self, user_id: Uuid, now: DateTime<Utc>) {
        if let Some(state) = self.rows.write().await.get_mut(&user_id) {
            state.metrics.last_feedback_requested_at = Some(now);
            state.metrics.notifications_since_last_feedback = 0;
        }
    }

    /// Users for whom a feedback request is due (spec §4.6 feedback loop).
    pub async fn users_due_for_feedback(&self, now: DateTime<Utc>) -> Vec<UserMetrics> {
        self.rows
            .read()
            .await
            .values()
            .map(|state| &state.metrics)
            .filter(|metrics| {
                nimbus_orchestrator::notifications::feedback_request_due(
                    metrics.last_feedback_requested_at,
                    metrics.notifications_since_last_feedback,
                    now,
                )
            })
            .cloned()
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct RecordingStore {
    rows: Arc<RwLock<HashMap<Uuid, Recording>>>,
    by_calendar_event: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, recording: Recording) -> Uuid {
        let id = recording.id;
        if let Some(calendar_event_id) = &recording.calendar_event_id {
            self.by_calendar_event.write().await.insert(calendar_event_id.clone(), id);
        }
        self.rows.write().await.insert(id, recording);
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Recording> {
        self.rows.read().await.get(&id).cloned()
    }

    pub async fn for_calendar_event(&self, calendar_event_id: &str) -> Option<Recording> {
        let id = *self.by_calendar_event.read().await.get(calendar_event_id)?;
        self.get(id).await
    }

    pub async fn update(&self, id: Uuid, f: impl FnOnce(&mut Recording)) -> Option<Recording> {
        let mut rows = self.rows.write().await;
        let recording = rows.get_mut(&id)?;
        f(recording);
        Some(recording.clone())
    }

    /// Recordings eligible for the media upload worker this tick (spec
    /// §4.4): `pending` or `failed` with fewer than 3 retries, FIFO by
    /// `created_at`, capped at `batch_size`.
    pub async fn media_upload_candidates(&self, batch_size: usize) -> Vec<Recording> {
        use nimbus_types::MediaUploadStatus::*;
        let mut candidates: Vec<Recording> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| matches!(r.media_upload_status, Pending) || matches!(r.media_upload_status, Failed if r.media_upload_retry_count < 3))
            .cloned()
            .collect();
        candidates.sort_by_key(|r| r.created_at);
        candidates.truncate(batch_size);
        candidates
    }

    pub async fn transcript_candidates(&self) -> Vec<Recording> {
        self.rows.read().await.values().filter(|r| r.transcript.is_none()).cloned().collect()
    }
}

#[derive(Clone, Default)]
pub struct BotDeploymentStore {
    rows: Arc<RwLock<HashMap<Uuid, BotDeployment>>>,
    by_recording: Arc<RwLock<HashMap<Uuid, Uuid>>>,
}

impl BotDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, deployment: BotDeployment) -> Uuid {
        let id = deployment.id;
        self.by_recording.write().await.insert(deployment.recording_id, id);
        self.rows.write().await.insert(id, deployment);
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<BotDeployment> {
        self.rows.read().await.get(&id).cloned()
    }

    pub async fn for_recording(&self, recording_id: Uuid) -> Option<BotDeployment> {
        let id = *self.by_recording.read().await.get(&recording_id)?;
        self.get(id).await
    }

    /// Looks a deployment up by the provider's own bot identifier — the only
    /// handle a bot-status webhook carries (spec §4.3 tenant resolution).
    pub async fn for_bot_id(&self, bot_id: &str) -> Option<BotDeployment> {
        let rows = self.rows.read().await;
        rows.values().find(|d| d.bot_id == bot_id).cloned()
    }

    pub async fn update(&self, id: Uuid, f: impl FnOnce(&mut BotDeployment)) -> Option<BotDeployment> {
        let mut rows = self.rows.write().await;
        let deployment = rows.get_mut(&id)?;
        f(deployment);
        Some(deployment.clone())
    }
}

#[derive(Clone, Default)]
pub struct RetryJobStore {
    rows: Arc<RwLock<HashMap<String, RetryJob>>>,
}

impl RetryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn schedule(&self, target_entity_ref: &str, next_attempt_at: DateTime<Utc>, max_attempts: u32) {
        let mut rows = self.rows.write().await;
        let job = rows.entry(target_entity_ref.to_string()).or_insert_with(|| RetryJob {
            id: Uuid::new_v4(),
            target_entity_ref: target_entity_ref.to_string(),
            next_attempt_at,
            attempts: 0,
            max_attempts,
            backoff_base_ms: 30_000,
            backoff_cap_ms: 3_600_000,
        });
        job.attempts += 1;
        job.next_attempt_at = next_attempt_at;
    }

    pub async fn clear(&self, target_entity_ref: &str) {
        self.rows.write().await.remove(target_entity_ref);
    }

    pub async fn get(&self, target_entity_ref: &str) -> Option<RetryJob> {
        self.rows.read().await.get(target_entity_ref).cloned()
    }
}

pub fn notification_channel_key(channel: NotificationChannel) -> &'static str {
    match channel {
        NotificationChannel::SlackDm => "slack_dm",
        NotificationChannel::SlackChannel => "slack_channel",
        NotificationChannel::Email => "email",
        NotificationChannel::InApp => "in_app",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_types::NotificationChannel;
    use serde_json::json;

    fn sample_item(priority: NotificationPriority, scheduled_for: DateTime<Utc>) -> NotificationQueueItem {
        NotificationQueueItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest",
            NotificationChannel::InApp,
            priority,
            json!({}),
            scheduled_for,
            3,
        )
    }

    #[tokio::test]
    async fn claim_batch_orders_by_priority_then_scheduled_for() {
        let store = NotificationQueueStore::new();
        let now = Utc::now();
        let low = sample_item(NotificationPriority::Low, now - Duration::minutes(1));
        let urgent = sample_item(NotificationPriority::Urgent, now);
        store.insert(low.clone()).await;
        store.insert(urgent.clone()).await;

        let claimed = store.claim_batch(now, 10, "worker-1").await;
        assert_eq!(claimed[0].id, urgent.id);
        assert_eq!(claimed[1].id, low.id);
    }

    #[tokio::test]
    async fn stale_processing_rows_are_reclaimed() {
        let store = NotificationQueueStore::new();
        let now = Utc::now();
        let item = sample_item(NotificationPriority::Normal, now - Duration::minutes(10));
        let id = store.insert(item).await;
        store.claim_batch(now - Duration::minutes(10), 10, "worker-1").await;

        let reclaimed = store.reclaim_stale(now, Duration::minutes(5)).await;
        assert_eq!(reclaimed, 1);
        assert_eq!(store.get(id).await.unwrap().status, NotificationQueueStatus::Pending);
    }

    #[tokio::test]
    async fn media_upload_candidates_exclude_exhausted_failures() {
        let store = RecordingStore::new();
        let mut recording = sample_recording();
        recording.media_upload_status = nimbus_types::MediaUploadStatus::Failed;
        recording.media_upload_retry_count = 3;
        store.insert(recording).await;

        assert!(store.media_upload_candidates(10).await.is_empty());
    }

    fn sample_recording() -> Recording {
        Recording {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            meeting_platform: "meetingbaas".into(),
            meeting_url: "https://meet.example.com/x".into(),
            calendar_event_id: None,
            status: nimbus_types::RecordingStatus::Processing,
            media_storage_url: None,
            media_storage_path: None,
            media_upload_status: nimbus_types::MediaUploadStatus::Pending,
            media_upload_retry_count: 0,
            media_upload_last_retry_at: None,
            transcript: None,
            transcript_fetch_attempts: 0,
            last_transcript_fetch_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}
