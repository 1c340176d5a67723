//! Notification queue worker (spec §4.6): claims a batch, frequency-gates
//! each item, dispatches to the matching channel driver, and reclaims/cancels
//! stale rows. Grounded on the teacher's cron-tick worker shape, generalized
//! from session-sweep bookkeeping to notification delivery.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nimbus_channels::ChannelDriver;
use nimbus_orchestrator::notifications::{check_frequency, next_allowed_at, FrequencyCheckInput, FrequencyDecision};
use nimbus_types::{NotificationChannel, NotificationQueueItem};
use nimbus_observability::{emit_event, ObservabilityEvent, ProcessKind};
use serde_json::json;

use crate::stores::{NotificationQueueStore, UserMetricsStore};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct NotificationTickReport {
    pub promoted: usize,
    pub claimed: usize,
    pub sent: usize,
    pub delayed: usize,
    pub failed: usize,
    pub reclaimed: usize,
    pub cancelled: usize,
    pub feedback_requests_queued: usize,
}

pub struct NotificationWorker {
    queue: NotificationQueueStore,
    metrics: UserMetricsStore,
    drivers: HashMap<NotificationChannel, Arc<dyn ChannelDriver>>,
    batch_size: usize,
    stale_threshold: Duration,
    worker_id: String,
}

impl NotificationWorker {
    pub fn new(
        queue: NotificationQueueStore,
        metrics: UserMetricsStore,
        drivers: HashMap<NotificationChannel, Arc<dyn ChannelDriver>>,
    ) -> Self {
        Self {
            queue,
            metrics,
            drivers,
            batch_size: 50,
            stale_threshold: Duration::minutes(10),
            worker_id: "notification-worker".to_string(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_stale_threshold(mut self, stale_threshold: Duration) -> Self {
        self.stale_threshold = stale_threshold;
        self
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> NotificationTickReport {
        let mut report = NotificationTickReport::default();
        report.promoted = self.queue.promote_elapsed_delayed(now).await;

        let claimed = self.queue.claim_batch(now, self.batch_size, &self.worker_id).await;
        report.claimed = claimed.len();

        for item in claimed {
            self.process_claimed(&item, now, &mut report).await;
        }

        report.reclaimed = self.queue.reclaim_stale(now, self.stale_threshold).await;
        report.cancelled = self.queue.cancel_stale_pending(now, self.stale_threshold).await;
        report.feedback_requests_queued = self.queue_due_feedback_requests(now).await;

        emit_event(
            tracing::Level::INFO,
            ProcessKind::Worker,
            ObservabilityEvent {
                event: "notification_tick",
                component: "notification_worker",
                org_id: None,
                user_id: None,
                source: None,
                entity_ref: None,
                status: Some("completed"),
                error_code: None,
                detail: Some(&serde_json::to_string(&report).unwrap_or_default()),
            },
        );

        report
    }

    async fn process_claimed(&self, item: &NotificationQueueItem, now: DateTime<Utc>, report: &mut NotificationTickReport) {
        let metrics = self.metrics.get_or_create(item.user_id, item.org_id).await;
        let sent_in_last_hour = self.metrics.sent_in_last(item.user_id, now, Duration::hours(1)).await;
        let sent_in_last_day = self.metrics.sent_in_last(item.user_id, now, Duration::days(1)).await;
        let last_send_at = self.metrics.last_send_at(item.user_id).await;

        let input = FrequencyCheckInput {
            priority: item.priority,
            preferred_frequency: metrics.preferred_notification_frequency,
            fatigue_level: metrics.notification_fatigue_level,
            sent_in_last_hour,
            sent_in_last_day,
            last_send_at,
            now,
        };

        let mut decision = check_frequency(&input);
        let mut downgraded = None;
        if decision == FrequencyDecision::Blocked {
            let downgraded_priority = item.priority.downgrade();
            if downgraded_priority != item.priority {
                let retry_input = FrequencyCheckInput { priority: downgraded_priority, ..input };
                decision = check_frequency(&retry_input);
                if decision == FrequencyDecision::Allowed {
                    downgraded = Some(downgraded_priority);
                }
            }
        }

        if decision == FrequencyDecision::Blocked {
            let next = next_allowed_at(item.priority, metrics.notification_fatigue_level, last_send_at, now);
            self.queue.mark_delayed(item.id, next, downgraded).await;
            report.delayed += 1;
            return;
        }

        if let Some(priority) = downgraded {
            self.queue.set_priority(item.id, priority).await;
        }

        let driver = self.drivers.get(&item.channel);
        match driver {
            None => {
                self.queue.mark_failed(item.id, "no channel driver configured").await;
                report.failed += 1;
            }
            Some(driver) => match driver.send(item).await {
                Ok(()) => {
                    self.queue.mark_sent(item.id).await;
                    self.metrics.record_send(item.user_id, item.org_id, now).await;
                    report.sent += 1;
                }
                Err(nimbus_channels::ChannelError::Permanent(reason)) => {
                    self.queue.mark_failed(item.id, &reason).await;
                    report.failed += 1;
                }
                Err(nimbus_channels::ChannelError::Transient(reason)) => {
                    if item.attempt_count + 1 >= item.max_attempts {
                        self.queue.mark_failed(item.id, &reason).await;
                        report.failed += 1;
                    } else {
                        let backoff = Duration::seconds(30 * 2i64.pow(item.attempt_count));
                        self.queue.requeue_with_backoff(item.id, &reason, backoff, now).await;
                    }
                }
            },
        }
    }

    async fn queue_due_feedback_requests(&self, now: DateTime<Utc>) -> usize {
        let due = self.metrics.users_due_for_feedback(now).await;
        let mut queued = 0;
        for metrics in due {
            let item = NotificationQueueItem::new(
                metrics.user_id,
                metrics.org_id,
                "feedback_request",
                NotificationChannel::InApp,
                nimbus_types::NotificationPriority::Low,
                json!({ "reason": "periodic_feedback_check_in" }),
                now,
                1,
            );
            self.queue.insert(item).await;
            self.metrics.mark_feedback_requested(metrics.user_id, now).await;
            queued += 1;
        }
        queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nimbus_types::{NotificationPriority, NotificationQueueStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingDriver {
        calls: Arc<AtomicUsize>,
        fail_permanent: bool,
    }

    #[async_trait]
    impl ChannelDriver for CountingDriver {
        async fn send(&self, _item: &NotificationQueueItem) -> Result<(), nimbus_channels::ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_permanent {
                Err(nimbus_channels::ChannelError::Permanent("rejected".into()))
            } else {
                Ok(())
            }
        }
    }

    fn worker(driver: Arc<dyn ChannelDriver>) -> NotificationWorker {
        let mut drivers: HashMap<NotificationChannel, Arc<dyn ChannelDriver>> = HashMap::new();
        drivers.insert(NotificationChannel::InApp, driver);
        NotificationWorker::new(NotificationQueueStore::new(), UserMetricsStore::new(), drivers)
    }

    #[tokio::test]
    async fn successful_send_marks_sent_and_records_history() {
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = worker(Arc::new(CountingDriver { calls: calls.clone(), fail_permanent: false }));
        let now = Utc::now();
        let item = NotificationQueueItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest",
            NotificationChannel::InApp,
            NotificationPriority::Normal,
            json!({}),
            now,
            3,
        );
        let id = worker.queue.insert(item).await;

        let report = worker.tick(now).await;
        assert_eq!(report.sent, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(worker.queue.get(id).await.unwrap().status, NotificationQueueStatus::Sent);
    }

    #[tokio::test]
    async fn permanent_channel_failure_marks_failed_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = worker(Arc::new(CountingDriver { calls, fail_permanent: true }));
        let now = Utc::now();
        let item = NotificationQueueItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "digest",
            NotificationChannel::InApp,
            NotificationPriority::Normal,
            json!({}),
            now,
            3,
        );
        let id = worker.queue.insert(item).await;

        worker.tick(now).await;
        assert_eq!(worker.queue.get(id).await.unwrap().status, NotificationQueueStatus::Failed);
    }

    #[tokio::test]
    async fn cooldown_blocked_item_is_delayed_not_sent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = worker(Arc::new(CountingDriver { calls: calls.clone(), fail_permanent: false }));
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        worker.metrics.get_or_create(user_id, org_id).await;
        worker.metrics.record_send(user_id, org_id, now - Duration::minutes(1)).await;

        let item = NotificationQueueItem::new(
            user_id,
            org_id,
            "digest",
            NotificationChannel::InApp,
            NotificationPriority::Normal,
            json!({}),
            now,
            3,
        );
        let id = worker.queue.insert(item).await;

        let report = worker.tick(now).await;
        assert_eq!(report.delayed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(worker.queue.get(id).await.unwrap().status, NotificationQueueStatus::Delayed);
    }
}
