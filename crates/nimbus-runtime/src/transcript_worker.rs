//! Transcript fetch worker (spec §4.4): polls the meeting platform for a
//! transcript once media is available. A `404` means "not yet ready", not a
//! failure — it schedules a retry instead of marking the recording failed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nimbus_clients::{ClientError, MeetingPlatformClient};
use nimbus_observability::{emit_event, ObservabilityEvent, ProcessKind};

use crate::stores::{BotDeploymentStore, RecordingStore, RetryJobStore};

const RETRY_BASE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TranscriptTickReport {
    pub attempted: usize,
    pub fetched: usize,
    pub not_yet_ready: usize,
    pub errored: usize,
}

pub struct TranscriptWorker {
    recordings: RecordingStore,
    deployments: BotDeploymentStore,
    retry_jobs: RetryJobStore,
    meeting_client: Arc<dyn MeetingPlatformClient>,
}

impl TranscriptWorker {
    pub fn new(
        recordings: RecordingStore,
        deployments: BotDeploymentStore,
        retry_jobs: RetryJobStore,
        meeting_client: Arc<dyn MeetingPlatformClient>,
    ) -> Self {
        Self { recordings, deployments, retry_jobs, meeting_client }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> TranscriptTickReport {
        let mut report = TranscriptTickReport::default();
        let candidates = self.recordings.transcript_candidates().await;

        for recording in candidates {
            let Some(deployment) = self.deployments.for_recording(recording.id).await else {
                continue;
            };
            report.attempted += 1;

            let job_key = format!("recording:{}", recording.id);
            self.recordings
                .update(recording.id, |r| {
                    r.transcript_fetch_attempts += 1;
                    r.last_transcript_fetch_at = Some(now);
                })
                .await;

            let tenant_id = recording.org_id.to_string();
            match self.meeting_client.fetch_transcript(&tenant_id, &deployment.bot_id).await {
                Ok(Some(transcript)) => {
                    self.recordings.update(recording.id, |r| r.transcript = Some(transcript)).await;
                    self.retry_jobs.clear(&job_key).await;
                    report.fetched += 1;
                }
                Ok(None) => {
                    let next_attempt = now + Duration::minutes(RETRY_BASE_MINUTES);
                    self.retry_jobs.schedule(&job_key, next_attempt, 12).await;
                    report.not_yet_ready += 1;
                }
                Err(err) => {
                    self.record_error(&recording.id.to_string(), &recording.org_id.to_string(), &job_key, now, &err).await;
                    report.errored += 1;
                }
            }
        }

        report
    }

    async fn record_error(&self, recording_id: &str, org_id: &str, job_key: &str, now: DateTime<Utc>, err: &ClientError) {
        let next_attempt = now + Duration::minutes(RETRY_BASE_MINUTES);
        self.retry_jobs.schedule(job_key, next_attempt, 12).await;
        emit_event(
            tracing::Level::WARN,
            ProcessKind::Worker,
            ObservabilityEvent {
                event: "transcript_fetch_failed",
                component: "transcript_worker",
                org_id: Some(org_id),
                user_id: None,
                source: None,
                entity_ref: Some(recording_id),
                status: Some("retry_scheduled"),
                error_code: None,
                detail: Some(&err.to_string()),
            },
        );
    }
}
