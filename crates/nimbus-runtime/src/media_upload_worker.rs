//! Media upload worker (spec §4.4): uploads completed recordings' media to
//! the object store on a `[2, 5, 10]`-minute backoff, retiring a recording
//! once its provider media URL has expired (4h by default) instead of
//! retrying forever.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nimbus_clients::{recording_object_path, MeetingPlatformClient, ObjectStoreClient};
use nimbus_observability::{emit_event, ObservabilityEvent, ProcessKind};
use nimbus_types::MediaUploadStatus;

use crate::stores::{BotDeploymentStore, RecordingStore};

const RETRY_BACKOFF_MINUTES: [i64; 3] = [2, 5, 10];
const PRESIGNED_URL_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MediaUploadTickReport {
    pub attempted: usize,
    pub uploaded: usize,
    pub expired: usize,
    pub failed: usize,
    pub skipped_backoff: usize,
}

pub struct MediaUploadWorker {
    recordings: RecordingStore,
    deployments: BotDeploymentStore,
    meeting_client: Arc<dyn MeetingPlatformClient>,
    object_store: Arc<dyn ObjectStoreClient>,
    batch_size: usize,
    provider_url_expiry: Duration,
}

impl MediaUploadWorker {
    pub fn new(
        recordings: RecordingStore,
        deployments: BotDeploymentStore,
        meeting_client: Arc<dyn MeetingPlatformClient>,
        object_store: Arc<dyn ObjectStoreClient>,
    ) -> Self {
        Self {
            recordings,
            deployments,
            meeting_client,
            object_store,
            batch_size: 10,
            provider_url_expiry: Duration::hours(4),
        }
    }

    pub fn with_provider_url_expiry_hours(mut self, hours: i64) -> Self {
        self.provider_url_expiry = Duration::hours(hours);
        self
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> MediaUploadTickReport {
        let mut report = MediaUploadTickReport::default();
        let candidates = self.recordings.media_upload_candidates(self.batch_size).await;

        for recording in candidates {
            if !self.backoff_elapsed(&recording, now) {
                report.skipped_backoff += 1;
                continue;
            }
            report.attempted += 1;

            let deployment = self.deployments.for_recording(recording.id).await;
            if let Some(deployment) = &deployment {
                if now - deployment.created_at > self.provider_url_expiry {
                    self.recordings
                        .update(recording.id, |r| {
                            r.media_upload_status = MediaUploadStatus::Failed;
                            r.error_message = Some("media URLs expired before upload completed".to_string());
                        })
                        .await;
                    report.expired += 1;
                    continue;
                }
            }

            let Some(deployment) = deployment else {
                report.skipped_backoff += 1;
                continue;
            };

            match self.upload_one(&recording, &deployment.bot_id, now).await {
                Ok(()) => report.uploaded += 1,
                Err(reason) => {
                    self.recordings
                        .update(recording.id, |r| {
                            r.media_upload_status = MediaUploadStatus::Failed;
                            r.media_upload_retry_count += 1;
                            r.media_upload_last_retry_at = Some(now);
                            r.error_message = Some(nimbus_types::NimbusError::truncate_diagnostic(&reason));
                        })
                        .await;
                    emit_event(
                        tracing::Level::WARN,
                        ProcessKind::Worker,
                        ObservabilityEvent {
                            event: "media_upload_failed",
                            component: "media_upload_worker",
                            org_id: Some(&recording.org_id.to_string()),
                            user_id: Some(&recording.user_id.to_string()),
                            source: None,
                            entity_ref: Some(&recording.id.to_string()),
                            status: Some("failed"),
                            error_code: None,
                            detail: Some(&reason),
                        },
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn backoff_elapsed(&self, recording: &nimbus_types::Recording, now: DateTime<Utc>) -> bool {
        if recording.media_upload_retry_count == 0 {
            return true;
        }
        let Some(last_retry) = recording.media_upload_last_retry_at else {
            return true;
        };
        let index = (recording.media_upload_retry_count as usize - 1).min(RETRY_BACKOFF_MINUTES.len() - 1);
        let gate = Duration::minutes(RETRY_BACKOFF_MINUTES[index]);
        now - last_retry >= gate
    }

    async fn upload_one(
        &self,
        recording: &nimbus_types::Recording,
        bot_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let tenant_id = recording.org_id.to_string();
        let asset = self.meeting_client.fetch_media(&tenant_id, bot_id).await.map_err(|e| e.to_string())?;
        let extension = nimbus_clients::extension_for_content_type(&asset.content_type);
        let path = recording_object_path(
            &recording.org_id.to_string(),
            &recording.user_id.to_string(),
            &recording.id.to_string(),
            extension,
        );

        self.object_store
            .upload(&path, asset.bytes, &asset.content_type)
            .await
            .map_err(|e| e.to_string())?;
        let url = self
            .object_store
            .presigned_url(&path, Duration::days(PRESIGNED_URL_DAYS))
            .await
            .map_err(|e| e.to_string())?;

        self.recordings.update(recording.id, |r| r.complete_media_upload(url, path)).await;
        emit_event(
            tracing::Level::INFO,
            ProcessKind::Worker,
            ObservabilityEvent {
                event: "media_upload_completed",
                component: "media_upload_worker",
                org_id: Some(&recording.org_id.to_string()),
                user_id: Some(&recording.user_id.to_string()),
                source: None,
                entity_ref: Some(&recording.id.to_string()),
                status: Some("completed"),
                error_code: None,
                detail: None,
            },
        );
        let _ = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nimbus_clients::{ClientError, DeployBotRequest, DeployBotResponse, MediaAsset};
    use nimbus_types::{BotDeployment, BotDeploymentStatus, Recording, RecordingStatus};
    use uuid::Uuid;

    struct FakeMeetingClient;

    #[async_trait]
    impl MeetingPlatformClient for FakeMeetingClient {
        async fn deploy_bot(&self, _tenant_id: &str, _request: DeployBotRequest) -> Result<DeployBotResponse, ClientError> {
            unimplemented!()
        }
        async fn cancel_bot(&self, _tenant_id: &str, _bot_id: &str) -> Result<(), ClientError> {
            unimplemented!()
        }
        async fn fetch_media(&self, _tenant_id: &str, _bot_id: &str) -> Result<MediaAsset, ClientError> {
            Ok(MediaAsset { bytes: vec![1, 2, 3], content_type: "video/mp4".to_string() })
        }
        async fn fetch_transcript(&self, _tenant_id: &str, _bot_id: &str) -> Result<Option<String>, ClientError> {
            unimplemented!()
        }
    }

    struct FakeObjectStore;

    #[async_trait]
    impl ObjectStoreClient for FakeObjectStore {
        async fn upload(&self, _path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn presigned_url(&self, path: &str, _expiry: Duration) -> Result<String, ClientError> {
            Ok(format!("https://example.com/{path}"))
        }
    }

    fn sample_recording() -> Recording {
        Recording {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            meeting_platform: "meetingbaas".into(),
            meeting_url: "https://meet.example.com/x".into(),
            calendar_event_id: None,
            status: RecordingStatus::Processing,
            media_storage_url: None,
            media_storage_path: None,
            media_upload_status: MediaUploadStatus::Pending,
            media_upload_retry_count: 0,
            media_upload_last_retry_at: None,
            transcript: None,
            transcript_fetch_attempts: 0,
            last_transcript_fetch_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn sample_deployment(recording_id: Uuid, created_at: DateTime<Utc>) -> BotDeployment {
        BotDeployment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            recording_id,
            bot_id: "bot-1".into(),
            status: BotDeploymentStatus::Completed,
            status_history: vec![],
            scheduled_join_time: created_at,
            actual_join_time: Some(created_at),
            leave_time: Some(created_at),
            error_code: None,
            error_message: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn uploads_eligible_recording_and_completes_it() {
        let recordings = RecordingStore::new();
        let deployments = BotDeploymentStore::new();
        let now = Utc::now();
        let recording = sample_recording();
        let id = recordings.insert(recording).await;
        deployments.insert(sample_deployment(id, now)).await;

        let worker = MediaUploadWorker::new(recordings.clone(), deployments, Arc::new(FakeMeetingClient), Arc::new(FakeObjectStore));
        let report = worker.tick(now).await;

        assert_eq!(report.uploaded, 1);
        let updated = recordings.get(id).await.unwrap();
        assert_eq!(updated.media_upload_status, MediaUploadStatus::Complete);
        assert!(updated.media_storage_url.is_some());
    }

    #[tokio::test]
    async fn expired_provider_url_marks_recording_failed() {
        let recordings = RecordingStore::new();
        let deployments = BotDeploymentStore::new();
        let now = Utc::now();
        let recording = sample_recording();
        let id = recordings.insert(recording).await;
        deployments.insert(sample_deployment(id, now - Duration::hours(5))).await;

        let worker = MediaUploadWorker::new(recordings.clone(), deployments, Arc::new(FakeMeetingClient), Arc::new(FakeObjectStore));
        let report = worker.tick(now).await;

        assert_eq!(report.expired, 1);
        assert_eq!(recordings.get(id).await.unwrap().media_upload_status, MediaUploadStatus::Failed);
    }

    #[tokio::test]
    async fn retry_gate_skips_recently_retried_recording() {
        let recordings = RecordingStore::new();
        let deployments = BotDeploymentStore::new();
        let now = Utc::now();
        let mut recording = sample_recording();
        recording.media_upload_status = MediaUploadStatus::Failed;
        recording.media_upload_retry_count = 1;
        recording.media_upload_last_retry_at = Some(now - Duration::minutes(1));
        let id = recordings.insert(recording).await;
        deployments.insert(sample_deployment(id, now)).await;

        let worker = MediaUploadWorker::new(recordings.clone(), deployments, Arc::new(FakeMeetingClient), Arc::new(FakeObjectStore));
        let report = worker.tick(now).await;

        assert_eq!(report.skipped_backoff, 1);
        assert_eq!(report.uploaded, 0);
    }
}
