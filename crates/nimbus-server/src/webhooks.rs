//! Webhook ingest handlers (spec §4.3): one pipeline shared by all four
//! sources — read the body once, verify its signature, parse it, insert it
//! into the idempotency log, resolve a tenant, run the source's domain
//! handler, then mark the log row terminal. Grounded on `tandem-server`'s
//! axum handler conventions (`State<AppState>`, `Result<_, ApiError>`) and
//! the corpus's webhook-outbox dedup pattern.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use nimbus_types::{NimbusError, WebhookEvent, WebhookStatus};
use nimbus_wire::fathom::{topic_of, FathomTopic, RawFathomEvent};
use nimbus_wire::meeting_recorder::{self, MeetingRecorderEventKind, RawMeetingRecorderEvent};
use nimbus_wire::sentry_bridge::RawSentryIssueEvent;
use nimbus_wire::stripe::{verify_stripe_signature, RawStripeEvent};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-nimbus-signature";
const TIMESTAMP_HEADER: &str = "x-nimbus-timestamp";
const ORG_HEADER: &str = "x-nimbus-org-id";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn shared_secret(state: &AppState, source: &str) -> Result<String, ApiError> {
    let config = state.config.get().await;
    config
        .webhook_secrets
        .get(source)
        .cloned()
        .ok_or_else(|| NimbusError::Unauthorized { reason: format!("no webhook secret configured for {source}") }.into())
}

fn verify_shared_signature(secret: &str, raw_body: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    let signature = header_str(headers, SIGNATURE_HEADER)
        .ok_or_else(|| NimbusError::Unauthorized { reason: "missing signature header".to_string() })?;
    let timestamp = header_str(headers, TIMESTAMP_HEADER)
        .ok_or_else(|| NimbusError::Unauthorized { reason: "missing timestamp header".to_string() })?;
    let verification = nimbus_core::auth::verify_webhook(secret, raw_body, signature, timestamp, Utc::now().timestamp());
    if verification.ok {
        Ok(())
    } else {
        Err(NimbusError::Unauthorized { reason: verification.reason.unwrap_or_else(|| "signature rejected".into()) }.into())
    }
}

/// Providers that supply their own `id` field give us a ready-made
/// idempotency key; ones that don't get a fallback content hash, so
/// dedup still holds even against a source with no explicit event id (spec
/// §9 open question resolution, recorded in `DESIGN.md`).
fn external_event_id(payload: &Value, raw_body: &str) -> String {
    payload
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| nimbus_observability::short_hash(raw_body))
}

enum IngestOutcome {
    Proceed { event_id: Uuid },
    AlreadyProcessed,
}

async fn ingest(state: &AppState, source: &str, event_type: &str, payload: Value, headers: &HeaderMap, raw_body: &str) -> IngestOutcome {
    let mut event = WebhookEvent::new(source, event_type, payload);
    event.external_event_id = Some(external_event_id(&event.payload, raw_body));
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            event.headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    match state.event_log.insert(event).await {
        nimbus_core::InsertOutcome::Inserted(inserted) => {
            state.event_log.set_status(inserted.id, WebhookStatus::Processing, None).await;
            IngestOutcome::Proceed { event_id: inserted.id }
        }
        nimbus_core::InsertOutcome::Duplicate { .. } => IngestOutcome::AlreadyProcessed,
    }
}

async fn finish(state: &AppState, event_id: Uuid, result: Result<(), String>) -> Result<Json<Value>, ApiError> {
    match result {
        Ok(()) => {
            state.event_log.set_status(event_id, WebhookStatus::Processed, None).await;
            Ok(Json(json!({ "status": "processed" })))
        }
        Err(reason) => {
            state.event_log.set_status(event_id, WebhookStatus::Failed, Some(reason.clone())).await;
            Err(NimbusError::Internal { reason }.into())
        }
    }
}

pub async fn meeting_recorder(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let raw_body = String::from_utf8_lossy(&body).to_string();
    let secret = shared_secret(&state, "meeting_recorder").await?;
    verify_shared_signature(&secret, &raw_body, &headers)?;

    let payload: Value = serde_json::from_str(&raw_body)
        .map_err(|e| NimbusError::BadRequest { reason: format!("invalid json: {e}") })?;
    let raw: RawMeetingRecorderEvent =
        serde_json::from_value(payload.clone()).map_err(|e| NimbusError::BadRequest { reason: format!("unexpected payload shape: {e}") })?;
    let normalized = meeting_recorder::normalize(&raw, &payload);

    let event_id = match ingest(&state, "meeting_recorder", "bot_status_changed", payload, &headers, &raw_body).await {
        IngestOutcome::AlreadyProcessed => return Ok(Json(json!({ "status": "duplicate" }))),
        IngestOutcome::Proceed { event_id } => event_id,
    };

    let deployment = match &normalized.bot_id {
        Some(bot_id) => state.bot_deployments.for_bot_id(bot_id).await,
        None => None,
    };

    let org_id = state
        .tenant_registry
        .resolve(None, normalized.bot_id.as_deref(), None, None)
        .await
        .or_else(|| deployment.as_ref().map(|d| d.org_id));

    let Some(_org_id) = org_id else {
        state.event_log.set_status(event_id, WebhookStatus::Failed, Some("unresolvable tenant".into())).await;
        return Err(NimbusError::Unauthorized { reason: "unresolvable tenant".into() }.into());
    };

    let Some(mut deployment) = deployment else {
        // A status update for a bot we never deployed — log and ignore rather
        // than fail the delivery outright (the provider will not retry a 200).
        state.event_log.set_status(event_id, WebhookStatus::Ignored, Some("no matching bot deployment".into())).await;
        return Ok(Json(json!({ "status": "ignored" })));
    };

    let result = match normalized.kind {
        MeetingRecorderEventKind::BotStatusChange { status_code, detail } => {
            match meeting_recorder::map_status_code(&status_code) {
                Some(next) => {
                    let commands = nimbus_orchestrator::reduce_lifecycle(
                        &mut deployment,
                        nimbus_orchestrator::LifecycleEvent::ProviderStatusChanged { next, detail },
                    );
                    match commands {
                        Some(commands) => {
                            state.bot_deployments.update(deployment.id, |d| *d = deployment.clone()).await;
                            apply_lifecycle_commands(&state, deployment.recording_id, commands).await;
                            Ok(())
                        }
                        None => Err(format!("illegal transition to {status_code}")),
                    }
                }
                None => Ok(()), // unrecognized status code: log-only, not a failure
            }
        }
        MeetingRecorderEventKind::TranscriptReady => {
            if let Some(commands) =
                nimbus_orchestrator::reduce_lifecycle(&mut deployment, nimbus_orchestrator::LifecycleEvent::TranscriptReady)
            {
                apply_lifecycle_commands(&state, deployment.recording_id, commands).await;
            }
            Ok(())
        }
        MeetingRecorderEventKind::Unknown(_) => Ok(()),
    };

    finish(&state, event_id, result).await
}

async fn apply_lifecycle_commands(state: &AppState, recording_id: Uuid, commands: Vec<nimbus_orchestrator::LifecycleCommand>) {
    use nimbus_orchestrator::LifecycleCommand::*;
    for command in commands {
        match command {
            SetRecordingStatus(status) => {
                state.recordings.update(recording_id, |r| r.status = status).await;
            }
            EnqueueMediaUploadJob => {
                state
                    .recordings
                    .update(recording_id, |r| r.media_upload_status = nimbus_types::MediaUploadStatus::Pending)
                    .await;
            }
            EnqueueTranscriptFetchJob => {
                // picked up on the next transcript worker tick via transcript_candidates()
            }
            EnqueueThumbnailJob => {
                // thumbnail generation is an out-of-scope external collaborator (spec §1 non-goals)
            }
            EnqueueCompletionNotification => {
                if let Some(recording) = state.recordings.get(recording_id).await {
                    let item = nimbus_types::NotificationQueueItem::new(
                        recording.user_id,
                        recording.org_id,
                        "recording_completed",
                        nimbus_types::NotificationChannel::InApp,
                        nimbus_types::NotificationPriority::Normal,
                        json!({ "recording_id": recording.id }),
                        Utc::now(),
                        3,
                    );
                    state.notification_queue.insert(item).await;
                }
            }
        }
    }
}

pub async fn meetings(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let raw_body = String::from_utf8_lossy(&body).to_string();
    let secret = shared_secret(&state, "fathom").await?;
    verify_shared_signature(&secret, &raw_body, &headers)?;

    let payload: Value = serde_json::from_str(&raw_body)
        .map_err(|e| NimbusError::BadRequest { reason: format!("invalid json: {e}") })?;
    let raw: RawFathomEvent =
        serde_json::from_value(payload.clone()).map_err(|e| NimbusError::BadRequest { reason: format!("unexpected payload shape: {e}") })?;

    let event_id = match ingest(&state, "fathom", "meeting_event", payload, &headers, &raw_body).await {
        IngestOutcome::AlreadyProcessed => return Ok(Json(json!({ "status": "duplicate" }))),
        IngestOutcome::Proceed { event_id } => event_id,
    };

    let recording = match &raw.recording_id {
        Some(id) => {
            if let Ok(uuid) = Uuid::parse_str(id) {
                state.recordings.get(uuid).await
            } else {
                None
            }
        }
        None => None,
    }
    .or(match &raw.meeting_id {
        Some(meeting_id) => state.recordings.for_calendar_event(meeting_id).await,
        None => None,
    });

    let Some(recording) = recording else {
        state.event_log.set_status(event_id, WebhookStatus::Ignored, Some("no matching recording".into())).await;
        return Ok(Json(json!({ "status": "ignored" })));
    };

    let result = match topic_of(&raw) {
        FathomTopic::TranscriptReady => {
            if let Some(text) = raw.transcript_text.clone() {
                state
                    .recordings
                    .update(recording.id, |r| {
                        r.transcript = Some(text);
                        r.last_transcript_fetch_at = Some(Utc::now());
                    })
                    .await;
                state.retry_jobs.clear(&format!("transcript_fetch:{}", recording.id)).await;
            }
            Ok(())
        }
        FathomTopic::SummaryReady | FathomTopic::ActionItemsReady | FathomTopic::Unknown(_) => Ok(()),
    };

    finish(&state, event_id, result).await
}

pub async fn stripe(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let raw_body = String::from_utf8_lossy(&body).to_string();
    let secret = shared_secret(&state, "stripe").await?;
    let signature = header_str(&headers, "stripe-signature")
        .ok_or_else(|| NimbusError::Unauthorized { reason: "missing Stripe-Signature header".to_string() })?;
    let verification = verify_stripe_signature(&secret, &raw_body, signature, Utc::now().timestamp());
    if !verification.ok {
        return Err(NimbusError::Unauthorized { reason: verification.reason.unwrap_or_else(|| "signature rejected".into()) }.into());
    }

    let payload: Value = serde_json::from_str(&raw_body)
        .map_err(|e| NimbusError::BadRequest { reason: format!("invalid json: {e}") })?;
    let raw: RawStripeEvent =
        serde_json::from_value(payload.clone()).map_err(|e| NimbusError::BadRequest { reason: format!("unexpected payload shape: {e}") })?;

    let event_id = match ingest(&state, "stripe", &raw.event_type, payload, &headers, &raw_body).await {
        IngestOutcome::AlreadyProcessed => return Ok(Json(json!({ "status": "duplicate" }))),
        IngestOutcome::Proceed { event_id } => event_id,
    };

    // Billing-plan state and customer/org reconciliation are an external
    // collaborator's concern (spec §1 non-goals); ingest logs the delivery
    // for audit and stops there.
    finish(&state, event_id, Ok(())).await
}

pub async fn sentry_bridge(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let raw_body = String::from_utf8_lossy(&body).to_string();
    let secret = shared_secret(&state, "sentry_bridge").await?;
    verify_shared_signature(&secret, &raw_body, &headers)?;

    let payload: Value = serde_json::from_str(&raw_body)
        .map_err(|e| NimbusError::BadRequest { reason: format!("invalid json: {e}") })?;
    let raw: RawSentryIssueEvent =
        serde_json::from_value(payload.clone()).map_err(|e| NimbusError::BadRequest { reason: format!("unexpected payload shape: {e}") })?;

    let event_id = match ingest(&state, "sentry_bridge", "issue_event", payload, &headers, &raw_body).await {
        IngestOutcome::AlreadyProcessed => return Ok(Json(json!({ "status": "duplicate" }))),
        IngestOutcome::Proceed { event_id } => event_id,
    };

    // This payload shape carries no tenant identifier of its own (spec §6);
    // the proxying signer attaches the resolved org as a header instead.
    let org_header = header_str(&headers, ORG_HEADER).and_then(|v| Uuid::parse_str(v).ok());
    let org_id = state.tenant_registry.resolve(org_header, None, None, None).await;

    let Some(org_id) = org_id else {
        state.event_log.set_status(event_id, WebhookStatus::Failed, Some("unresolvable tenant".into())).await;
        return Err(NimbusError::Unauthorized { reason: "unresolvable tenant".into() }.into());
    };

    let rules = state.routing_rules.for_org(org_id).await;
    let input = nimbus_orchestrator::rules::RoutingMatchInput {
        environment: raw.environment.as_deref(),
        level: raw.level.as_deref(),
        release: raw.release.as_deref(),
        title: &raw.title,
    };
    if let Some(matched) = nimbus_orchestrator::evaluate_routing_rules(&rules, &input) {
        nimbus_observability::emit_event(
            tracing::Level::INFO,
            nimbus_observability::ProcessKind::Engine,
            nimbus_observability::ObservabilityEvent {
                event: "routing_rule_matched",
                component: "sentry_bridge_webhook",
                org_id: Some(&org_id.to_string()),
                user_id: None,
                source: Some("sentry_bridge"),
                entity_ref: Some(&raw.id),
                status: Some(if matched.test_mode { "test_mode" } else { "routed" }),
                error_code: None,
                detail: Some(&matched.rule.target_project_id),
            },
        );
    }

    finish(&state, event_id, Ok(())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{HeaderName, HeaderValue};
    use chrono::Duration;
    use nimbus_clients::{
        ClientError, DeployBotRequest, DeployBotResponse, MediaAsset, MeetingPlatformClient, ObjectStoreClient,
    };
    use nimbus_types::{BotDeployment, BotDeploymentStatus, Recording, RecordingStatus};
    use std::time::{SystemTime, UNIX_EPOCH};

    struct UnusedMeetingClient;

    #[async_trait]
    impl MeetingPlatformClient for UnusedMeetingClient {
        async fn deploy_bot(&self, _tenant_id: &str, _request: DeployBotRequest) -> Result<DeployBotResponse, ClientError> {
            unimplemented!("not exercised by webhook ingest tests")
        }
        async fn cancel_bot(&self, _tenant_id: &str, _bot_id: &str) -> Result<(), ClientError> {
            unimplemented!("not exercised by webhook ingest tests")
        }
        async fn fetch_media(&self, _tenant_id: &str, _bot_id: &str) -> Result<MediaAsset, ClientError> {
            unimplemented!("not exercised by webhook ingest tests")
        }
        async fn fetch_transcript(&self, _tenant_id: &str, _bot_id: &str) -> Result<Option<String>, ClientError> {
            unimplemented!("not exercised by webhook ingest tests")
        }
    }

    struct UnusedObjectStore;

    #[async_trait]
    impl ObjectStoreClient for UnusedObjectStore {
        async fn upload(&self, _path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<(), ClientError> {
            unimplemented!("not exercised by webhook ingest tests")
        }
        async fn presigned_url(&self, _path: &str, _expiry: Duration) -> Result<String, ClientError> {
            unimplemented!("not exercised by webhook ingest tests")
        }
    }

    async fn test_state() -> AppState {
        let mut path = std::env::temp_dir();
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
        path.push(format!("nimbus-server-webhooks-test-{ts}.json"));
        let config = nimbus_core::ConfigStore::new(&path, None).await.expect("config store");
        config
            .patch_runtime(json!({
                "webhook_secrets": {
                    "meeting_recorder": "meeting-secret",
                    "fathom": "fathom-secret",
                    "stripe": "stripe-secret",
                    "sentry_bridge": "sentry-secret",
                }
            }))
            .await
            .expect("patch runtime");

        AppState::new(config, std::sync::Arc::new(UnusedMeetingClient), std::sync::Arc::new(UnusedObjectStore)).await
    }

    fn shared_signature_headers(secret: &str, raw_body: &str) -> HeaderMap {
        let timestamp = Utc::now().timestamp();
        let payload = format!("{timestamp}:{raw_body}");
        let signature = format!("v1={}", nimbus_core::auth::hmac_sign(secret, &payload));
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-nimbus-signature"), HeaderValue::from_str(&signature).unwrap());
        headers.insert(HeaderName::from_static("x-nimbus-timestamp"), HeaderValue::from_str(&timestamp.to_string()).unwrap());
        headers
    }

    fn status_of(result: Result<impl IntoResponse, ApiError>) -> axum::http::StatusCode {
        match result {
            Ok(response) => response.into_response().status(),
            Err(err) => err.into_response().status(),
        }
    }

    fn sample_deployment(recording_id: Uuid, org_id: Uuid) -> BotDeployment {
        BotDeployment {
            id: Uuid::new_v4(),
            org_id,
            recording_id,
            bot_id: "bot-1".to_string(),
            status: BotDeploymentStatus::Scheduled,
            status_history: vec![],
            scheduled_join_time: Utc::now(),
            actual_join_time: None,
            leave_time: None,
            error_code: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn sample_recording(org_id: Uuid) -> Recording {
        Recording {
            id: Uuid::new_v4(),
            org_id,
            user_id: Uuid::new_v4(),
            meeting_platform: "zoom".to_string(),
            meeting_url: "https://zoom.example/1".to_string(),
            calendar_event_id: Some("cal-evt-1".to_string()),
            status: RecordingStatus::BotJoining,
            media_storage_url: None,
            media_storage_path: None,
            media_upload_status: nimbus_types::MediaUploadStatus::NotStarted,
            media_upload_retry_count: 0,
            media_upload_last_retry_at: None,
            transcript: None,
            transcript_fetch_attempts: 0,
            last_transcript_fetch_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn meeting_recorder_rejects_bad_signature() {
        let state = test_state().await;
        let body = json!({ "type": "bot.status_change", "bot_id": "bot-1", "status": { "code": "joining_call" } }).to_string();
        let mut headers = shared_signature_headers("wrong-secret", &body);
        headers.remove("x-nimbus-signature");
        headers.insert(
            HeaderName::from_static("x-nimbus-signature"),
            HeaderValue::from_static("v1=0000000000000000000000000000000000000000000000000000000000000000"),
        );

        let result = meeting_recorder(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn meeting_recorder_applies_status_transition_and_updates_deployment() {
        let state = test_state().await;
        let org_id = Uuid::new_v4();
        let recording = sample_recording(org_id);
        let recording_id = recording.id;
        state.recordings.insert(recording).await;
        let deployment = sample_deployment(recording_id, org_id);
        state.bot_deployments.insert(deployment).await;
        state.tenant_registry.register_bot("bot-1", org_id).await;

        let body = json!({ "type": "bot.status_change", "bot_id": "bot-1", "status": { "code": "joining_call" } }).to_string();
        let headers = shared_signature_headers("meeting-secret", &body);

        let result = meeting_recorder(State(state.clone()), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::OK);

        let deployment = state.bot_deployments.for_bot_id("bot-1").await.expect("deployment present");
        assert_eq!(deployment.status, BotDeploymentStatus::Joining);
    }

    #[tokio::test]
    async fn meeting_recorder_completion_enqueues_notification() {
        let state = test_state().await;
        let org_id = Uuid::new_v4();
        let recording = sample_recording(org_id);
        let recording_id = recording.id;
        state.recordings.insert(recording).await;
        let mut deployment = sample_deployment(recording_id, org_id);
        deployment.status = BotDeploymentStatus::Leaving;
        state.bot_deployments.insert(deployment).await;
        state.tenant_registry.register_bot("bot-1", org_id).await;

        let body = json!({ "type": "bot.status_change", "bot_id": "bot-1", "status": { "code": "done" } }).to_string();
        let headers = shared_signature_headers("meeting-secret", &body);

        let result = meeting_recorder(State(state.clone()), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::OK);

        let recording = state.recordings.get(recording_id).await.expect("recording present");
        assert_eq!(recording.media_upload_status, nimbus_types::MediaUploadStatus::Pending);
    }

    #[tokio::test]
    async fn meeting_recorder_unresolvable_tenant_is_rejected() {
        let state = test_state().await;
        let body = json!({ "type": "bot.status_change", "bot_id": "unknown-bot", "status": { "code": "joining_call" } }).to_string();
        let headers = shared_signature_headers("meeting-secret", &body);

        let result = meeting_recorder(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn meetings_transcript_ready_stores_transcript_and_clears_retry_job() {
        let state = test_state().await;
        let org_id = Uuid::new_v4();
        let recording = sample_recording(org_id);
        let recording_id = recording.id;
        state.recordings.insert(recording).await;
        state
            .retry_jobs
            .schedule(&format!("transcript_fetch:{recording_id}"), Utc::now(), 12)
            .await;

        let body = json!({
            "topic": "transcript.ready",
            "recording_id": recording_id.to_string(),
            "transcript_text": "hello world",
        })
        .to_string();
        let headers = shared_signature_headers("fathom-secret", &body);

        let result = meetings(State(state.clone()), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::OK);

        let recording = state.recordings.get(recording_id).await.expect("recording present");
        assert_eq!(recording.transcript.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn meetings_ignores_event_for_unknown_recording() {
        let state = test_state().await;
        let body = json!({
            "topic": "transcript.ready",
            "recording_id": Uuid::new_v4().to_string(),
            "transcript_text": "hello world",
        })
        .to_string();
        let headers = shared_signature_headers("fathom-secret", &body);

        let result = meetings(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn stripe_accepts_valid_signature_and_logs_delivery() {
        let state = test_state().await;
        let body = json!({ "id": "evt_1", "type": "invoice.paid", "data": {} }).to_string();
        let timestamp = Utc::now().timestamp();
        let signed_payload = format!("{timestamp}.{body}");
        let signature = nimbus_core::auth::hmac_sign("stripe-secret", &signed_payload);
        let header_value = format!("t={timestamp},v1={signature}");
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_str(&header_value).unwrap(),
        );

        let result = stripe(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn sentry_bridge_rejects_missing_org_header() {
        let state = test_state().await;
        let body = json!({ "id": "evt_1", "title": "boom" }).to_string();
        let headers = shared_signature_headers("sentry-secret", &body);

        let result = sentry_bridge(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sentry_bridge_resolves_tenant_via_org_header() {
        let state = test_state().await;
        let org_id = Uuid::new_v4();
        let body = json!({ "id": "evt_1", "title": "boom", "environment": "production" }).to_string();
        let mut headers = shared_signature_headers("sentry-secret", &body);
        headers.insert(
            HeaderName::from_static("x-nimbus-org-id"),
            HeaderValue::from_str(&org_id.to_string()).unwrap(),
        );

        let result = sentry_bridge(State(state), headers, Bytes::from(body)).await;
        assert_eq!(status_of(result), axum::http::StatusCode::OK);
    }
}
