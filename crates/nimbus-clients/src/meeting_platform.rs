//! Meeting-recording provider control plane (spec §6 outbound interfaces):
//! bot deploy/cancel, fetch recorded media, fetch transcript. Built on
//! [`ExternalHttpClient`] the same way `tandem-providers::Provider`
//! implementations wrap a bare `reqwest::Client` with a typed trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ClientError;
use crate::http_client::ExternalHttpClient;

#[derive(Debug, Clone, Serialize)]
pub struct DeployBotRequest {
    pub meeting_url: String,
    pub join_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployBotResponse {
    pub bot_id: String,
}

/// A downloaded media asset, ready to hand to an [`crate::object_store::ObjectStoreClient`].
pub struct MediaAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait MeetingPlatformClient: Send + Sync {
    async fn deploy_bot(&self, tenant_id: &str, request: DeployBotRequest) -> Result<DeployBotResponse, ClientError>;
    async fn cancel_bot(&self, tenant_id: &str, bot_id: &str) -> Result<(), ClientError>;
    async fn fetch_media(&self, tenant_id: &str, bot_id: &str) -> Result<MediaAsset, ClientError>;
    /// `Ok(None)` means the provider returned 404 — not yet available, not a
    /// failure (spec §4.4 transcript fetch worker).
    async fn fetch_transcript(&self, tenant_id: &str, bot_id: &str) -> Result<Option<String>, ClientError>;
}

pub struct HttpMeetingPlatformClient {
    client: ExternalHttpClient,
    base_url: String,
    api_key: String,
}

impl HttpMeetingPlatformClient {
    pub fn new(client: ExternalHttpClient, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl MeetingPlatformClient for HttpMeetingPlatformClient {
    async fn deploy_bot(&self, tenant_id: &str, request: DeployBotRequest) -> Result<DeployBotResponse, ClientError> {
        let url = format!("{}/bots", self.base_url);
        let api_key = self.api_key.clone();
        let response = self
            .client
            .execute(tenant_id, move |http| {
                http.post(&url).bearer_auth(&api_key).json(&request)
            })
            .await?;
        response.json().await.map_err(|e| ClientError::Parse { reason: e.to_string() })
    }

    async fn cancel_bot(&self, tenant_id: &str, bot_id: &str) -> Result<(), ClientError> {
        let url = format!("{}/bots/{}", self.base_url, bot_id);
        let api_key = self.api_key.clone();
        self.client
            .execute(tenant_id, move |http| http.delete(&url).bearer_auth(&api_key))
            .await?;
        Ok(())
    }

    async fn fetch_media(&self, tenant_id: &str, bot_id: &str) -> Result<MediaAsset, ClientError> {
        let url = format!("{}/bots/{}/recording", self.base_url, bot_id);
        let api_key = self.api_key.clone();
        let response = self
            .client
            .execute(tenant_id, move |http| http.get(&url).bearer_auth(&api_key))
            .await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| ClientError::Network { reason: e.to_string() })?;
        Ok(MediaAsset { bytes: bytes.to_vec(), content_type })
    }

    async fn fetch_transcript(&self, tenant_id: &str, bot_id: &str) -> Result<Option<String>, ClientError> {
        let url = format!("{}/bots/{}/transcript", self.base_url, bot_id);
        let api_key = self.api_key.clone();
        let _permit_scope = json!({ "bot_id": bot_id });
        match self.client.execute(tenant_id, move |http| http.get(&url).bearer_auth(&api_key)).await {
            Ok(response) => {
                let body: TranscriptBody =
                    response.json().await.map_err(|e| ClientError::Parse { reason: e.to_string() })?;
                Ok(Some(body.transcript))
            }
            Err(ClientError::BadRequest { status: 404, .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptBody {
    transcript: String,
}

/// Maps a `Content-Type` to the file extension the object-store path
/// convention `meeting-recordings/{org_id}/{user_id}/{recording_id}/recording.{ext}`
/// uses (spec §4.4).
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or("").trim() {
        "video/mp4" => "mp4",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "video/webm" => "webm",
        _ => "bin",
    }
}
