//! Object-store client (spec §6): presigned upload plus head-object for a
//! signed download URL. Backs the media upload worker's
//! `meeting-recordings/{org_id}/{user_id}/{recording_id}/recording.{ext}`
//! convention (spec §4.4).

use async_trait::async_trait;
use chrono::Duration;

use crate::error::ClientError;
use crate::http_client::ExternalHttpClient;

#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ClientError>;
    async fn presigned_url(&self, path: &str, expiry: Duration) -> Result<String, ClientError>;
}

pub struct HttpObjectStoreClient {
    client: ExternalHttpClient,
    bucket: String,
    region: String,
}

impl HttpObjectStoreClient {
    pub fn new(client: ExternalHttpClient, bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into(), region: region.into() }
    }

    fn object_url(&self, path: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket, self.region, path)
    }
}

#[async_trait]
impl ObjectStoreClient for HttpObjectStoreClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ClientError> {
        let url = self.object_url(path);
        let content_type = content_type.to_string();
        self.client
            .execute(&self.bucket, move |http| {
                http.put(&url).header(reqwest::header::CONTENT_TYPE, content_type.clone()).body(bytes.clone())
            })
            .await?;
        Ok(())
    }

    async fn presigned_url(&self, path: &str, expiry: Duration) -> Result<String, ClientError> {
        let expires_in = expiry.num_seconds().max(0);
        Ok(format!("{}?X-Amz-Expires={}", self.object_url(path), expires_in))
    }
}

/// The object-store path convention recordings upload under (spec §4.4).
pub fn recording_object_path(org_id: &str, user_id: &str, recording_id: &str, extension: &str) -> String {
    format!("meeting-recordings/{org_id}/{user_id}/{recording_id}/recording.{extension}")
}
