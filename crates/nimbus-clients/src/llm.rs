//! LLM completion client (spec §6): system + user prompt + generation
//! config in, JSON response expected out. The response body is handed to
//! `nimbus-wire::extract_json` by the caller — this client only owns the
//! HTTP round trip, not response interpretation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::http_client::ExternalHttpClient;

#[derive(Debug, Clone, Serialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    system_prompt: &'a str,
    user_prompt: &'a str,
    #[serde(flatten)]
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        tenant_id: &str,
        system_prompt: &str,
        user_prompt: &str,
        generation_config: GenerationConfig,
    ) -> Result<String, ClientError>;
}

pub struct HttpLlmClient {
    client: ExternalHttpClient,
    base_url: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(client: ExternalHttpClient, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        tenant_id: &str,
        system_prompt: &str,
        user_prompt: &str,
        generation_config: GenerationConfig,
    ) -> Result<String, ClientError> {
        let url = format!("{}/v1/completions", self.base_url);
        let api_key = self.api_key.clone();
        let body = CompletionRequest { system_prompt, user_prompt, generation_config };
        let response = self
            .client
            .execute(tenant_id, move |http| http.post(&url).bearer_auth(&api_key).json(&body))
            .await?;
        let parsed: CompletionResponse =
            response.json().await.map_err(|e| ClientError::Parse { reason: e.to_string() })?;
        Ok(parsed.text)
    }
}
