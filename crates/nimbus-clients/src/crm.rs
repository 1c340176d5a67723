//! ATS/CRM REST client (spec §6): OAuth-authenticated entity CRUD + search.
//! Payload shapes vary per provider, so this speaks `serde_json::Value`
//! rather than a fixed schema — the caller (a sequence-runtime action)
//! owns interpretation.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;
use crate::http_client::ExternalHttpClient;
use crate::oauth::TokenPair;

#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn create_entity(&self, tenant_id: &str, token: &TokenPair, entity_type: &str, fields: Value) -> Result<Value, ClientError>;
    async fn search_entities(&self, tenant_id: &str, token: &TokenPair, entity_type: &str, query: &str) -> Result<Vec<Value>, ClientError>;
}

pub struct HttpCrmClient {
    client: ExternalHttpClient,
    base_url: String,
}

impl HttpCrmClient {
    pub fn new(client: ExternalHttpClient, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    async fn create_entity(&self, tenant_id: &str, token: &TokenPair, entity_type: &str, fields: Value) -> Result<Value, ClientError> {
        let url = format!("{}/{}", self.base_url, entity_type);
        let access_token = token.access_token.clone();
        let response = self
            .client
            .execute(tenant_id, move |http| http.post(&url).bearer_auth(&access_token).json(&fields))
            .await?;
        response.json().await.map_err(|e| ClientError::Parse { reason: e.to_string() })
    }

    async fn search_entities(&self, tenant_id: &str, token: &TokenPair, entity_type: &str, query: &str) -> Result<Vec<Value>, ClientError> {
        let url = format!("{}/{}/search", self.base_url, entity_type);
        let access_token = token.access_token.clone();
        let query = query.to_string();
        let response = self
            .client
            .execute(tenant_id, move |http| {
                http.get(&url).bearer_auth(&access_token).query(&[("q", query.clone())])
            })
            .await?;
        response.json().await.map_err(|e| ClientError::Parse { reason: e.to_string() })
    }
}
