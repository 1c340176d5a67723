use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::concurrency::TenantConcurrencyLimiter;
use crate::error::ClientError;
use crate::retry::{classify_status, is_retryable_status, retry_after_ms, RetryPolicy};

/// Shared contract every third-party HTTP client is built on (spec §4.2):
/// per-tenant concurrency cap, retry with exponential backoff honoring
/// `Retry-After`, non-retryable 4xx propagate immediately.
#[derive(Clone)]
pub struct ExternalHttpClient {
    pub http: Client,
    policy: RetryPolicy,
    limiter: Arc<TenantConcurrencyLimiter>,
}

impl ExternalHttpClient {
    pub fn new(http: Client, policy: RetryPolicy, permits_per_tenant: usize) -> Self {
        Self { http, policy, limiter: Arc::new(TenantConcurrencyLimiter::new(permits_per_tenant)) }
    }

    /// Runs `build_request` (rebuilt fresh on every attempt, since
    /// `RequestBuilder` is not replayable) under the tenant's concurrency
    /// slot, retrying retryable failures per the policy.
    pub async fn execute(
        &self,
        tenant_id: &str,
        build_request: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<Response, ClientError> {
        let _permit = self.limiter.acquire(tenant_id).await;
        let mut attempt = 0;

        loop {
            match build_request(&self.http).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status < 300 {
                        return Ok(response);
                    }
                    if !is_retryable_status(status) || attempt >= self.policy.max_retries {
                        let body = response.text().await.unwrap_or_default();
                        return Err(classify_status(status, body));
                    }
                    let wait = retry_after_ms(&response)
                        .map(Duration::from_millis)
                        .unwrap_or_else(|| self.policy.delay_for(attempt));
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(source) => {
                    if attempt >= self.policy.max_retries {
                        return Err(ClientError::Network { reason: source.to_string() });
                    }
                    tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
