use serde::Serialize;

/// Closed error taxonomy for external HTTP clients (spec §4.2). Distinct
/// from `NimbusError`: this is the vocabulary a client speaks internally
/// before the caller folds it into the engine-wide taxonomy.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientError {
    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("server error ({status})")]
    ServerError { status: u16, body: String },

    #[error("bad request ({status})")]
    BadRequest { status: u16, body: String },

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("could not parse response: {reason}")]
    Parse { reason: String },
}

impl ClientError {
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::ServerError { .. } | Self::Network { .. })
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}
