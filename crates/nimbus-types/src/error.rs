use serde::Serialize;

/// Closed error taxonomy (spec §7). Every subsystem boundary maps its
/// failures into this sum type before crossing into another subsystem;
/// HTTP translation happens at the single seam in `nimbus-server`.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NimbusError {
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("upstream returned html")]
    GatewayHtml,

    #[error("internal error")]
    Internal { reason: String },
}

impl NimbusError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::RateLimited { .. } => 429,
            Self::UpstreamUnavailable { .. } => 502,
            Self::GatewayHtml => 502,
            Self::Internal { .. } => 500,
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::UpstreamUnavailable { .. } | Self::GatewayHtml
        )
    }

    /// Truncate a diagnostic message to the 200-char limit workers use when
    /// recording `last_error`, replacing HTML bodies with a generic
    /// message (spec §7).
    pub fn truncate_diagnostic(raw: &str) -> String {
        let looks_like_html = raw.trim_start().starts_with('<');
        if looks_like_html {
            return "Database temporarily unavailable".to_string();
        }
        if raw.len() <= 200 {
            raw.to_string()
        } else {
            let mut truncated: String = raw.chars().take(200).collect();
            truncated.push('\u{2026}');
            truncated
        }
    }
}
