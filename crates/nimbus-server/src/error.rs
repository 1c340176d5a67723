//! The single HTTP translation seam (spec §7): every handler returns
//! `Result<T, ApiError>`, and this is the only place `NimbusError` crosses
//! into an axum [`Response`]. `ApiError` is a thin local newtype purely to
//! satisfy the orphan rule — neither `NimbusError` nor `IntoResponse` lives
//! in this crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nimbus_types::NimbusError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

pub struct ApiError(pub NimbusError);

impl From<NimbusError> for ApiError {
    fn from(err: NimbusError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &err {
            NimbusError::Unauthorized { .. } => "unauthorized",
            NimbusError::Forbidden { .. } => "forbidden",
            NimbusError::BadRequest { .. } => "bad_request",
            NimbusError::NotFound { .. } => "not_found",
            NimbusError::Conflict { .. } => "conflict",
            NimbusError::RateLimited { .. } => "rate_limited",
            NimbusError::UpstreamUnavailable { .. } => "upstream_unavailable",
            NimbusError::GatewayHtml => "gateway_html",
            NimbusError::Internal { .. } => "internal",
        };
        let retry_after_ms = match &err {
            NimbusError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        };
        let envelope = ErrorEnvelope { error: err.to_string(), code, retry_after_ms };
        (status, Json(envelope)).into_response()
    }
}
