use hmac::{Hmac, Mac};
use nimbus_types::NimbusError;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Window outside which a webhook timestamp is considered stale, in either
/// direction (spec §4.1).
pub const REPLAY_WINDOW_SECS: i64 = 300;

pub fn hmac_sign(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time compare against equal-length hex digests. Unequal lengths
/// return `false` without touching the comparison loop, so the branch never
/// leaks which input was shorter.
pub fn verify_hmac(secret: &str, payload: &str, provided_hex: &str) -> bool {
    let expected = hmac_sign(secret, payload);
    if expected.len() != provided_hex.len() {
        return false;
    }
    expected.as_bytes().ct_eq(provided_hex.as_bytes()).into()
}

pub struct WebhookVerification {
    pub ok: bool,
    pub reason: Option<String>,
}

impl WebhookVerification {
    fn ok() -> Self {
        Self { ok: true, reason: None }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self { ok: false, reason: Some(reason.into()) }
    }
}

/// Verifies a `v1={hex}` webhook signature over `"{timestamp}:{raw_body}"`
/// and rejects timestamps more than [`REPLAY_WINDOW_SECS`] away from now.
pub fn verify_webhook(
    secret: &str,
    raw_body: &str,
    signature_header: &str,
    timestamp_header: &str,
    now_unix: i64,
) -> WebhookVerification {
    let Some(hex_sig) = signature_header.strip_prefix("v1=") else {
        return WebhookVerification::fail("malformed signature header");
    };
    let Ok(timestamp) = timestamp_header.parse::<i64>() else {
        return WebhookVerification::fail("malformed timestamp header");
    };
    if (now_unix - timestamp).abs() > REPLAY_WINDOW_SECS {
        return WebhookVerification::fail("stale timestamp");
    }
    let payload = format!("{timestamp}:{raw_body}");
    if !verify_hmac(secret, &payload, hex_sig) {
        return WebhookVerification::fail("signature mismatch");
    }
    WebhookVerification::ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    ServiceRole,
    User { user_id: String },
    Cron,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub mode: AuthMode,
    pub is_platform_admin: bool,
}

/// Resolves the caller's identity from a bearer token.
///
/// Service-role keys are matched by exact equality, never substring. Cron
/// callers require `cron_secret` to be configured; an unset secret rejects
/// every cron request (fail-closed), per spec §4.1/§9.
pub fn authenticate(
    bearer_token: Option<&str>,
    service_role_key: &str,
    cron_secret: Option<&str>,
    is_cron_request: bool,
    resolve_user: impl FnOnce(&str) -> Option<(String, bool)>,
) -> Result<AuthContext, NimbusError> {
    let token = bearer_token.ok_or_else(|| NimbusError::Unauthorized {
        reason: "missing bearer token".into(),
    })?;

    if is_cron_request {
        return match cron_secret {
            Some(secret) if !secret.is_empty() && token == secret => Ok(AuthContext {
                mode: AuthMode::Cron,
                is_platform_admin: false,
            }),
            _ => Err(NimbusError::Unauthorized {
                reason: "cron secret unset or mismatched".into(),
            }),
        };
    }

    if token == service_role_key {
        return Ok(AuthContext {
            mode: AuthMode::ServiceRole,
            is_platform_admin: true,
        });
    }

    match resolve_user(token) {
        Some((user_id, is_platform_admin)) => Ok(AuthContext {
            mode: AuthMode::User { user_id },
            is_platform_admin,
        }),
        None => Err(NimbusError::Unauthorized {
            reason: "unrecognized token".into(),
        }),
    }
}

pub fn require_org_role(ctx: &AuthContext, required_admin: bool) -> Result<(), NimbusError> {
    match &ctx.mode {
        AuthMode::ServiceRole | AuthMode::Cron => Ok(()),
        AuthMode::User { .. } if required_admin && !ctx.is_platform_admin => {
            Err(NimbusError::Forbidden {
                reason: "platform admin role required".into(),
            })
        }
        AuthMode::User { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_hmac_accepts_matching_signature() {
        let sig = hmac_sign("secret", "payload");
        assert!(verify_hmac("secret", "payload", &sig));
    }

    #[test]
    fn verify_hmac_rejects_wrong_length() {
        assert!(!verify_hmac("secret", "payload", "abc"));
    }

    #[test]
    fn verify_webhook_rejects_stale_timestamp() {
        let now = 1_700_000_000;
        let ts = now - 600;
        let payload = format!("{ts}:{{}}");
        let sig = hmac_sign("secret", &payload);
        let result = verify_webhook(
            "secret",
            "{}",
            &format!("v1={sig}"),
            &ts.to_string(),
            now,
        );
        assert!(!result.ok);
        assert_eq!(result.reason.as_deref(), Some("stale timestamp"));
    }

    #[test]
    fn verify_webhook_accepts_fresh_valid_signature() {
        let now = 1_700_000_000;
        let body = r#"{"hello":"world"}"#;
        let payload = format!("{now}:{body}");
        let sig = hmac_sign("secret", &payload);
        let result = verify_webhook("secret", body, &format!("v1={sig}"), &now.to_string(), now);
        assert!(result.ok);
    }

    #[test]
    fn authenticate_rejects_cron_when_secret_unset() {
        let result = authenticate(Some("anything"), "svc-key", None, true, |_| None);
        assert!(result.is_err());
    }

    #[test]
    fn authenticate_matches_service_role_exactly() {
        let result = authenticate(Some("svc-key"), "svc-key", None, false, |_| None);
        assert!(matches!(result.unwrap().mode, AuthMode::ServiceRole));
    }
}
