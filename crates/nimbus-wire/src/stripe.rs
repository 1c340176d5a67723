//! `/webhooks/stripe` verification (spec §6): Stripe's own signature scheme,
//! distinct from the shared `v1=hex` HMAC in `nimbus-core::auth`. The header
//! is `t=<unix_ts>,v1=<hex>[,v1=<hex>...]` — multiple `v1` entries support
//! Stripe's signing-secret rotation; a match against any is accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const REPLAY_WINDOW_SECS: i64 = 300;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawStripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

fn parse_header(header: &str) -> (Option<i64>, Vec<String>) {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => timestamp = v.parse::<i64>().ok(),
            (Some("v1"), Some(v)) => signatures.push(v.to_string()),
            _ => {}
        }
    }
    (timestamp, signatures)
}

pub struct StripeVerification {
    pub ok: bool,
    pub reason: Option<String>,
}

/// Verifies `Stripe-Signature` over `"{timestamp}.{raw_body}"` against one
/// or more `v1` candidates (secret rotation), rejecting stale timestamps
/// the same way the shared HMAC scheme does.
pub fn verify_stripe_signature(
    secret: &str,
    raw_body: &str,
    signature_header: &str,
    now_unix: i64,
) -> StripeVerification {
    let (timestamp, signatures) = parse_header(signature_header);
    let Some(timestamp) = timestamp else {
        return StripeVerification { ok: false, reason: Some("missing timestamp in signature header".into()) };
    };
    if signatures.is_empty() {
        return StripeVerification { ok: false, reason: Some("missing v1 signature".into()) };
    }
    if (now_unix - timestamp).abs() > REPLAY_WINDOW_SECS {
        return StripeVerification { ok: false, reason: Some("stale timestamp".into()) };
    }

    let signed_payload = format!("{timestamp}.{raw_body}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    let matched = signatures.iter().any(|candidate| {
        candidate.len() == expected.len()
            && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
    });

    if matched {
        StripeVerification { ok: true, reason: None }
    } else {
        StripeVerification { ok: false, reason: Some("signature mismatch".into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{body}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature_with_secret_rotation_candidates() {
        let now = 1_700_000_000;
        let body = r#"{"id":"evt_1"}"#;
        let current = sign("new-secret", now, body);
        let stale_secret_sig = sign("old-secret", now, body);
        let header = format!("t={now},v1={stale_secret_sig},v1={current}");
        let result = verify_stripe_signature("new-secret", body, &header, now);
        assert!(result.ok);
    }

    #[test]
    fn rejects_stale_timestamp() {
        let now = 1_700_000_000;
        let body = "{}";
        let sig = sign("secret", now - 600, body);
        let header = format!("t={},v1={sig}", now - 600);
        let result = verify_stripe_signature("secret", body, &header, now);
        assert!(!result.ok);
        assert_eq!(result.reason.as_deref(), Some("stale timestamp"));
    }
}
