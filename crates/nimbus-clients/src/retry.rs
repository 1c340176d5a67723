use std::time::Duration;

use reqwest::Response;

use crate::error::ClientError;

/// Exponential backoff with a `Retry-After` override (spec §4.2).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff for retry attempt `n` (0-indexed: the first retry, not the
    /// first call).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        delay.min(self.max_delay)
    }
}

/// Parses a `Retry-After` header: either delta-seconds or an HTTP-date.
/// Returns `None` (fall back to computed backoff) if neither parses or the
/// date is already in the past.
pub fn retry_after_ms(response: &Response) -> Option<u64> {
    let raw = response.headers().get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    if let Ok(seconds) = raw.trim().parse::<u64>() {
        return Some(seconds * 1000);
    }
    let when = chrono::DateTime::parse_from_rfc2822(raw.trim()).ok()?;
    let delta = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
    delta.num_milliseconds().try_into().ok()
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub fn classify_status(status: u16, body: String) -> ClientError {
    match status {
        401 | 403 => ClientError::AuthFailed { reason: body },
        429 => ClientError::RateLimited { retry_after_ms: None },
        500..=599 => ClientError::ServerError { status, body },
        _ => ClientError::BadRequest { status, body },
    }
}
