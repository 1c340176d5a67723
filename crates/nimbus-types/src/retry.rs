use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owned by whichever subsystem enqueued it; cleared when the target
/// entity succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryJob {
    pub id: Uuid,
    pub target_entity_ref: String,
    pub next_attempt_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl RetryJob {
    pub fn next_backoff_ms(&self) -> u64 {
        let exp = self.backoff_base_ms.saturating_mul(1u64 << self.attempts.min(32));
        exp.min(self.backoff_cap_ms)
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
