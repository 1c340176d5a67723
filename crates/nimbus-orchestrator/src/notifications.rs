//! Notification frequency/fatigue/cooldown logic (spec §4.6 a/b/c). Pure
//! domain rules — no I/O, no channel dispatch — so the worker in
//! `nimbus-runtime` can unit-test the gating decisions without a fake clock
//! threaded through a database.

use chrono::{DateTime, Duration, Utc};
use nimbus_types::{NotificationFrequency, NotificationPriority};

/// Per-`(preferred_frequency, urgent-exempt)` volume caps (spec §4.6a table).
pub fn max_per_hour(frequency: NotificationFrequency) -> u32 {
    match frequency {
        NotificationFrequency::High => 4,
        NotificationFrequency::Moderate => 2,
        NotificationFrequency::Low => 1,
    }
}

pub fn max_per_day(frequency: NotificationFrequency) -> u32 {
    match frequency {
        NotificationFrequency::High => 15,
        NotificationFrequency::Moderate => 8,
        NotificationFrequency::Low => 3,
    }
}

/// Base cooldown between sends to the same user on any channel, before the
/// fatigue multiplier is applied.
pub fn base_cooldown(priority: NotificationPriority) -> Duration {
    match priority {
        NotificationPriority::Urgent => Duration::minutes(5),
        NotificationPriority::High => Duration::minutes(15),
        NotificationPriority::Normal => Duration::minutes(30),
        NotificationPriority::Low => Duration::minutes(60),
    }
}

/// Cooldown multiplier by fatigue threshold (spec §4.6b): `<20/<40/<60/<80/≥80`
/// maps to `1.0/1.5/2.0/3.0`... with five bands and four multipliers, the top
/// two bands (`<80` and `≥80`) share the `3.0` ceiling.
pub fn fatigue_multiplier(fatigue_level: u8) -> f64 {
    match fatigue_level {
        0..=19 => 1.0,
        20..=39 => 1.5,
        40..=59 => 2.0,
        _ => 3.0,
    }
}

/// Effective cooldown after the fatigue multiplier, rounded to whole seconds.
pub fn effective_cooldown(priority: NotificationPriority, fatigue_level: u8) -> Duration {
    let base = base_cooldown(priority).num_seconds() as f64;
    Duration::seconds((base * fatigue_multiplier(fatigue_level)).round() as i64)
}

#[derive(Debug, Clone)]
pub struct FrequencyCheckInput {
    pub priority: NotificationPriority,
    pub preferred_frequency: NotificationFrequency,
    pub fatigue_level: u8,
    pub sent_in_last_hour: u32,
    pub sent_in_last_day: u32,
    pub last_send_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyDecision {
    Allowed,
    Blocked,
}

/// Runs the three nested frequency gates in order: cooldown since last send
/// (applies to every priority), then the hourly and daily volume caps
/// (both bypassed by `urgent`). Any one blocking is enough.
pub fn check_frequency(input: &FrequencyCheckInput) -> FrequencyDecision {
    if let Some(last_send) = input.last_send_at {
        let cooldown = effective_cooldown(input.priority, input.fatigue_level);
        if input.now - last_send < cooldown {
            return FrequencyDecision::Blocked;
        }
    }

    if input.priority == NotificationPriority::Urgent {
        return FrequencyDecision::Allowed;
    }

    if input.sent_in_last_hour >= max_per_hour(input.preferred_frequency) {
        return FrequencyDecision::Blocked;
    }

    if input.sent_in_last_day >= max_per_day(input.preferred_frequency) {
        return FrequencyDecision::Blocked;
    }

    FrequencyDecision::Allowed
}

/// `next_allowed_at` for an item the frequency check delayed — the moment
/// the binding gate (cooldown, in practice the only per-instant gate) next
/// elapses.
pub fn next_allowed_at(
    priority: NotificationPriority,
    fatigue_level: u8,
    last_send_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match last_send_at {
        Some(last_send) => last_send + effective_cooldown(priority, fatigue_level),
        None => now,
    }
}

/// Whether a feedback request is due: at least 14 days since the last one
/// (or never requested) and at least 10 notifications sent since (spec
/// §4.6 Feedback loop).
pub fn feedback_request_due(
    last_feedback_requested_at: Option<DateTime<Utc>>,
    notifications_since_last_feedback: u32,
    now: DateTime<Utc>,
) -> bool {
    if notifications_since_last_feedback < 10 {
        return false;
    }
    match last_feedback_requested_at {
        None => true,
        Some(last) => now - last >= Duration::days(14),
    }
}
