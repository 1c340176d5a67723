//! `/webhooks/meeting-recorder` payload shape (spec §6): bot status changes
//! and transcript-ready signals from the meeting-recording provider.
//! Discriminator is `type` in the newer delivery shape or `event` in the
//! legacy one — superset resolution: accept either, normalize to `event_kind`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    pub code: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMeetingRecorderEvent {
    #[serde(alias = "event")]
    pub r#type: Option<String>,
    pub bot_id: Option<String>,
    #[serde(alias = "botId")]
    pub bot_id_camel: Option<String>,
    pub calendar_id: Option<String>,
    pub status: Option<StatusPayload>,
    #[serde(default)]
    pub extra: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingRecorderEventKind {
    BotStatusChange { status_code: String, detail: Option<String> },
    TranscriptReady,
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct MeetingRecorderEvent {
    pub kind: MeetingRecorderEventKind,
    pub bot_id: Option<String>,
    pub calendar_id: Option<String>,
}

/// Normalizes the permissive wire shape into a strict internal event. The
/// discriminator lives in either `type` (newer) or `event` (legacy) — the
/// first present wins, matching the superset resolution.
pub fn normalize(raw: &RawMeetingRecorderEvent, raw_payload: &Value) -> MeetingRecorderEvent {
    let discriminator = raw.r#type.clone().unwrap_or_else(|| "unknown".to_string());

    let bot_id = raw.bot_id.clone().or_else(|| raw.bot_id_camel.clone());

    let kind = match discriminator.as_str() {
        "bot.status_change" | "bot.status_changed" => match &raw.status {
            Some(status) => MeetingRecorderEventKind::BotStatusChange {
                status_code: status.code.clone(),
                detail: status.detail.clone(),
            },
            None => {
                let status_code = raw_payload
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                MeetingRecorderEventKind::BotStatusChange { status_code, detail: None }
            }
        },
        "transcript.ready" | "transcript_ready" => MeetingRecorderEventKind::TranscriptReady,
        other => MeetingRecorderEventKind::Unknown(other.to_string()),
    };

    MeetingRecorderEvent { kind, bot_id, calendar_id: raw.calendar_id.clone() }
}

/// Maps a provider status code to the internal `BotDeploymentStatus`.
pub fn map_status_code(code: &str) -> Option<nimbus_types::BotDeploymentStatus> {
    use nimbus_types::BotDeploymentStatus::*;
    match code {
        "joining_call" | "joining" => Some(Joining),
        "in_call_recording" | "in_call" | "in_meeting" => Some(InMeeting),
        "call_ended" | "leaving" => Some(Leaving),
        "done" | "completed" => Some(Completed),
        "fatal_error" | "failed" => Some(Failed),
        _ => None,
    }
}
