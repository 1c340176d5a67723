use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BotDeploymentStatus {
    Scheduled,
    Joining,
    InMeeting,
    Leaving,
    Completed,
    Failed,
    Cancelled,
}

impl BotDeploymentStatus {
    /// Terminal states are sink states: no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Allowed successor set for the forward-only state machine, plus the
    /// universal `cancelled` escape from any non-terminal state.
    pub fn allowed_successors(self) -> &'static [BotDeploymentStatus] {
        use BotDeploymentStatus::*;
        match self {
            Scheduled => &[Joining, Cancelled],
            Joining => &[InMeeting, Failed, Cancelled],
            InMeeting => &[Leaving, Failed, Cancelled],
            Leaving => &[Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: BotDeploymentStatus) -> bool {
        self.allowed_successors().contains(&next)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: BotDeploymentStatus,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

/// One instance of a recording bot joining one meeting.
///
/// Invariant: `status_history` is append-only. Invariant: terminal states
/// have no outgoing transitions — enforced by `BotDeploymentStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotDeployment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub recording_id: Uuid,
    pub bot_id: String,
    pub status: BotDeploymentStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub scheduled_join_time: DateTime<Utc>,
    pub actual_join_time: Option<DateTime<Utc>>,
    pub leave_time: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BotDeployment {
    /// Append a transition to history if and only if it is legal. Returns
    /// `false` (no mutation) when the transition is disallowed, so callers
    /// can map that to a `conflict`/`bad_request` error at the boundary.
    pub fn push_transition(&mut self, next: BotDeploymentStatus, detail: Option<String>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.status_history.push(StatusHistoryEntry {
            status: next,
            timestamp: Utc::now(),
            detail,
        });
        true
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Pending,
    BotJoining,
    Recording,
    Processing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaUploadStatus {
    NotStarted,
    Pending,
    InProgress,
    Complete,
    Failed,
}

/// Invariant: once `media_upload_status == Complete`, `media_storage_url`
/// and `media_storage_path` are set and never cleared afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub meeting_platform: String,
    pub meeting_url: String,
    pub calendar_event_id: Option<String>,
    pub status: RecordingStatus,
    pub media_storage_url: Option<String>,
    pub media_storage_path: Option<String>,
    pub media_upload_status: MediaUploadStatus,
    pub media_upload_retry_count: u32,
    pub media_upload_last_retry_at: Option<DateTime<Utc>>,
    pub transcript: Option<String>,
    pub transcript_fetch_attempts: u32,
    pub last_transcript_fetch_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Recording {
    /// Mark the media upload complete; panics in debug builds if called
    /// without a URL/path, since that would violate the invariant above.
    pub fn complete_media_upload(&mut self, storage_url: String, storage_path: String) {
        debug_assert!(!storage_url.is_empty() && !storage_path.is_empty());
        self.media_storage_url = Some(storage_url);
        self.media_storage_path = Some(storage_path);
        self.media_upload_status = MediaUploadStatus::Complete;
    }
}
