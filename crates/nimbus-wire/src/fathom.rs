//! `/webhooks/meetings` payload shape (spec §6): Fathom-like transcript,
//! summary, and action-item events. Discriminator is `topic`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RawFathomEvent {
    pub topic: String,
    pub recording_id: Option<String>,
    pub meeting_id: Option<String>,
    pub transcript_text: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FathomTopic {
    TranscriptReady,
    SummaryReady,
    ActionItemsReady,
    Unknown(String),
}

pub fn topic_of(raw: &RawFathomEvent) -> FathomTopic {
    match raw.topic.as_str() {
        "transcript.ready" => FathomTopic::TranscriptReady,
        "summary.ready" => FathomTopic::SummaryReady,
        "action_items.ready" => FathomTopic::ActionItemsReady,
        other => FathomTopic::Unknown(other.to_string()),
    }
}
