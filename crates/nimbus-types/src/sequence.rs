use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SequenceExecutionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failed,
    FallbackSuccess,
    SkippedSimulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub order: u32,
    pub status: StepOutcome,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Set when `status == FallbackSuccess`: the `fallback_skill_key` that
    /// actually ran.
    pub fallback_used: Option<String>,
}

/// Invariant: `step_results` is append-only. Invariant: `failed_step_index`
/// is set if and only if `status == Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceExecution {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub sequence_key: String,
    pub status: SequenceExecutionStatus,
    pub input_context: serde_json::Value,
    pub step_results: Vec<StepResult>,
    pub failed_step_index: Option<u32>,
    pub is_simulation: bool,
}

impl SequenceExecution {
    pub fn new(org_id: Uuid, user_id: Uuid, sequence_key: impl Into<String>, input_context: serde_json::Value, is_simulation: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            user_id,
            sequence_key: sequence_key.into(),
            status: SequenceExecutionStatus::Running,
            input_context,
            step_results: Vec::new(),
            failed_step_index: None,
            is_simulation,
        }
    }
}
