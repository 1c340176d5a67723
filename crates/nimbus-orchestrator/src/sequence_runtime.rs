//! Skill/Sequence runtime (spec §4.7): executes an ordered list of steps
//! against a mutable state tree, resolving `${path.to.field}` input
//! mappings and applying the `on_failure` policy per step.

use std::collections::HashMap;

use async_trait::async_trait;
use nimbus_types::{SequenceExecution, SequenceExecutionStatus, StepOutcome, StepResult};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Stop,
    Continue,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub order: u32,
    /// Exactly one of `skill_key`/`action` is set: a skill is pure
    /// computation, an action is side-effecting.
    pub skill_key: Option<String>,
    pub action: Option<String>,
    pub input_mapping: HashMap<String, String>,
    pub output_key: Option<String>,
    pub on_failure: OnFailure,
    pub fallback_skill_key: Option<String>,
    pub requires_approval: bool,
}

pub enum ActionOutcome {
    Success(Value),
    NeedsConfirmation(Value),
}

#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn run_skill(&self, skill_key: &str, input: Value) -> Result<Value, String>;
    async fn run_action(
        &self,
        action: &str,
        input: Value,
        requires_approval: bool,
    ) -> Result<ActionOutcome, String>;
}

/// `[0]` indexing is normalized to `.0` before path resolution.
fn normalize_path(path: &str) -> String {
    path.replace('[', ".").replace(']', "")
}

fn resolve_path(state: &Value, path: &str) -> Option<Value> {
    let normalized = normalize_path(path);
    let mut cursor = state;
    for segment in normalized.split('.').filter(|s| !s.is_empty()) {
        cursor = match cursor {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor.clone())
}

/// A mapping value of the literal form `${path}` is resolved against
/// `state`; anything else passes through as a literal string.
fn resolve_template(template: &str, state: &Value) -> Value {
    if let Some(inner) = template.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        resolve_path(state, inner).unwrap_or(Value::Null)
    } else {
        Value::String(template.to_string())
    }
}

fn resolve_input_mapping(mapping: &HashMap<String, String>, state: &Value) -> Value {
    let mut object = serde_json::Map::new();
    for (key, template) in mapping {
        object.insert(key.clone(), resolve_template(template, state));
    }
    Value::Object(object)
}

fn strip_confirm(input: &mut Value) {
    if let Value::Object(map) = input {
        map.remove("confirm");
    }
}

fn apply_step_result(state: &mut Value, step: &StepDefinition, result: &StepResult) {
    if let Some(output_key) = &step.output_key {
        if let Value::Object(outputs) = state.get_mut("outputs").expect("outputs present") {
            outputs.insert(
                output_key.clone(),
                result.data.clone().unwrap_or(Value::Null),
            );
        }
    }
    state["last_result"] = serde_json::to_value(result).unwrap_or(Value::Null);
}

fn initial_state(execution: &SequenceExecution) -> Value {
    json!({
        "trigger": execution.input_context,
        "outputs": {},
        "context": execution.input_context,
        "last_result": null,
        "execution": { "id": execution.id, "sequence_key": execution.sequence_key },
    })
}

/// Runs every step in order, mutating `execution.step_results` as it goes
/// so a crash mid-sequence loses no completed work.
pub async fn run_sequence(
    executor: &dyn StepExecutor,
    execution: &mut SequenceExecution,
    steps: &[StepDefinition],
) {
    let mut state = initial_state(execution);

    for step in steps {
        let mut input = resolve_input_mapping(&step.input_mapping, &state);
        if execution.is_simulation {
            strip_confirm(&mut input);
        }

        let mut result = run_step(executor, step, input, execution.is_simulation).await;

        if result.status == StepOutcome::Failed {
            match step.on_failure {
                OnFailure::Stop => {
                    execution.failed_step_index = Some(step.order);
                    execution.step_results.push(result);
                    execution.status = SequenceExecutionStatus::Failed;
                    return;
                }
                OnFailure::Continue => {}
                OnFailure::Fallback => {
                    if let Some(fallback_key) = &step.fallback_skill_key {
                        let fallback_input = resolve_input_mapping(&step.input_mapping, &state);
                        result = match executor.run_skill(fallback_key, fallback_input).await {
                            Ok(data) => StepResult {
                                order: step.order,
                                status: StepOutcome::FallbackSuccess,
                                data: Some(data),
                                error: None,
                                fallback_used: Some(fallback_key.clone()),
                            },
                            Err(error) => StepResult {
                                order: step.order,
                                status: StepOutcome::Failed,
                                data: None,
                                error: Some(error),
                                fallback_used: None,
                            },
                        };
                    }
                    if result.status == StepOutcome::Failed {
                        execution.failed_step_index = Some(step.order);
                        execution.step_results.push(result);
                        execution.status = SequenceExecutionStatus::Failed;
                        return;
                    }
                }
            }
        }

        apply_step_result(&mut state, step, &result);
        execution.step_results.push(result);
    }

    execution.status = SequenceExecutionStatus::Completed;
}

async fn run_step(
    executor: &dyn StepExecutor,
    step: &StepDefinition,
    input: Value,
    is_simulation: bool,
) -> StepResult {
    let outcome = match &step.action {
        Some(action) => executor.run_action(action, input, step.requires_approval).await,
        None => {
            let skill_key = step.skill_key.as_deref().unwrap_or_default();
            executor.run_skill(skill_key, input).await.map(ActionOutcome::Success)
        }
    };

    match outcome {
        Ok(ActionOutcome::Success(data)) => StepResult {
            order: step.order,
            status: StepOutcome::Success,
            data: Some(data),
            error: None,
            fallback_used: None,
        },
        Ok(ActionOutcome::NeedsConfirmation(preview)) if is_simulation => StepResult {
            order: step.order,
            status: StepOutcome::Success,
            data: Some(preview),
            error: None,
            fallback_used: None,
        },
        Ok(ActionOutcome::NeedsConfirmation(_)) => StepResult {
            order: step.order,
            status: StepOutcome::Failed,
            data: None,
            error: Some("action requires confirmation".into()),
            fallback_used: None,
        },
        Err(error) => StepResult {
            order: step.order,
            status: StepOutcome::Failed,
            data: None,
            error: Some(error),
            fallback_used: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    struct EchoExecutor;

    #[async_trait]
    impl StepExecutor for EchoExecutor {
        async fn run_skill(&self, skill_key: &str, input: Value) -> Result<Value, String> {
            if skill_key == "always_fails" {
                return Err("boom".into());
            }
            Ok(json!({ "skill": skill_key, "input": input }))
        }

        async fn run_action(
            &self,
            action: &str,
            input: Value,
            _requires_approval: bool,
        ) -> Result<ActionOutcome, String> {
            if action == "needs_confirmation" {
                return Ok(ActionOutcome::NeedsConfirmation(json!({ "preview": input })));
            }
            Ok(ActionOutcome::Success(json!({ "action": action })))
        }
    }

    fn execution(context: Value, is_simulation: bool) -> SequenceExecution {
        SequenceExecution::new(Uuid::new_v4(), Uuid::new_v4(), "follow_up", context, is_simulation)
    }

    #[tokio::test]
    async fn resolves_path_from_trigger_into_skill_input() {
        let mut mapping = HashMap::new();
        mapping.insert("name".to_string(), "${trigger.lead_name}".to_string());
        let step = StepDefinition {
            order: 1,
            skill_key: Some("draft_email".into()),
            action: None,
            input_mapping: mapping,
            output_key: Some("draft".into()),
            on_failure: OnFailure::Stop,
            fallback_skill_key: None,
            requires_approval: false,
        };
        let mut exec = execution(json!({ "lead_name": "Ada" }), false);
        run_sequence(&EchoExecutor, &mut exec, &[step]).await;

        assert_eq!(exec.status, SequenceExecutionStatus::Completed);
        let result = &exec.step_results[0];
        assert_eq!(result.data.as_ref().unwrap()["input"]["name"], "Ada");
    }

    #[tokio::test]
    async fn array_index_bracket_syntax_resolves() {
        let mut mapping = HashMap::new();
        mapping.insert("first".to_string(), "${trigger.items[0]}".to_string());
        let step = StepDefinition {
            order: 1,
            skill_key: Some("noop".into()),
            action: None,
            input_mapping: mapping,
            output_key: None,
            on_failure: OnFailure::Stop,
            fallback_skill_key: None,
            requires_approval: false,
        };
        let mut exec = execution(json!({ "items": ["first-item", "second-item"] }), false);
        run_sequence(&EchoExecutor, &mut exec, &[step]).await;
        let result = &exec.step_results[0];
        assert_eq!(result.data.as_ref().unwrap()["input"]["first"], "first-item");
    }

    #[tokio::test]
    async fn stop_on_failure_records_failed_step_index_and_halts() {
        let failing = StepDefinition {
            order: 1,
            skill_key: Some("always_fails".into()),
            action: None,
            input_mapping: HashMap::new(),
            output_key: None,
            on_failure: OnFailure::Stop,
            fallback_skill_key: None,
            requires_approval: false,
        };
        let never_runs = StepDefinition {
            order: 2,
            skill_key: Some("noop".into()),
            action: None,
            input_mapping: HashMap::new(),
            output_key: None,
            on_failure: OnFailure::Stop,
            fallback_skill_key: None,
            requires_approval: false,
        };
        let mut exec = execution(json!({}), false);
        run_sequence(&EchoExecutor, &mut exec, &[failing, never_runs]).await;

        assert_eq!(exec.status, SequenceExecutionStatus::Failed);
        assert_eq!(exec.failed_step_index, Some(1));
        assert_eq!(exec.step_results.len(), 1);
    }

    #[tokio::test]
    async fn fallback_on_failure_records_fallback_success() {
        let step = StepDefinition {
            order: 1,
            skill_key: Some("always_fails".into()),
            action: None,
            input_mapping: HashMap::new(),
            output_key: Some("result".into()),
            on_failure: OnFailure::Fallback,
            fallback_skill_key: Some("noop".into()),
            requires_approval: false,
        };
        let mut exec = execution(json!({}), false);
        run_sequence(&EchoExecutor, &mut exec, &[step]).await;

        assert_eq!(exec.status, SequenceExecutionStatus::Completed);
        assert_eq!(exec.step_results[0].status, StepOutcome::FallbackSuccess);
        assert_eq!(exec.step_results[0].fallback_used.as_deref(), Some("noop"));
    }

    #[tokio::test]
    async fn simulation_mode_normalizes_confirmation_to_success_and_strips_confirm_input() {
        let mut mapping = HashMap::new();
        mapping.insert("confirm".to_string(), "${trigger.confirm}".to_string());
        let step = StepDefinition {
            order: 1,
            skill_key: None,
            action: Some("needs_confirmation".into()),
            input_mapping: mapping,
            output_key: Some("result".into()),
            on_failure: OnFailure::Stop,
            fallback_skill_key: None,
            requires_approval: true,
        };
        let mut exec = execution(json!({ "confirm": true }), true);
        run_sequence(&EchoExecutor, &mut exec, &[step]).await;

        assert_eq!(exec.status, SequenceExecutionStatus::Completed);
        assert_eq!(exec.step_results[0].status, StepOutcome::Success);
        let preview = exec.step_results[0].data.as_ref().unwrap();
        assert!(preview["preview"].get("confirm").is_none());
    }

    #[tokio::test]
    async fn confirmation_outside_simulation_is_a_failure() {
        let step = StepDefinition {
            order: 1,
            skill_key: None,
            action: Some("needs_confirmation".into()),
            input_mapping: HashMap::new(),
            output_key: None,
            on_failure: OnFailure::Stop,
            fallback_skill_key: None,
            requires_approval: true,
        };
        let mut exec = execution(json!({}), false);
        run_sequence(&EchoExecutor, &mut exec, &[step]).await;
        assert_eq!(exec.status, SequenceExecutionStatus::Failed);
    }
}
