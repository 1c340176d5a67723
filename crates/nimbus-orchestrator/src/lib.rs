pub mod notifications;
pub mod recording_lifecycle;
pub mod rules;
pub mod sequence_runtime;

pub use notifications::{
    check_frequency, effective_cooldown, fatigue_multiplier, feedback_request_due, max_per_day,
    max_per_hour, next_allowed_at, FrequencyCheckInput, FrequencyDecision,
};
pub use recording_lifecycle::{reduce as reduce_lifecycle, LifecycleCommand, LifecycleEvent};
pub use rules::{evaluate_recording_rules, evaluate_routing_rules, MatchOutcome, RoutingMatchInput};
pub use sequence_runtime::{run_sequence, ActionOutcome, OnFailure, StepDefinition, StepExecutor};
