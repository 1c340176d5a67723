use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DomainMode {
    ExternalOnly,
    InternalOnly,
    SpecificDomains,
    All,
}

/// Declarative predicate set for "should this meeting be recorded?".
/// Rules sharing a scope are evaluated in descending `priority`; first
/// match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingRule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub priority: i32,
    pub enabled: bool,
    pub title_exclude_keywords: Vec<String>,
    pub title_include_keywords: Vec<String>,
    pub min_attendees: Option<u32>,
    pub max_attendees: Option<u32>,
    pub domain_mode: DomainMode,
    pub specific_domains: Vec<String>,
    pub target_project_id: Option<String>,
    pub target_priority: Option<String>,
    pub target_owner: Option<String>,
    pub test_mode: bool,
}

/// Declarative predicate set for "which ticket project gets this Sentry
/// issue?" — same evaluator shape as `RecordingRule`, generalized so a
/// single engine serves both domains (see `nimbus-orchestrator::rules`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub priority: i32,
    pub enabled: bool,
    pub match_environment: Option<String>,
    pub match_level: Option<String>,
    pub match_release_pattern: Option<String>,
    pub match_title_contains: Option<String>,
    pub target_project_id: String,
    pub target_priority: String,
    pub test_mode: bool,
}
