//! Per-org routing rule storage backing the sentry-bridge ingest handler
//! (spec §4.5). The evaluator itself is pure and lives in
//! `nimbus_orchestrator::rules`; this just holds the configured rule set per
//! tenant the same way `RecordingStore`/`BotDeploymentStore` hold domain
//! rows for the worker layer.

use std::collections::HashMap;
use std::sync::Arc;

use nimbus_types::RoutingRule;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct RoutingRulesStore {
    by_org: Arc<RwLock<HashMap<Uuid, Vec<RoutingRule>>>>,
}

impl RoutingRulesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_for_org(&self, org_id: Uuid, rules: Vec<RoutingRule>) {
        self.by_org.write().await.insert(org_id, rules);
    }

    pub async fn for_org(&self, org_id: Uuid) -> Vec<RoutingRule> {
        self.by_org.read().await.get(&org_id).cloned().unwrap_or_default()
    }
}
