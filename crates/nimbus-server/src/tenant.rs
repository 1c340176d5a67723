//! Tenant resolution for inbound webhooks (spec §4.3): a URL path token
//! resolves fastest, falling back to reverse lookups by the provider's own
//! identifiers when a source is account-scoped rather than addressed
//! per-tenant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct TenantRegistry {
    by_bot_id: Arc<RwLock<HashMap<String, Uuid>>>,
    by_calendar_id: Arc<RwLock<HashMap<String, Uuid>>>,
    by_external_ref: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_bot(&self, bot_id: impl Into<String>, org_id: Uuid) {
        self.by_bot_id.write().await.insert(bot_id.into(), org_id);
    }

    pub async fn register_calendar(&self, calendar_id: impl Into<String>, org_id: Uuid) {
        self.by_calendar_id.write().await.insert(calendar_id.into(), org_id);
    }

    /// Registers a catch-all external reference (a Sentry project slug, a
    /// Stripe customer id) to a tenant, for sources with neither a bot nor a
    /// calendar identifier to key off of.
    pub async fn register_external_ref(&self, external_ref: impl Into<String>, org_id: Uuid) {
        self.by_external_ref.write().await.insert(external_ref.into(), org_id);
    }

    /// Resolves a tenant by URL path token first, then bot_id, then
    /// calendar_id, then a generic external reference (spec §4.3 tenant
    /// resolution order).
    pub async fn resolve(
        &self,
        path_org_id: Option<Uuid>,
        bot_id: Option<&str>,
        calendar_id: Option<&str>,
        external_ref: Option<&str>,
    ) -> Option<Uuid> {
        if let Some(org_id) = path_org_id {
            return Some(org_id);
        }
        if let Some(bot_id) = bot_id {
            if let Some(org_id) = self.by_bot_id.read().await.get(bot_id) {
                return Some(*org_id);
            }
        }
        if let Some(calendar_id) = calendar_id {
            if let Some(org_id) = self.by_calendar_id.read().await.get(calendar_id) {
                return Some(*org_id);
            }
        }
        if let Some(external_ref) = external_ref {
            if let Some(org_id) = self.by_external_ref.read().await.get(external_ref) {
                return Some(*org_id);
            }
        }
        None
    }
}
