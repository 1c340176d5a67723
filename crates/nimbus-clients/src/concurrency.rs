use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

/// Per-tenant concurrency cap (spec §4.2). `tokio::sync::Semaphore` queues
/// waiters FIFO and releases on permit drop, so every exit path (success,
/// error, panic-unwind) frees the slot.
pub struct TenantConcurrencyLimiter {
    permits: usize,
    tenants: RwLock<HashMap<String, Arc<Semaphore>>>,
}

impl TenantConcurrencyLimiter {
    pub fn new(permits_per_tenant: usize) -> Self {
        Self { permits: permits_per_tenant, tenants: RwLock::new(HashMap::new()) }
    }

    async fn semaphore_for(&self, tenant_id: &str) -> Arc<Semaphore> {
        if let Some(sem) = self.tenants.read().await.get(tenant_id) {
            return sem.clone();
        }
        let mut tenants = self.tenants.write().await;
        tenants
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.permits)))
            .clone()
    }

    pub async fn acquire(&self, tenant_id: &str) -> OwnedSemaphorePermit {
        let sem = self.semaphore_for(tenant_id).await;
        sem.acquire_owned().await.expect("semaphore is never closed")
    }
}
