use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{Endpoint, EndpointId, TenantId};

/// Per-endpoint statistic counters, updated through explicit
/// write-back calls. The engine never mutates endpoint configuration
/// in-process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointCounters {
    pub triggered: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Read side of the endpoint configuration store, plus counter
/// write-backs. Configuration CRUD itself lives outside the engine.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Active endpoints of `tenant_id` subscribed to `event_type`.
    ///
    /// Inactive endpoints and endpoints without a matching
    /// subscription must not be returned. An empty result is not an
    /// error.
    async fn endpoints_for_event(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
    ) -> Vec<Arc<Endpoint>>;

    /// Look up a single endpoint snapshot.
    async fn get(&self, endpoint_id: &EndpointId) -> Option<Arc<Endpoint>>;

    /// An event matched this endpoint and dispatch was attempted.
    async fn record_triggered(&self, endpoint_id: &EndpointId);

    /// A delivery to this endpoint settled with a 2xx response.
    async fn record_success(&self, endpoint_id: &EndpointId);

    /// A delivery to this endpoint settled as a terminal failure.
    async fn record_failure(&self, endpoint_id: &EndpointId);
}

/// In-memory endpoint store for embedding and tests.
#[derive(Default)]
pub struct InMemoryEndpointStore {
    endpoints: RwLock<HashMap<EndpointId, Arc<Endpoint>>>,
    counters: RwLock<HashMap<EndpointId, EndpointCounters>>,
}

impl InMemoryEndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, endpoint: Endpoint) {
        let id = endpoint.id.clone();
        let mut guard = self.endpoints.write().await;
        guard.insert(id, Arc::new(endpoint));
    }

    pub async fn remove(&self, endpoint_id: &EndpointId) {
        let mut guard = self.endpoints.write().await;
        guard.remove(endpoint_id);
    }

    pub async fn counters(&self, endpoint_id: &EndpointId) -> EndpointCounters {
        let guard = self.counters.read().await;
        guard.get(endpoint_id).cloned().unwrap_or_default()
    }

    async fn bump<F>(&self, endpoint_id: &EndpointId, apply: F)
    where
        F: FnOnce(&mut EndpointCounters),
    {
        let mut guard = self.counters.write().await;
        apply(guard.entry(endpoint_id.clone()).or_default());
    }
}

#[async_trait]
impl EndpointStore for InMemoryEndpointStore {
    async fn endpoints_for_event(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
    ) -> Vec<Arc<Endpoint>> {
        let guard = self.endpoints.read().await;
        guard
            .values()
            .filter(|endpoint| {
                endpoint.active
                    && &endpoint.tenant_id == tenant_id
                    && endpoint.subscribed_events.contains(event_type)
            })
            .cloned()
            .collect()
    }

    async fn get(&self, endpoint_id: &EndpointId) -> Option<Arc<Endpoint>> {
        let guard = self.endpoints.read().await;
        guard.get(endpoint_id).cloned()
    }

    async fn record_triggered(&self, endpoint_id: &EndpointId) {
        self.bump(endpoint_id, |c| c.triggered += 1).await;
    }

    async fn record_success(&self, endpoint_id: &EndpointId) {
        self.bump(endpoint_id, |c| c.succeeded += 1).await;
    }

    async fn record_failure(&self, endpoint_id: &EndpointId) {
        self.bump(endpoint_id, |c| c.failed += 1).await;
    }
}
