use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

use crate::analytics::{default_retention, AnalyticsStore};
use crate::conditions::{conditions_match, schedule_matches};
use crate::error::{AttemptFailure, DeliveryOutcome, FailureReason, TransportError, TriggerError};
use crate::retry::RetryPolicy;
use crate::store::EndpointStore;
use crate::template::render_body;
use crate::transport::{build_request, Transport};
use crate::types::{
    AnalyticsSummary, AnalyticsWindow, AttemptId, AttemptOutcome, DeliveryAttempt, Endpoint,
    EndpointId, Event, SkipReason, TenantId,
};

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::counter!(name).increment(1);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Event type used for "send a test webhook" deliveries.
pub const TEST_EVENT_TYPE: &str = "webhook.test";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Global cap on concurrent in-flight HTTP deliveries.
    pub max_in_flight: usize,

    /// Backoff and retry classification policy.
    pub retry: RetryPolicy,

    /// How long finalized attempts are kept for analytics.
    pub retention: chrono::Duration,

    /// How often expired attempts are purged.
    pub purge_interval: Duration,

    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 100,
            retry: RetryPolicy::default(),
            retention: default_retention(),
            purge_interval: Duration::from_secs(60 * 60),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

struct Shared {
    config: EngineConfig,
    store: Arc<dyn EndpointStore>,
    transport: Arc<dyn Transport>,
    analytics: Arc<AnalyticsStore>,
    in_flight: Semaphore,
    is_running: AtomicBool,
}

impl Shared {
    fn running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

/// The webhook delivery engine.
///
/// Owns delivery attempts and analytics; reads endpoint configuration
/// through the injected [`EndpointStore`] and performs HTTP through the
/// injected [`Transport`]. One engine instance serves all tenants of a
/// process.
pub struct WebhookEngine {
    shared: Arc<Shared>,
    purge_handle: Option<JoinHandle<()>>,
}

impl WebhookEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn EndpointStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let shared = Arc::new(Shared {
            in_flight: Semaphore::new(config.max_in_flight.max(1)),
            config,
            store,
            transport,
            analytics: Arc::new(AnalyticsStore::new()),
            is_running: AtomicBool::new(true),
        });

        let purge_shared = shared.clone();
        let purge_handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(purge_shared.config.purge_interval).await;
                if !purge_shared.running() {
                    break;
                }
                let removed = purge_shared
                    .analytics
                    .purge_older_than(purge_shared.config.retention)
                    .await;
                if removed > 0 {
                    tracing::debug!(removed, "purged expired delivery attempts");
                }
            }
        });

        Self {
            shared,
            purge_handle: Some(purge_handle),
        }
    }

    /// Dispatch an event to every eligible endpoint of a tenant.
    ///
    /// Endpoints are resolved through the store (active, subscribed to
    /// `event_type`), gated by conditions and schedule, and delivered
    /// to concurrently. One endpoint's failure never blocks or cancels
    /// another's delivery; outcome order is unspecified. An empty
    /// result is not an error.
    pub async fn trigger_event(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
        payload: Value,
    ) -> Result<Vec<DeliveryOutcome>, TriggerError> {
        if !self.shared.running() {
            return Err(TriggerError::Shutdown);
        }

        let endpoints = self
            .shared
            .store
            .endpoints_for_event(tenant_id, event_type)
            .await;

        let event = Event {
            event_type: event_type.to_string(),
            payload,
            tenant_id: tenant_id.clone(),
        };

        let now = Local::now();
        let mut outcomes = Vec::with_capacity(endpoints.len());
        let mut deliveries: JoinSet<DeliveryOutcome> = JoinSet::new();

        for endpoint in endpoints {
            if !conditions_match(&endpoint.conditions, &event.payload) {
                metric_inc("webhook.trigger.conditions_not_met");
                record_skip(&self.shared, &endpoint, &event).await;
                outcomes.push(DeliveryOutcome::Skipped {
                    endpoint_id: endpoint.id.clone(),
                    reason: SkipReason::ConditionsNotMet,
                });
                continue;
            }

            if let Some(schedule) = &endpoint.schedule {
                if !schedule_matches(schedule, now) {
                    metric_inc("webhook.trigger.outside_schedule");
                    record_skip(&self.shared, &endpoint, &event).await;
                    outcomes.push(DeliveryOutcome::Skipped {
                        endpoint_id: endpoint.id.clone(),
                        reason: SkipReason::OutsideSchedule,
                    });
                    continue;
                }
            }

            self.shared.store.record_triggered(&endpoint.id).await;
            metric_inc("webhook.trigger.dispatched");

            let shared = self.shared.clone();
            let event = event.clone();
            deliveries.spawn(async move { deliver_with_retries(shared, endpoint, event).await });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => tracing::error!(%err, "delivery task panicked"),
            }
        }

        Ok(outcomes)
    }

    /// Deliver a sample payload to an endpoint snapshot, bypassing
    /// subscription, condition, and schedule filtering. Used for
    /// "send test webhook".
    pub async fn test_endpoint(&self, endpoint: Endpoint, payload: Value) -> DeliveryOutcome {
        if !self.shared.running() {
            return DeliveryOutcome::Failed {
                endpoint_id: endpoint.id.clone(),
                attempts: 0,
                reason: FailureReason::Shutdown,
            };
        }

        let event = Event {
            event_type: TEST_EVENT_TYPE.to_string(),
            payload,
            tenant_id: endpoint.tenant_id.clone(),
        };
        deliver_with_retries(self.shared.clone(), Arc::new(endpoint), event).await
    }

    /// Delivery metrics for one endpoint over a rolling window.
    pub async fn analytics(
        &self,
        endpoint_id: &EndpointId,
        window: AnalyticsWindow,
    ) -> AnalyticsSummary {
        self.shared.analytics.summary(endpoint_id, window).await
    }

    /// The engine-owned analytics store.
    pub fn analytics_store(&self) -> Arc<AnalyticsStore> {
        self.shared.analytics.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running()
    }

    /// Stop accepting triggers and abandon not-yet-started retries.
    ///
    /// In-flight HTTP calls are not interrupted; a backoff sleep that
    /// wakes after shutdown finalizes its delivery as failed instead of
    /// attempting again.
    pub async fn shutdown(&mut self) {
        self.shared.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.purge_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for WebhookEngine {
    // Dropping without shutdown must not leave the purge task looping
    // with its own Arc of the shared state.
    fn drop(&mut self) {
        self.shared.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.purge_handle.take() {
            handle.abort();
        }
    }
}

/// Run the full attempt/retry loop for one endpoint.
///
/// The body is rendered, serialized, and signed exactly once; retries
/// re-send the identical bytes so the signature stays verifiable on
/// resend. Attempts within one endpoint are strictly sequential.
async fn deliver_with_retries(
    shared: Arc<Shared>,
    endpoint: Arc<Endpoint>,
    event: Event,
) -> DeliveryOutcome {
    let built = render_body(&endpoint, &event, Utc::now())
        .and_then(|body| {
            serde_json::to_vec(&body)
                .map_err(|err| crate::error::ConfigError::Template(err.to_string()))
        })
        .and_then(|bytes| build_request(&endpoint, bytes, &shared.config.user_agent));

    let request = match built {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(endpoint = %endpoint.id.0, %err, "rejecting delivery: configuration error");
            metric_inc("webhook.delivery.config_error");
            finalize(
                &shared,
                &endpoint,
                &event,
                Utc::now(),
                Duration::ZERO,
                AttemptOutcome::Failure,
                None,
                0,
            )
            .await;
            shared.store.record_failure(&endpoint.id).await;
            return DeliveryOutcome::Failed {
                endpoint_id: endpoint.id.clone(),
                attempts: 0,
                reason: FailureReason::Config(err),
            };
        }
    };

    let mut retry_ordinal: u32 = 0;
    loop {
        let permit = match shared.in_flight.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return DeliveryOutcome::Failed {
                    endpoint_id: endpoint.id.clone(),
                    attempts: retry_ordinal,
                    reason: FailureReason::Shutdown,
                }
            }
        };

        let started_at = Utc::now();
        let timer = Instant::now();
        // The timeout holds for any Transport implementation, not just
        // ones that enforce it themselves.
        let result =
            match tokio::time::timeout(request.timeout, shared.transport.send(&request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };
        let duration = timer.elapsed();

        // Release before any backoff sleep so a retrying endpoint does
        // not starve others of in-flight capacity.
        drop(permit);

        let failure = match result {
            Ok(response) if response.is_success() => {
                metric_inc("webhook.delivery.delivered");
                tracing::debug!(
                    endpoint = %endpoint.id.0,
                    status = response.status,
                    retry_ordinal,
                    "webhook delivered"
                );
                finalize(
                    &shared,
                    &endpoint,
                    &event,
                    started_at,
                    duration,
                    AttemptOutcome::Success,
                    Some(response.status),
                    retry_ordinal,
                )
                .await;
                shared.store.record_success(&endpoint.id).await;
                return DeliveryOutcome::Delivered {
                    endpoint_id: endpoint.id.clone(),
                    attempts: retry_ordinal + 1,
                    http_status: response.status,
                };
            }
            Ok(response) => AttemptFailure::Status(response.status),
            Err(err) => AttemptFailure::Transport(err),
        };

        metric_inc("webhook.delivery.attempt_failed");
        tracing::debug!(
            endpoint = %endpoint.id.0,
            %failure,
            retry_ordinal,
            "webhook attempt failed"
        );
        finalize(
            &shared,
            &endpoint,
            &event,
            started_at,
            duration,
            AttemptOutcome::Failure,
            failure.http_status(),
            retry_ordinal,
        )
        .await;

        let exhausted = retry_ordinal >= endpoint.max_retries;
        let retryable = failure.is_retryable(shared.config.retry.retry_client_errors);
        if exhausted || !retryable {
            metric_inc("webhook.delivery.failed");
            tracing::warn!(
                endpoint = %endpoint.id.0,
                attempts = retry_ordinal + 1,
                %failure,
                "webhook delivery failed terminally"
            );
            shared.store.record_failure(&endpoint.id).await;
            return DeliveryOutcome::Failed {
                endpoint_id: endpoint.id.clone(),
                attempts: retry_ordinal + 1,
                reason: failure.into(),
            };
        }

        tokio::time::sleep(shared.config.retry.backoff_with_jitter(retry_ordinal)).await;

        // A retry that wakes after shutdown is a no-op.
        if !shared.running() {
            shared.store.record_failure(&endpoint.id).await;
            return DeliveryOutcome::Failed {
                endpoint_id: endpoint.id.clone(),
                attempts: retry_ordinal + 1,
                reason: FailureReason::Shutdown,
            };
        }

        retry_ordinal += 1;
    }
}

async fn record_skip(shared: &Shared, endpoint: &Endpoint, event: &Event) {
    finalize(
        shared,
        endpoint,
        event,
        Utc::now(),
        Duration::ZERO,
        AttemptOutcome::Skipped,
        None,
        0,
    )
    .await;
}

#[allow(clippy::too_many_arguments)]
async fn finalize(
    shared: &Shared,
    endpoint: &Endpoint,
    event: &Event,
    started_at: chrono::DateTime<Utc>,
    duration: Duration,
    outcome: AttemptOutcome,
    http_status: Option<u16>,
    retry_ordinal: u32,
) {
    shared
        .analytics
        .record(DeliveryAttempt {
            attempt_id: AttemptId::generate(),
            endpoint_id: endpoint.id.clone(),
            event_type: event.event_type.clone(),
            started_at,
            duration,
            outcome,
            http_status,
            retry_ordinal,
        })
        .await;
}
