//! Delivery analytics.
//!
//! An [`AnalyticsStore`] is owned by the engine instance and injected
//! where needed; there is no process-wide singleton. Buckets are
//! append-only vectors keyed by endpoint id. Metrics are derived on
//! read from a snapshot of the bucket, so reads tolerate concurrent
//! appends without a global lock.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::{
    AnalyticsSummary, AnalyticsWindow, AttemptOutcome, DeliveryAttempt, EndpointId,
};

/// Default retention horizon for recorded attempts.
pub fn default_retention() -> chrono::Duration {
    chrono::Duration::days(30)
}

#[derive(Default)]
pub struct AnalyticsStore {
    buckets: RwLock<HashMap<EndpointId, Vec<DeliveryAttempt>>>,
}

impl AnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized attempt to its endpoint bucket.
    pub async fn record(&self, attempt: DeliveryAttempt) {
        let mut guard = self.buckets.write().await;
        guard
            .entry(attempt.endpoint_id.clone())
            .or_default()
            .push(attempt);
    }

    /// Number of recorded attempts for an endpoint, across all time.
    pub async fn attempt_count(&self, endpoint_id: &EndpointId) -> usize {
        let guard = self.buckets.read().await;
        guard.get(endpoint_id).map_or(0, Vec::len)
    }

    /// Compute metrics for one endpoint over a rolling window.
    ///
    /// The bucket is snapshotted before sorting; `success_rate` and the
    /// latency aggregates cover delivered (non-skipped) attempts only.
    pub async fn summary(
        &self,
        endpoint_id: &EndpointId,
        window: AnalyticsWindow,
    ) -> AnalyticsSummary {
        let cutoff = Utc::now() - window.duration();

        let snapshot: Vec<DeliveryAttempt> = {
            let guard = self.buckets.read().await;
            guard
                .get(endpoint_id)
                .map(|bucket| {
                    bucket
                        .iter()
                        .filter(|attempt| attempt.started_at >= cutoff)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        let total_attempts = snapshot.len();
        let success_count = count_outcome(&snapshot, AttemptOutcome::Success);
        let failure_count = count_outcome(&snapshot, AttemptOutcome::Failure);
        let skipped_count = count_outcome(&snapshot, AttemptOutcome::Skipped);

        let delivered = success_count + failure_count;
        let success_rate = if delivered == 0 {
            0.0
        } else {
            success_count as f64 / delivered as f64 * 100.0
        };

        let mut durations: Vec<u64> = snapshot
            .iter()
            .filter(|attempt| attempt.outcome != AttemptOutcome::Skipped)
            .map(|attempt| attempt.duration.as_millis() as u64)
            .collect();
        durations.sort_unstable();

        let avg_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        AnalyticsSummary {
            window,
            total_attempts,
            success_count,
            failure_count,
            skipped_count,
            success_rate,
            avg_duration_ms,
            p50_ms: percentile(&durations, 0.50),
            p95_ms: percentile(&durations, 0.95),
            p99_ms: percentile(&durations, 0.99),
        }
    }

    /// Drop attempts older than the retention horizon. Returns how many
    /// were removed.
    pub async fn purge_older_than(&self, retention: chrono::Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut removed = 0;

        let mut guard = self.buckets.write().await;
        for bucket in guard.values_mut() {
            let before = bucket.len();
            bucket.retain(|attempt| attempt.started_at >= cutoff);
            removed += before - bucket.len();
        }
        guard.retain(|_, bucket| !bucket.is_empty());

        removed
    }
}

/// Index-based percentile: `sorted[floor(n * p)]`, clamped to the last
/// element, 0 for empty input. For 100 samples `1..=100` this yields
/// p50 = 51, p95 = 96, p99 = 100.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted[index]
}

fn count_outcome(attempts: &[DeliveryAttempt], outcome: AttemptOutcome) -> usize {
    attempts.iter().filter(|a| a.outcome == outcome).count()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::types::AttemptId;

    fn attempt(
        endpoint: &str,
        outcome: AttemptOutcome,
        duration_ms: u64,
        age: chrono::Duration,
    ) -> DeliveryAttempt {
        DeliveryAttempt {
            attempt_id: AttemptId::generate(),
            endpoint_id: EndpointId(endpoint.into()),
            event_type: "transcription.completed".into(),
            started_at: Utc::now() - age,
            duration: Duration::from_millis(duration_ms),
            outcome,
            http_status: None,
            retry_ordinal: 0,
        }
    }

    #[test]
    fn percentile_indexing_scheme() {
        let durations: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&durations, 0.50), 51);
        assert_eq!(percentile(&durations, 0.95), 96);
        assert_eq!(percentile(&durations, 0.99), 100);
        assert_eq!(percentile(&[], 0.95), 0);
        assert_eq!(percentile(&[7], 0.99), 7);
    }

    #[tokio::test]
    async fn summary_counts_and_success_rate() {
        let store = AnalyticsStore::new();
        let id = EndpointId("ep-1".into());
        for duration in [10, 20, 30] {
            store
                .record(attempt(
                    "ep-1",
                    AttemptOutcome::Success,
                    duration,
                    chrono::Duration::minutes(5),
                ))
                .await;
        }
        store
            .record(attempt(
                "ep-1",
                AttemptOutcome::Failure,
                40,
                chrono::Duration::minutes(5),
            ))
            .await;
        store
            .record(attempt(
                "ep-1",
                AttemptOutcome::Skipped,
                0,
                chrono::Duration::minutes(5),
            ))
            .await;

        let summary = store.summary(&id, AnalyticsWindow::Hour).await;
        assert_eq!(summary.total_attempts, 5);
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(summary.success_rate, 75.0);
        assert_eq!(summary.avg_duration_ms, 25.0);
    }

    #[tokio::test]
    async fn summary_filters_to_the_window() {
        let store = AnalyticsStore::new();
        let id = EndpointId("ep-1".into());
        store
            .record(attempt(
                "ep-1",
                AttemptOutcome::Success,
                10,
                chrono::Duration::minutes(10),
            ))
            .await;
        store
            .record(attempt(
                "ep-1",
                AttemptOutcome::Failure,
                10,
                chrono::Duration::hours(5),
            ))
            .await;

        let hour = store.summary(&id, AnalyticsWindow::Hour).await;
        assert_eq!(hour.total_attempts, 1);
        assert_eq!(hour.success_rate, 100.0);

        let six_hours = store.summary(&id, AnalyticsWindow::SixHours).await;
        assert_eq!(six_hours.total_attempts, 2);
        assert_eq!(six_hours.success_rate, 50.0);
    }

    #[tokio::test]
    async fn unknown_endpoint_yields_empty_summary() {
        let store = AnalyticsStore::new();
        let summary = store
            .summary(&EndpointId("nope".into()), AnalyticsWindow::Month)
            .await;
        assert_eq!(summary.total_attempts, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.p95_ms, 0);
    }

    #[tokio::test]
    async fn purge_drops_expired_attempts() {
        let store = AnalyticsStore::new();
        store
            .record(attempt(
                "ep-1",
                AttemptOutcome::Success,
                10,
                chrono::Duration::days(40),
            ))
            .await;
        store
            .record(attempt(
                "ep-1",
                AttemptOutcome::Success,
                10,
                chrono::Duration::days(1),
            ))
            .await;

        let removed = store.purge_older_than(default_retention()).await;
        assert_eq!(removed, 1);
        assert_eq!(store.attempt_count(&EndpointId("ep-1".into())).await, 1);
    }
}
