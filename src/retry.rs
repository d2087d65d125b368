use std::time::Duration;

/// Backoff and retry classification policy.
///
/// The delay before retry `n` (0-based) is `min(base * 2^n, max)` plus
/// up to `jitter_percent` of random jitter. Jitter keeps many
/// endpoints that failed at the same moment from retrying in lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter_percent: u64,

    /// Whether non-429 4xx responses re-enter the retry loop.
    ///
    /// Defaults to true: every non-2xx is treated uniformly up to the
    /// retry budget. Set false to fail fast on client errors that will
    /// not succeed on resend (404, 401, ...).
    pub retry_client_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 300_000,
            jitter_percent: 10,
            retry_client_errors: true,
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff for a retry ordinal, without jitter.
    pub fn backoff(&self, retry_ordinal: u32) -> Duration {
        let base = self.base_ms.max(1);
        let pow = 2u64.saturating_pow(retry_ordinal);
        let delay = base.saturating_mul(pow);
        Duration::from_millis(delay.min(self.max_ms.max(base)))
    }

    /// Backoff plus random jitter, as actually slept.
    pub fn backoff_with_jitter(&self, retry_ordinal: u32) -> Duration {
        let backoff = self.backoff(retry_ordinal);
        if self.jitter_percent == 0 {
            return backoff;
        }
        let span = backoff.as_millis() as u64 * self.jitter_percent / 100;
        let jitter = if span == 0 { 0 } else { fastrand::u64(0..=span) };
        backoff + Duration::from_millis(jitter)
    }
}
