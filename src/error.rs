use std::fmt;

use crate::types::{EndpointId, SkipReason};

/// Errors caused by endpoint configuration, not by transport.
///
/// These fail a delivery immediately and are never retried: retrying a
/// malformed template or an unparseable URL cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Template substitution produced text that is not valid JSON.
    Template(String),

    /// Endpoint URL could not be parsed.
    Url(String),

    /// A configured header name or value is not representable on the wire.
    Header(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Template(detail) => {
                write!(f, "rendered template is not valid JSON: {detail}")
            }
            ConfigError::Url(detail) => write!(f, "invalid endpoint URL: {detail}"),
            ConfigError::Header(detail) => write!(f, "invalid header: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Transport-level failure of a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request exceeded the per-attempt timeout.
    Timeout,

    /// Connection, TLS, or DNS failure before a response was received.
    Network(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Network(detail) => write!(f, "network error: {detail}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Why a delivery attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// No HTTP response was received.
    Transport(TransportError),

    /// The endpoint answered with a non-2xx status.
    Status(u16),
}

impl AttemptFailure {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            AttemptFailure::Transport(_) => None,
            AttemptFailure::Status(status) => Some(*status),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures and 5xx/429 are always retryable. Other 4xx
    /// responses retry only when the policy says so.
    pub fn is_retryable(&self, retry_client_errors: bool) -> bool {
        match self {
            AttemptFailure::Transport(_) => true,
            AttemptFailure::Status(status) => {
                *status >= 500 || *status == 429 || retry_client_errors
            }
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Transport(err) => err.fmt(f),
            AttemptFailure::Status(status) => write!(f, "endpoint returned HTTP {status}"),
        }
    }
}

/// Terminal reason a delivery failed after all attempts settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Last transport-level failure after exhausting retries.
    Transport(TransportError),

    /// Last non-2xx status after exhausting retries.
    Status(u16),

    /// Non-retryable configuration problem.
    Config(ConfigError),

    /// Engine shut down before the remaining retries could run.
    Shutdown,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(err) => err.fmt(f),
            FailureReason::Status(status) => write!(f, "endpoint returned HTTP {status}"),
            FailureReason::Config(err) => err.fmt(f),
            FailureReason::Shutdown => write!(f, "engine shut down"),
        }
    }
}

impl From<AttemptFailure> for FailureReason {
    fn from(failure: AttemptFailure) -> Self {
        match failure {
            AttemptFailure::Transport(err) => FailureReason::Transport(err),
            AttemptFailure::Status(status) => FailureReason::Status(status),
        }
    }
}

/// Per-endpoint result of a trigger, reported back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// A 2xx response was received.
    Delivered {
        endpoint_id: EndpointId,
        attempts: u32,
        http_status: u16,
    },

    /// All attempts settled without a 2xx response.
    Failed {
        endpoint_id: EndpointId,
        attempts: u32,
        reason: FailureReason,
    },

    /// Conditions or schedule gated the dispatch; no HTTP call was made.
    Skipped {
        endpoint_id: EndpointId,
        reason: SkipReason,
    },
}

impl DeliveryOutcome {
    pub fn endpoint_id(&self) -> &EndpointId {
        match self {
            DeliveryOutcome::Delivered { endpoint_id, .. }
            | DeliveryOutcome::Failed { endpoint_id, .. }
            | DeliveryOutcome::Skipped { endpoint_id, .. } => endpoint_id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Errors returned when a trigger is rejected *before* dispatch begins.
#[derive(Debug, PartialEq, Eq)]
pub enum TriggerError {
    /// Engine has been shut down.
    Shutdown,
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerError::Shutdown => write!(f, "engine is shut down"),
        }
    }
}

impl std::error::Error for TriggerError {}
