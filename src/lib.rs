//! An event-driven webhook delivery engine.
//!
//! This crate provides a **single-process, in-memory, best-effort**
//! delivery engine: given an internal event, it resolves which
//! registered endpoints should be notified, gates each one through
//! per-endpoint conditions and schedule windows, renders an optional
//! payload template, signs the body with HMAC-SHA256, delivers over
//! HTTP with bounded retries and exponential backoff, and records
//! per-endpoint delivery analytics.
//!
//! ## Guarantees
//! - Best-effort, at-least-once delivery
//! - Per-endpoint isolation: one endpoint's failure never blocks another
//! - Sequential attempts within an endpoint, concurrent fan-out across endpoints
//! - Byte-identical bodies and signatures across retries of one delivery
//!
//! ## Non-Guarantees
//! - Exactly-once delivery
//! - Durability of retries or analytics across restarts
//! - Distributed coordination
//! - Ordering between deliveries to different endpoints
//!
//! Endpoint configuration is owned elsewhere and consumed read-only
//! through [`EndpointStore`]; the HTTP wire sits behind [`Transport`]
//! so embedders and tests can substitute their own.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use webhook_engine::{
//!     Endpoint, EngineConfig, HttpTransport, InMemoryEndpointStore, TenantId, WebhookEngine,
//! };
//!
//! # async fn run() {
//! let store = Arc::new(InMemoryEndpointStore::new());
//! store
//!     .register(
//!         Endpoint::new("ep-1", "tenant-a", "https://example.com/hook")
//!             .subscribe("transcription.completed")
//!             .with_secret(b"supersecret"),
//!     )
//!     .await;
//!
//! let engine = WebhookEngine::new(
//!     EngineConfig::default(),
//!     store,
//!     Arc::new(HttpTransport::new()),
//! );
//!
//! let outcomes = engine
//!     .trigger_event(
//!         &TenantId("tenant-a".into()),
//!         "transcription.completed",
//!         json!({"transcription": {"id": 7, "confidence": 0.95}}),
//!     )
//!     .await;
//! # let _ = outcomes;
//! # }
//! ```

mod analytics;
mod conditions;
mod engine;
mod error;
mod retry;
mod signing;
mod store;
mod template;
mod transport;
mod types;

pub use analytics::{default_retention, AnalyticsStore};
pub use conditions::{conditions_match, lookup_path, schedule_matches};
pub use engine::{EngineConfig, WebhookEngine, TEST_EVENT_TYPE};
pub use error::{
    AttemptFailure, ConfigError, DeliveryOutcome, FailureReason, TransportError, TriggerError,
};
pub use retry::RetryPolicy;
pub use signing::{
    compute_signature, signature_header_value, verify_signature, SIGNATURE_HEADER,
};
pub use store::{EndpointCounters, EndpointStore, InMemoryEndpointStore};
pub use template::{envelope, render_template};
pub use transport::{build_request, Transport, TransportResponse, WebhookRequest};
pub use types::{
    AnalyticsSummary, AnalyticsWindow, AttemptId, AttemptOutcome, AuthScheme, Condition,
    ConditionOperator, DeliveryAttempt, Endpoint, EndpointId, Event, HttpMethod, Schedule,
    SkipReason, TenantId, TimeRange,
};

#[cfg(feature = "http")]
pub use transport::HttpTransport;
