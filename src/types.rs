use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for an endpoint.
///
/// This is a strongly-typed wrapper to avoid accidental mixing
/// of endpoint IDs with other string identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub String);

/// Unique identifier for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Unique identifier for a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub String);

impl AttemptId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// HTTP method used for delivery. Webhooks are write operations,
/// so only mutating methods are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Post,
    Put,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// Authentication applied to outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthScheme {
    None,
    Bearer { token: String },
    Basic { username: String, password: String },
    ApiKey { header: String, key: String },
    Custom { headers: HashMap<String, String> },
}

/// Comparison operator for a payload condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
    Regex,
}

/// A single predicate over the event payload.
///
/// `field` is a dot-separated path into the payload tree
/// (e.g. `data.transcription.confidence`). A missing path satisfies
/// only `NotExists`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Inclusive time-of-day window, evaluated in the engine's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Restricts when an endpoint may receive deliveries.
///
/// All present sub-conditions must hold; absent sub-conditions are
/// treated as always-true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub time_range: Option<TimeRange>,

    /// Allowed days of week, 0 = Sunday.
    pub days_of_week: Option<HashSet<u8>>,

    /// Inclusive date bounds.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Destination for webhook delivery.
///
/// An `Endpoint` describes *where* and *how* an event should be
/// delivered, plus *whether* a given event instance should fire
/// (subscriptions, conditions, schedule). It is a pure configuration
/// snapshot: the engine never mutates it, and concurrent edits in the
/// configuration store do not affect in-flight deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Logical identifier for the endpoint.
    pub id: EndpointId,

    /// Owning tenant.
    pub tenant_id: TenantId,

    /// Target URL for webhook delivery.
    pub url: String,

    /// HTTP method used for delivery.
    pub method: HttpMethod,

    /// Static headers merged into every request.
    pub headers: HashMap<String, String>,

    /// Optional secret for HMAC signing. Absence disables signing.
    pub secret: Option<Vec<u8>>,

    /// Event types this endpoint is subscribed to.
    pub subscribed_events: HashSet<String>,

    /// Predicates over the event payload; all must hold.
    pub conditions: Vec<Condition>,

    /// Optional delivery window.
    pub schedule: Option<Schedule>,

    /// Optional payload template (JSON text with `{{dotted.path}}`
    /// placeholders). Unset means the raw payload is delivered in the
    /// standard envelope.
    pub template: Option<String>,

    /// Maximum number of retry attempts after the initial attempt.
    pub max_retries: u32,

    /// Authentication applied to outgoing requests.
    pub auth: AuthScheme,

    /// Maximum time allowed for a single delivery attempt.
    pub timeout: Duration,

    /// Inactive endpoints are never dispatched to.
    pub active: bool,
}

impl Endpoint {
    /// Create a new endpoint with default delivery settings.
    ///
    /// Defaults:
    /// - method: POST
    /// - timeout: 30 seconds
    /// - max_retries: 3
    /// - active: true
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: EndpointId(id.into()),
            tenant_id: TenantId(tenant_id.into()),
            url: url.into(),
            method: HttpMethod::Post,
            headers: HashMap::new(),
            secret: None,
            subscribed_events: HashSet::new(),
            conditions: Vec::new(),
            schedule: None,
            template: None,
            max_retries: 3,
            auth: AuthScheme::None,
            timeout: Duration::from_secs(30),
            active: true,
        }
    }

    /// Set the HTTP method used for delivery.
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Add a static header merged into every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set a secret for HMAC signing.
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Subscribe this endpoint to an event type.
    pub fn subscribe(mut self, event_type: impl Into<String>) -> Self {
        self.subscribed_events.insert(event_type.into());
        self
    }

    /// Append a payload condition (conditions are AND-ed).
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Restrict delivery to a schedule window.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Set a payload template (JSON text with `{{path}}` placeholders).
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the authentication scheme for outgoing requests.
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    /// Set a custom timeout for delivery attempts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mark the endpoint active or inactive.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Logical event to be delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type string, e.g. `transcription.completed`.
    pub event_type: String,

    /// Structured event payload.
    pub payload: Value,

    /// Owning tenant.
    pub tenant_id: TenantId,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        payload: Value,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            tenant_id: TenantId(tenant_id.into()),
        }
    }
}

/// Terminal classification of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Success,
    Failure,
    Skipped,
}

/// A finalized delivery attempt.
///
/// Created when dispatch begins and finalized exactly once when the
/// HTTP call settles or the delivery is abandoned. Never mutated after
/// finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub attempt_id: AttemptId,
    pub endpoint_id: EndpointId,
    pub event_type: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcome: AttemptOutcome,
    pub http_status: Option<u16>,

    /// 0 for the first try.
    pub retry_ordinal: u32,
}

/// Why a delivery was skipped without any HTTP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ConditionsNotMet,
    OutsideSchedule,
}

/// Rolling time window for analytics queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticsWindow {
    Hour,
    SixHours,
    Day,
    Week,
    Month,
}

impl AnalyticsWindow {
    pub fn duration(&self) -> chrono::Duration {
        match self {
            AnalyticsWindow::Hour => chrono::Duration::hours(1),
            AnalyticsWindow::SixHours => chrono::Duration::hours(6),
            AnalyticsWindow::Day => chrono::Duration::hours(24),
            AnalyticsWindow::Week => chrono::Duration::days(7),
            AnalyticsWindow::Month => chrono::Duration::days(30),
        }
    }

    /// Parse the wire form used by API callers (`1h`, `6h`, `24h`, `7d`, `30d`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1h" => Some(AnalyticsWindow::Hour),
            "6h" => Some(AnalyticsWindow::SixHours),
            "24h" => Some(AnalyticsWindow::Day),
            "7d" => Some(AnalyticsWindow::Week),
            "30d" => Some(AnalyticsWindow::Month),
            _ => None,
        }
    }
}

/// Aggregated delivery metrics for one endpoint over a window.
///
/// Derived on read from recorded attempts; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub window: AnalyticsWindow,
    pub total_attempts: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,

    /// Percentage of delivered (non-skipped) attempts that succeeded.
    pub success_rate: f64,

    pub avg_duration_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}
