//! Span types for inbound and outbound work.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::headers::HeaderBag;
use crate::tracing_support::TraceContext;

/// Kind of span, indicating its role in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Handling of an inbound request.
    Server,
    /// Issuance of an outbound call.
    Client,
}

impl SpanKind {
    /// Returns the Zipkin v2 span kind value.
    pub fn zipkin_value(&self) -> &'static str {
        match self {
            SpanKind::Server => "SERVER",
            SpanKind::Client => "CLIENT",
        }
    }
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpanKind::Server => write!(f, "server"),
            SpanKind::Client => write!(f, "client"),
        }
    }
}

/// How the work observed by a span settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanOutcome {
    /// The work produced an HTTP status. Codes of 400 and above are errors.
    Status(u16),
    /// The work failed without a usable status.
    Error(String),
}

impl SpanOutcome {
    /// Returns `true` if this outcome marks the span as failed.
    pub fn is_error(&self) -> bool {
        match self {
            SpanOutcome::Status(status) => *status >= 400,
            SpanOutcome::Error(_) => true,
        }
    }
}

impl From<&crate::Error> for SpanOutcome {
    fn from(err: &crate::Error) -> Self {
        SpanOutcome::Error(err.to_string())
    }
}

/// A timestamped log entry on a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanEvent {
    timestamp: DateTime<Utc>,
    label: String,
    detail: String,
}

impl SpanEvent {
    /// Returns when the event was logged.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the event label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the event detail.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// A unit of work in a trace.
///
/// A span is owned by the call that started it. It accepts tags and events
/// until it is finished; finishing twice is a no-op.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::tracing_support::{Span, SpanKind, SpanOutcome, TraceContext};
///
/// let mut span = Span::start(SpanKind::Server, "GET /orders", TraceContext::new_root());
/// span.tag("http.method", "GET");
///
/// assert!(span.finish(SpanOutcome::Status(500)).is_some());
/// assert!(span.is_error());
///
/// // A second finish changes nothing.
/// assert!(span.finish(SpanOutcome::Status(200)).is_none());
/// assert!(span.is_error());
/// ```
#[derive(Debug, Clone)]
pub struct Span {
    context: TraceContext,
    kind: SpanKind,
    name: String,
    tags: HashMap<String, SpanValue>,
    started_at: DateTime<Utc>,
    started: Instant,
    finished: Option<(DateTime<Utc>, Duration)>,
    error: bool,
    events: Vec<SpanEvent>,
    baggage: HeaderBag,
}

impl Span {
    /// Starts a span identified by `context`.
    pub fn start(kind: SpanKind, name: impl Into<String>, context: TraceContext) -> Self {
        Self {
            context,
            kind,
            name: name.into(),
            tags: HashMap::new(),
            started_at: Utc::now(),
            started: Instant::now(),
            finished: None,
            error: false,
            events: Vec::new(),
            baggage: HeaderBag::new(),
        }
    }

    /// Attaches headers that are copied verbatim onto every outbound call
    /// made under this span.
    #[must_use]
    pub fn with_baggage(mut self, baggage: HeaderBag) -> Self {
        self.baggage = baggage;
        self
    }

    /// Replaces the name. Ignored once the span is finished.
    pub fn rename(&mut self, name: impl Into<String>) {
        if self.finished.is_none() {
            self.name = name.into();
        }
    }

    /// Sets a tag. Ignored once the span is finished.
    pub fn tag(&mut self, key: impl Into<String>, value: impl Into<SpanValue>) {
        if self.finished.is_none() {
            self.tags.insert(key.into(), value.into());
        }
    }

    /// Appends an event. Ignored once the span is finished.
    pub fn log(&mut self, label: impl Into<String>, detail: impl Into<String>) {
        if self.finished.is_none() {
            self.events.push(SpanEvent {
                timestamp: Utc::now(),
                label: label.into(),
                detail: detail.into(),
            });
        }
    }

    /// Finishes the span.
    ///
    /// Returns a snapshot on the first call and `None` afterwards.
    pub fn finish(&mut self, outcome: SpanOutcome) -> Option<FinishedSpan> {
        if self.finished.is_some() {
            return None;
        }

        match &outcome {
            SpanOutcome::Status(status) => {
                self.tag("http.status_code", *status);
                if *status >= 400 {
                    self.error = true;
                    self.log("error", format!("status {}", status));
                }
            }
            SpanOutcome::Error(message) => {
                self.error = true;
                self.tag("error", true);
                self.log("error", message.clone());
            }
        }

        self.finished = Some((Utc::now(), self.started.elapsed()));
        Some(self.snapshot())
    }

    fn snapshot(&self) -> FinishedSpan {
        let (finished_at, duration) = self
            .finished
            .unwrap_or_else(|| (Utc::now(), self.started.elapsed()));
        FinishedSpan {
            context: self.context.clone(),
            kind: self.kind,
            name: self.name.clone(),
            tags: self.tags.clone(),
            started_at: self.started_at,
            finished_at,
            duration,
            error: self.error,
            events: self.events.clone(),
        }
    }

    /// Returns the span's trace context.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Returns the span kind.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the span name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of a tag.
    pub fn tag_value(&self, key: &str) -> Option<&SpanValue> {
        self.tags.get(key)
    }

    /// Returns the tags.
    pub fn tags(&self) -> &HashMap<String, SpanValue> {
        &self.tags
    }

    /// Returns the events in logging order.
    pub fn events(&self) -> &[SpanEvent] {
        &self.events
    }

    /// Returns the baggage headers.
    pub fn baggage(&self) -> &HeaderBag {
        &self.baggage
    }

    /// Returns when the span started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the span finished, if it has.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished.map(|(at, _)| at)
    }

    /// Returns the recorded duration, if finished.
    pub fn duration(&self) -> Option<Duration> {
        self.finished.map(|(_, duration)| duration)
    }

    /// Returns `true` once the span has been finished.
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Returns `true` if the span is flagged as failed.
    pub fn is_error(&self) -> bool {
        self.error
    }
}

/// An immutable record of a finished span, as handed to a collector.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    context: TraceContext,
    kind: SpanKind,
    name: String,
    tags: HashMap<String, SpanValue>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration: Duration,
    error: bool,
    events: Vec<SpanEvent>,
}

impl FinishedSpan {
    /// Returns the span's trace context.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Returns the span kind.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the span name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tags.
    pub fn tags(&self) -> &HashMap<String, SpanValue> {
        &self.tags
    }

    /// Returns when the span started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the span finished.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Returns the span duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns `true` if the span completed with an error.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Returns the events in logging order.
    pub fn events(&self) -> &[SpanEvent] {
        &self.events
    }
}

/// A scalar value that can be attached to a span as a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum SpanValue {
    /// A string value.
    String(String),
    /// An integer value.
    Int(i64),
    /// A float value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl SpanValue {
    /// Returns the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SpanValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SpanValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SpanValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpanValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpanValue::String(s) => write!(f, "{}", s),
            SpanValue::Int(i) => write!(f, "{}", i),
            SpanValue::Float(fl) => write!(f, "{}", fl),
            SpanValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for SpanValue {
    fn from(s: &str) -> Self {
        SpanValue::String(s.to_string())
    }
}

impl From<String> for SpanValue {
    fn from(s: String) -> Self {
        SpanValue::String(s)
    }
}

impl From<i64> for SpanValue {
    fn from(i: i64) -> Self {
        SpanValue::Int(i)
    }
}

impl From<u16> for SpanValue {
    fn from(i: u16) -> Self {
        SpanValue::Int(i64::from(i))
    }
}

impl From<u64> for SpanValue {
    fn from(i: u64) -> Self {
        SpanValue::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for SpanValue {
    fn from(f: f64) -> Self {
        SpanValue::Float(f)
    }
}

impl From<bool> for SpanValue {
    fn from(b: bool) -> Self {
        SpanValue::Bool(b)
    }
}

/// Common tag keys.
pub mod tag_keys {
    /// HTTP method of the request.
    pub const HTTP_METHOD: &str = "http.method";
    /// Path of the inbound request.
    pub const HTTP_PATH: &str = "http.path";
    /// Full URL of an outbound call.
    pub const HTTP_URL: &str = "http.url";
    /// Final HTTP status.
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    /// Downstream service name.
    pub const PEER_SERVICE: &str = "peer.service";
    /// Fixed component identifier.
    pub const COMPONENT: &str = "component";
    /// Orchestration step name.
    pub const STEP: &str = "step";
    /// Fault rule that fired.
    pub const FAULT_ID: &str = "fault.id";
}
