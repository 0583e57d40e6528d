//! Span collectors.
//!
//! A [`SpanCollector`] receives every finished span exactly once. Recording
//! is best-effort: the [`Tracer`](super::Tracer) logs and discards any error
//! a collector returns.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::tracing_support::span::FinishedSpan;
use crate::Result;

/// Destination for finished spans.
pub trait SpanCollector: Send + Sync {
    /// Records a finished span.
    ///
    /// Implementations must not block on network I/O.
    fn record(&self, span: &FinishedSpan) -> Result<()>;
}

impl<C: SpanCollector + ?Sized> SpanCollector for Arc<C> {
    fn record(&self, span: &FinishedSpan) -> Result<()> {
        (**self).record(span)
    }
}

/// Collector that drops every span.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCollector;

impl SpanCollector for NoopCollector {
    fn record(&self, _span: &FinishedSpan) -> Result<()> {
        Ok(())
    }
}

/// Collector that keeps spans in memory for inspection.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::tracing_support::{
///     InMemoryCollector, Span, SpanCollector, SpanKind, SpanOutcome, TraceContext,
/// };
///
/// let collector = InMemoryCollector::new();
/// let mut span = Span::start(SpanKind::Server, "GET /", TraceContext::new_root());
/// let finished = span.finish(SpanOutcome::Status(200)).unwrap();
///
/// collector.record(&finished).unwrap();
/// assert_eq!(collector.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollector {
    spans: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl InMemoryCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded span, in recording order.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans.lock().clone()
    }

    /// Returns the recorded spans whose name contains `needle`.
    pub fn find(&self, needle: &str) -> Vec<FinishedSpan> {
        self.spans
            .lock()
            .iter()
            .filter(|s| s.name().contains(needle))
            .cloned()
            .collect()
    }

    /// Returns the number of recorded spans.
    pub fn len(&self) -> usize {
        self.spans.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.spans.lock().is_empty()
    }

    /// Discards every recorded span.
    pub fn clear(&self) {
        self.spans.lock().clear();
    }
}

impl SpanCollector for InMemoryCollector {
    fn record(&self, span: &FinishedSpan) -> Result<()> {
        self.spans.lock().push(span.clone());
        Ok(())
    }
}

/// Collector that emits one `debug!` event per span.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCollector;

impl SpanCollector for LoggingCollector {
    fn record(&self, span: &FinishedSpan) -> Result<()> {
        let ctx = span.context();
        tracing::debug!(
            trace_id = %ctx.trace_id(),
            span_id = %ctx.span_id(),
            parent_span_id = ctx.parent_span_id().map(|p| p.to_string()),
            kind = %span.kind(),
            name = span.name(),
            duration_ms = span.duration().as_millis() as u64,
            error = span.is_error(),
            "span finished"
        );
        Ok(())
    }
}

// ============================================================================
// Zipkin
// ============================================================================

#[cfg(feature = "rest")]
pub use zipkin::ZipkinCollector;

#[cfg(feature = "rest")]
mod zipkin {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde::Serialize;
    use url::Url;

    use super::SpanCollector;
    use crate::error::{Error, ErrorKind};
    use crate::tracing_support::span::FinishedSpan;
    use crate::Result;

    /// Collector that posts Zipkin v2 JSON to a collector endpoint.
    ///
    /// Each span is sent from a task spawned on the ambient tokio runtime;
    /// `record` never waits for the network. Delivery failures are logged at
    /// `debug` and dropped.
    #[derive(Debug, Clone)]
    pub struct ZipkinCollector {
        client: reqwest::Client,
        endpoint: Url,
        service_name: String,
    }

    impl ZipkinCollector {
        /// Path of the Zipkin v2 span intake.
        pub const SPANS_PATH: &'static str = "/api/v2/spans";

        /// Creates a collector posting to `{base_url}/api/v2/spans`.
        pub fn new(base_url: &Url, service_name: impl Into<String>) -> Result<Self> {
            let endpoint = base_url.join(Self::SPANS_PATH)?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .map_err(|e| {
                    Error::new(
                        ErrorKind::Configuration,
                        format!("Failed to create HTTP client: {}", e),
                    )
                })?;

            Ok(Self {
                client,
                endpoint,
                service_name: service_name.into(),
            })
        }

        /// Returns the span intake URL.
        pub fn endpoint(&self) -> &Url {
            &self.endpoint
        }

        pub(super) fn encode(&self, span: &FinishedSpan) -> ZipkinSpan {
            let ctx = span.context();
            let tags = span
                .tags()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect();
            let annotations = span
                .events()
                .iter()
                .map(|e| ZipkinAnnotation {
                    timestamp: e.timestamp().timestamp_micros(),
                    value: format!("{}: {}", e.label(), e.detail()),
                })
                .collect();

            ZipkinSpan {
                trace_id: ctx.trace_id().to_string(),
                id: ctx.span_id().to_string(),
                parent_id: ctx.parent_span_id().map(|p| p.to_string()),
                name: span.name().to_string(),
                kind: span.kind().zipkin_value(),
                timestamp: span.started_at().timestamp_micros(),
                duration: u64::try_from(span.duration().as_micros()).unwrap_or(u64::MAX),
                local_endpoint: ZipkinEndpoint {
                    service_name: self.service_name.clone(),
                },
                tags,
                annotations,
            }
        }
    }

    impl SpanCollector for ZipkinCollector {
        fn record(&self, span: &FinishedSpan) -> Result<()> {
            let handle = tokio::runtime::Handle::try_current().map_err(|e| {
                Error::new(ErrorKind::Internal, format!("no tokio runtime: {}", e))
            })?;

            let body = vec![self.encode(span)];
            let request = self.client.post(self.endpoint.clone()).json(&body);
            handle.spawn(async move {
                match request.send().await {
                    Ok(response) if !response.status().is_success() => {
                        tracing::debug!(status = response.status().as_u16(), "zipkin rejected span");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = %e, "zipkin delivery failed"),
                }
            });
            Ok(())
        }
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ZipkinSpan {
        pub(super) trace_id: String,
        pub(super) id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub(super) parent_id: Option<String>,
        pub(super) name: String,
        pub(super) kind: &'static str,
        pub(super) timestamp: i64,
        pub(super) duration: u64,
        pub(super) local_endpoint: ZipkinEndpoint,
        pub(super) tags: BTreeMap<String, String>,
        pub(super) annotations: Vec<ZipkinAnnotation>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ZipkinEndpoint {
        pub(super) service_name: String,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct ZipkinAnnotation {
        pub(super) timestamp: i64,
        pub(super) value: String,
    }
}
