//! Span lifecycle management.
//!
//! The [`Tracer`] turns inbound headers into a server span, issues client
//! spans with their outbound headers, and reports every finished span to a
//! [`SpanCollector`] exactly once.

use std::sync::Arc;

use url::Url;

use crate::headers::HeaderBag;
use crate::tracing_support::collector::{NoopCollector, SpanCollector};
use crate::tracing_support::context::TraceContext;
use crate::tracing_support::propagator::{
    B3Propagator, HeaderExtractor, MultiFormatPropagator, Propagator,
};
use crate::tracing_support::span::{tag_keys, Span, SpanKind, SpanOutcome};

/// Headers copied verbatim from the inbound request to every outbound call.
pub const BAGGAGE_HEADERS: [&str; 3] = ["x-request-id", "x-vcap-request-id", "x-correlation-id"];

/// Component tag value on server spans.
pub const COMPONENT: &str = "storefront-edge";

/// Creates, propagates and finishes spans.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use storefront_edge::HeaderBag;
/// use storefront_edge::tracing_support::{InMemoryCollector, SpanOutcome, Tracer};
/// use url::Url;
///
/// let collector = Arc::new(InMemoryCollector::new());
/// let tracer = Tracer::new(collector.clone());
///
/// let mut server = tracer.handle_inbound(&HeaderBag::new(), "GET", "/orders");
/// let url = Url::parse("http://orders/orders").unwrap();
/// let (mut client, headers) = tracer.start_client(&server, "GET", &url);
///
/// assert!(headers.contains("x-b3-traceid"));
/// assert!(headers.contains("b3"));
/// assert!(headers.contains("traceparent"));
///
/// tracer.finish(&mut client, SpanOutcome::Status(200));
/// tracer.finish(&mut server, SpanOutcome::Status(200));
/// assert_eq!(collector.len(), 2);
/// ```
#[derive(Clone)]
pub struct Tracer {
    propagator: MultiFormatPropagator,
    collector: Arc<dyn SpanCollector>,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("propagator", &self.propagator)
            .finish_non_exhaustive()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(Arc::new(NoopCollector))
    }
}

impl Tracer {
    /// Creates a tracer reporting to `collector`.
    pub fn new(collector: Arc<dyn SpanCollector>) -> Self {
        Self {
            propagator: MultiFormatPropagator::default(),
            collector,
        }
    }

    /// Sets the `tracestate` vendor key written on outbound calls.
    #[must_use]
    pub fn with_vendor_key(mut self, vendor_key: impl Into<String>) -> Self {
        self.propagator = MultiFormatPropagator::new(vendor_key);
        self
    }

    /// Extracts the inbound trace context.
    ///
    /// The first well-formed encoding wins. When none is usable a fresh
    /// root is synthesized, keeping a sampling-only `b3` decision if present.
    pub fn extract_inbound<E: HeaderExtractor>(&self, headers: &E) -> TraceContext {
        match self.propagator.extract_with_encoding(headers) {
            Some((encoding, ctx)) => {
                tracing::trace!(%encoding, trace_id = %ctx.trace_id(), "extracted inbound context");
                ctx
            }
            None => {
                let sampled = B3Propagator::sampling_only(headers).unwrap_or(true);
                TraceContext::new_root().with_sampled(sampled)
            }
        }
    }

    /// Starts the server span for an inbound request.
    pub fn start_server(&self, context: TraceContext, method: &str, path: &str) -> Span {
        let mut span = Span::start(SpanKind::Server, format!("{} {}", method, path), context);
        span.tag(tag_keys::HTTP_METHOD, method);
        span.tag(tag_keys::HTTP_PATH, path);
        span.tag(tag_keys::COMPONENT, COMPONENT);
        span
    }

    /// Extracts the inbound context and starts the server span, capturing
    /// the baggage headers.
    pub fn handle_inbound<E: HeaderExtractor>(&self, headers: &E, method: &str, path: &str) -> Span {
        let context = self.extract_inbound(headers);
        let baggage = Self::inbound_baggage(headers);
        self.start_server(context, method, path).with_baggage(baggage)
    }

    /// Collects the [`BAGGAGE_HEADERS`] present on an inbound request.
    pub fn inbound_baggage<E: HeaderExtractor>(headers: &E) -> HeaderBag {
        BAGGAGE_HEADERS
            .iter()
            .filter_map(|name| headers.get(name).map(|value| (*name, value.to_string())))
            .collect()
    }

    /// Starts a client span under `parent` and builds its outbound headers.
    ///
    /// The headers carry all three trace encodings plus the parent's baggage.
    pub fn start_client(&self, parent: &Span, method: &str, url: &Url) -> (Span, HeaderBag) {
        self.start_client_from(parent.context(), parent.baggage(), method, url)
    }

    /// Starts a client span under a bare parent context.
    pub fn start_client_from(
        &self,
        parent: &TraceContext,
        baggage: &HeaderBag,
        method: &str,
        url: &Url,
    ) -> (Span, HeaderBag) {
        let mut span = self.start_client_named(parent, baggage, "");
        let headers = self.describe_call(&mut span, method, url);
        (span, headers)
    }

    /// Starts a client span before its request is known.
    ///
    /// The span keeps `name` until [`describe_call`](Tracer::describe_call)
    /// names it after the request.
    pub fn start_client_named(&self, parent: &TraceContext, baggage: &HeaderBag, name: &str) -> Span {
        Span::start(SpanKind::Client, name, parent.child()).with_baggage(baggage.clone())
    }

    /// Names and tags a client span after its request and builds the
    /// outbound headers: the span's baggage plus all three trace encodings.
    pub fn describe_call(&self, span: &mut Span, method: &str, url: &Url) -> HeaderBag {
        let service = service_name(url);
        span.rename(format!("{} {} {}", method, service, url.path()));
        span.tag(tag_keys::HTTP_METHOD, method);
        span.tag(tag_keys::HTTP_URL, url.as_str());
        span.tag(tag_keys::PEER_SERVICE, service);

        let mut headers = span.baggage().clone();
        self.propagator.inject(span.context(), &mut headers);
        headers
    }

    /// Finishes `span` and reports it on its first finish.
    ///
    /// Collector errors are logged and dropped.
    pub fn finish(&self, span: &mut Span, outcome: SpanOutcome) {
        if let Some(finished) = span.finish(outcome) {
            if let Err(e) = self.collector.record(&finished) {
                tracing::debug!(error = %e, span = finished.name(), "span collector failed");
            }
        }
    }
}

/// Returns the first label of the URL host.
fn service_name(url: &Url) -> &str {
    url.host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .unwrap_or("unknown")
}
