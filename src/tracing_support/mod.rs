//! Distributed tracing for inbound requests and their downstream calls.
//!
//! ## Overview
//!
//! - [`TraceContext`]: immutable identifiers of one span in a call tree
//! - [`Span`]: a unit of work with tags, events and an idempotent finish
//! - [`MultiFormatPropagator`]: reads B3 multi, B3 single or W3C headers and
//!   writes all three
//! - [`Tracer`]: starts server and client spans and reports finished spans
//!   to a [`SpanCollector`]
//!
//! ## Example
//!
//! ```rust
//! use storefront_edge::HeaderBag;
//! use storefront_edge::tracing_support::{SpanOutcome, Tracer};
//! use url::Url;
//!
//! let tracer = Tracer::default();
//!
//! let mut inbound = HeaderBag::new();
//! inbound.insert("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
//!
//! let mut server = tracer.handle_inbound(&inbound, "GET", "/orders");
//! let url = Url::parse("http://orders/orders").unwrap();
//! let (mut client, outbound) = tracer.start_client(&server, "GET", &url);
//!
//! assert_eq!(client.context().trace_id(), server.context().trace_id());
//! assert_eq!(outbound.get("x-b3-parentspanid"), Some("00f067aa0ba902b7"));
//!
//! tracer.finish(&mut client, SpanOutcome::Status(200));
//! tracer.finish(&mut server, SpanOutcome::Status(200));
//! ```

mod collector;
mod context;
mod propagator;
mod span;
mod tracer;

#[cfg(feature = "rest")]
pub use collector::ZipkinCollector;
pub use collector::{InMemoryCollector, LoggingCollector, NoopCollector, SpanCollector};
pub use context::{SpanId, TraceContext, TraceContextError, TraceId};
pub use propagator::{
    B3Propagator, HeaderExtractor, HeaderInjector, MultiFormatPropagator, Propagator,
    TraceEncoding, W3CTraceContext,
};
pub use span::{tag_keys, FinishedSpan, Span, SpanEvent, SpanKind, SpanOutcome, SpanValue};
pub use tracer::{Tracer, BAGGAGE_HEADERS, COMPONENT};
