//! Trace header encodings understood by the gateway.
//!
//! Three wire encodings carry the same trace semantics:
//!
//! | Encoding   | Headers                                                        |
//! |------------|----------------------------------------------------------------|
//! | B3 multi   | `x-b3-traceid`, `x-b3-spanid`, `x-b3-parentspanid`, `x-b3-sampled` |
//! | B3 single  | `b3: {trace}-{span}[-{sampled}[-{parent}]]`                    |
//! | W3C        | `traceparent: 00-{trace32}-{span}-{flags}` + `tracestate`      |
//!
//! [`TraceEncoding`] is the closed set of these formats. Inbound extraction
//! tries them in [`TraceEncoding::ALL`] order and skips any that are absent
//! or malformed; outbound injection writes all of them at once.

use crate::tracing_support::context::{SpanId, TraceContext, TraceContextError, TraceId};

/// Read side of a header carrier. Keys are lower-case.
pub trait HeaderExtractor {
    /// Value of `key`, if present.
    fn get(&self, key: &str) -> Option<&str>;
}

/// Write side of a header carrier. Keys are lower-case.
pub trait HeaderInjector {
    /// Stores `value` under `key`, replacing any earlier value.
    fn set(&mut self, key: &str, value: String);
}

impl HeaderExtractor for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        self.get(key).map(|s| s.as_str())
    }
}

impl HeaderInjector for std::collections::HashMap<String, String> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}

/// Moves a [`TraceContext`] in and out of request headers.
pub trait Propagator {
    /// Reads the context this encoding carries.
    fn extract<E: HeaderExtractor>(&self, extractor: &E)
    -> Result<TraceContext, TraceContextError>;

    /// Writes `context` in this encoding.
    fn inject<I: HeaderInjector>(&self, context: &TraceContext, injector: &mut I);
}

/// W3C Trace Context propagator.
///
/// Implements the [W3C Trace Context](https://www.w3.org/TR/trace-context/)
/// encoding. The `tracestate` companion carries the current span ID under a
/// configurable vendor key; it is diagnostic only and ignored on extraction.
///
/// ## Example
///
/// ```rust
/// use std::collections::HashMap;
/// use storefront_edge::tracing_support::{Propagator, TraceContext, W3CTraceContext};
///
/// let propagator = W3CTraceContext::new("frontend");
///
/// let ctx = TraceContext::new_root();
/// let mut headers = HashMap::new();
/// propagator.inject(&ctx, &mut headers);
///
/// assert!(headers.contains_key("traceparent"));
/// assert_eq!(headers["tracestate"], format!("frontend={}", ctx.span_id()));
/// ```
#[derive(Debug, Clone)]
pub struct W3CTraceContext {
    vendor_key: String,
}

impl W3CTraceContext {
    /// W3C parent header.
    pub const TRACEPARENT: &'static str = "traceparent";
    /// W3C vendor state header.
    pub const TRACESTATE: &'static str = "tracestate";

    /// Creates a propagator writing `tracestate` under `vendor_key`.
    pub fn new(vendor_key: impl Into<String>) -> Self {
        Self {
            vendor_key: vendor_key.into(),
        }
    }

    /// Returns the tracestate vendor key.
    pub fn vendor_key(&self) -> &str {
        &self.vendor_key
    }
}

impl Default for W3CTraceContext {
    fn default() -> Self {
        Self::new("frontend")
    }
}

impl Propagator for W3CTraceContext {
    fn extract<E: HeaderExtractor>(
        &self,
        extractor: &E,
    ) -> Result<TraceContext, TraceContextError> {
        let traceparent = extractor
            .get(Self::TRACEPARENT)
            .ok_or(TraceContextError::InvalidFormat)?;

        TraceContext::from_traceparent(traceparent)
    }

    fn inject<I: HeaderInjector>(&self, context: &TraceContext, injector: &mut I) {
        injector.set(Self::TRACEPARENT, context.to_traceparent());
        injector.set(
            Self::TRACESTATE,
            format!("{}={}", self.vendor_key, context.span_id()),
        );
    }
}

/// Zipkin's [B3](https://github.com/openzipkin/b3-propagation) headers.
///
/// The storefront's Zipkin-instrumented services read either the compact
/// `b3` header or the older `x-b3-*` family; each propagator handles one.
///
/// ## Example
///
/// ```rust
/// use std::collections::HashMap;
/// use storefront_edge::tracing_support::{B3Propagator, Propagator, TraceContext};
///
/// let propagator = B3Propagator::single();
///
/// let ctx = TraceContext::new_root();
/// let mut headers = HashMap::new();
/// propagator.inject(&ctx, &mut headers);
///
/// assert!(headers.contains_key("b3"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct B3Propagator {
    style: B3Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum B3Style {
    Single,
    Multi,
}

impl B3Propagator {
    /// Compact single header.
    pub const B3: &'static str = "b3";
    /// Multi-header trace id.
    pub const X_B3_TRACE_ID: &'static str = "x-b3-traceid";
    /// Multi-header span id.
    pub const X_B3_SPAN_ID: &'static str = "x-b3-spanid";
    /// Multi-header sampling decision.
    pub const X_B3_SAMPLED: &'static str = "x-b3-sampled";
    /// Multi-header parent span id.
    pub const X_B3_PARENT_SPAN_ID: &'static str = "x-b3-parentspanid";
    /// `1` forces sampling.
    pub const X_B3_FLAGS: &'static str = "x-b3-flags";

    /// Reads and writes the `b3` header.
    pub fn single() -> Self {
        Self { style: B3Style::Single }
    }

    /// Reads and writes the `x-b3-*` headers.
    pub fn multi() -> Self {
        Self { style: B3Style::Multi }
    }

    /// Returns the sampling decision of a sampling-only `b3` header
    /// (`0`, `1` or `d`), if that is what the request carries.
    pub fn sampling_only<E: HeaderExtractor>(extractor: &E) -> Option<bool> {
        match extractor.get(Self::B3).map(str::trim) {
            Some("0") => Some(false),
            Some("1") | Some("d") => Some(true),
            _ => None,
        }
    }

    fn extract_multi<E: HeaderExtractor>(
        extractor: &E,
    ) -> Result<TraceContext, TraceContextError> {
        let trace_id = extractor
            .get(Self::X_B3_TRACE_ID)
            .ok_or(TraceContextError::InvalidFormat)?;
        let span_id = extractor
            .get(Self::X_B3_SPAN_ID)
            .ok_or(TraceContextError::InvalidFormat)?;

        let trace_id = TraceId::from_hex(trace_id.trim())?;
        let span_id = SpanId::from_hex(span_id.trim())?;

        let debug = extractor.get(Self::X_B3_FLAGS).map(str::trim) == Some("1");
        let sampled = match extractor.get(Self::X_B3_SAMPLED).map(str::trim) {
            None => true,
            Some(s) => parse_sampled(s).ok_or(TraceContextError::InvalidFlags)?,
        };

        let mut ctx = TraceContext::new(trace_id, span_id).with_sampled(sampled || debug);

        // A garbled optional parent is dropped rather than failing the encoding
        if let Some(parent) = extractor
            .get(Self::X_B3_PARENT_SPAN_ID)
            .and_then(|p| SpanId::from_hex(p.trim()).ok())
        {
            ctx = ctx.with_parent(parent);
        }

        Ok(ctx)
    }
}

impl Default for B3Propagator {
    fn default() -> Self {
        Self::single()
    }
}

impl Propagator for B3Propagator {
    fn extract<E: HeaderExtractor>(
        &self,
        extractor: &E,
    ) -> Result<TraceContext, TraceContextError> {
        match self.style {
            B3Style::Single => extractor
                .get(Self::B3)
                .ok_or(TraceContextError::InvalidFormat)
                .and_then(parse_b3_single),
            B3Style::Multi => Self::extract_multi(extractor),
        }
    }

    fn inject<I: HeaderInjector>(&self, context: &TraceContext, injector: &mut I) {
        let sampled = if context.is_sampled() { "1" } else { "0" };
        match self.style {
            B3Style::Single => {
                let value = match context.parent_span_id() {
                    Some(parent) => format!(
                        "{}-{}-{}-{}",
                        context.trace_id(),
                        context.span_id(),
                        sampled,
                        parent
                    ),
                    None => format!("{}-{}-{}", context.trace_id(), context.span_id(), sampled),
                };
                injector.set(Self::B3, value);
            }
            B3Style::Multi => {
                injector.set(Self::X_B3_TRACE_ID, context.trace_id().to_string());
                injector.set(Self::X_B3_SPAN_ID, context.span_id().to_string());
                injector.set(Self::X_B3_SAMPLED, sampled.to_string());
                if let Some(parent) = context.parent_span_id() {
                    injector.set(Self::X_B3_PARENT_SPAN_ID, parent.to_string());
                }
            }
        }
    }
}

fn parse_sampled(value: &str) -> Option<bool> {
    match value {
        "1" | "d" => Some(true),
        "0" => Some(false),
        s if s.eq_ignore_ascii_case("true") => Some(true),
        s if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// `{trace}-{span}[-{sampled}[-{parent}]]`. Sampling-only values carry no
/// ids and are left to [`B3Propagator::sampling_only`].
fn parse_b3_single(b3: &str) -> Result<TraceContext, TraceContextError> {
    let mut fields = b3.trim().split('-');
    let (Some(trace), Some(span)) = (fields.next(), fields.next()) else {
        return Err(TraceContextError::InvalidFormat);
    };
    let sampled = fields.next();
    let parent = fields.next();
    if fields.next().is_some() {
        return Err(TraceContextError::InvalidFormat);
    }

    let sampled = sampled
        .map(|s| parse_sampled(s).ok_or(TraceContextError::InvalidFlags))
        .transpose()?
        .unwrap_or(true);
    let ctx = TraceContext::new(TraceId::from_hex(trace)?, SpanId::from_hex(span)?)
        .with_sampled(sampled);

    // A garbled parent id costs only the parent.
    match parent.and_then(|p| SpanId::from_hex(p).ok()) {
        Some(parent) => Ok(ctx.with_parent(parent)),
        None => Ok(ctx),
    }
}

/// The closed set of supported trace header encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEncoding {
    /// One header per field (`x-b3-*`).
    B3Multi,
    /// The compact `b3` header.
    B3Single,
    /// `traceparent` plus the `tracestate` companion.
    W3C,
}

impl TraceEncoding {
    /// Every encoding, in inbound precedence order.
    pub const ALL: [TraceEncoding; 3] = [
        TraceEncoding::B3Multi,
        TraceEncoding::B3Single,
        TraceEncoding::W3C,
    ];

    /// Extracts a context using this encoding.
    pub fn extract<E: HeaderExtractor>(
        &self,
        extractor: &E,
        w3c: &W3CTraceContext,
    ) -> Result<TraceContext, TraceContextError> {
        match self {
            TraceEncoding::B3Multi => B3Propagator::multi().extract(extractor),
            TraceEncoding::B3Single => B3Propagator::single().extract(extractor),
            TraceEncoding::W3C => w3c.extract(extractor),
        }
    }

    /// Injects a context using this encoding.
    pub fn inject<I: HeaderInjector>(
        &self,
        context: &TraceContext,
        injector: &mut I,
        w3c: &W3CTraceContext,
    ) {
        match self {
            TraceEncoding::B3Multi => B3Propagator::multi().inject(context, injector),
            TraceEncoding::B3Single => B3Propagator::single().inject(context, injector),
            TraceEncoding::W3C => w3c.inject(context, injector),
        }
    }
}

impl std::fmt::Display for TraceEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEncoding::B3Multi => write!(f, "b3-multi"),
            TraceEncoding::B3Single => write!(f, "b3-single"),
            TraceEncoding::W3C => write!(f, "w3c"),
        }
    }
}

/// Propagator that reads any supported encoding and writes all of them.
///
/// ## Example
///
/// ```rust
/// use std::collections::HashMap;
/// use storefront_edge::tracing_support::{MultiFormatPropagator, Propagator, TraceContext};
///
/// let propagator = MultiFormatPropagator::default();
/// let ctx = TraceContext::new_root().child();
///
/// let mut headers = HashMap::new();
/// propagator.inject(&ctx, &mut headers);
///
/// assert!(headers.contains_key("x-b3-traceid"));
/// assert!(headers.contains_key("b3"));
/// assert!(headers.contains_key("traceparent"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MultiFormatPropagator {
    w3c: W3CTraceContext,
}

impl MultiFormatPropagator {
    /// Creates a propagator writing `tracestate` under `vendor_key`.
    pub fn new(vendor_key: impl Into<String>) -> Self {
        Self {
            w3c: W3CTraceContext::new(vendor_key),
        }
    }

    /// Extracts the first well-formed encoding, reporting which one matched.
    pub fn extract_with_encoding<E: HeaderExtractor>(
        &self,
        extractor: &E,
    ) -> Option<(TraceEncoding, TraceContext)> {
        TraceEncoding::ALL.iter().find_map(|encoding| {
            encoding
                .extract(extractor, &self.w3c)
                .ok()
                .map(|ctx| (*encoding, ctx))
        })
    }
}

impl Propagator for MultiFormatPropagator {
    fn extract<E: HeaderExtractor>(
        &self,
        extractor: &E,
    ) -> Result<TraceContext, TraceContextError> {
        self.extract_with_encoding(extractor)
            .map(|(_, ctx)| ctx)
            .ok_or(TraceContextError::InvalidFormat)
    }

    fn inject<I: HeaderInjector>(&self, context: &TraceContext, injector: &mut I) {
        for encoding in TraceEncoding::ALL {
            encoding.inject(context, injector, &self.w3c);
        }
    }
}
