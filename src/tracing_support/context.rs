//! Span identity carried across service boundaries.
//!
//! A [`TraceContext`] names one span inside one trace. Inbound requests
//! produce a context through a [`Propagator`](super::Propagator); every
//! outbound call derives a fresh one with [`TraceContext::child`].

use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// The only traceparent version understood here.
const TRACEPARENT_VERSION: &str = "00";

/// Identifiers for one span within one call tree.
///
/// Contexts are immutable values. Moving downstream never edits a context in
/// place; it derives a child that keeps the trace id and the sampling
/// decision.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::tracing_support::TraceContext;
///
/// let server = TraceContext::new_root();
/// let outbound = server.child();
///
/// assert_eq!(outbound.trace_id(), server.trace_id());
/// assert_eq!(outbound.parent_span_id(), Some(server.span_id()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    sampled: bool,
}

impl TraceContext {
    /// Starts a new sampled trace with random 128-bit trace id.
    pub fn new_root() -> Self {
        Self::new(TraceId::random(), SpanId::random())
    }

    /// Builds a sampled context without a parent.
    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self { trace_id, span_id, parent_span_id: None, sampled: true }
    }

    /// Derives the context for a call made on behalf of this span.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: SpanId::random(),
            parent_span_id: Some(self.span_id.clone()),
            sampled: self.sampled,
        }
    }

    /// Parses a `traceparent` value of the form
    /// `version-traceid-spanid-flags`.
    ///
    /// Only version `00` is accepted and the trace id must be the full
    /// 32 hex characters.
    ///
    /// ```rust
    /// use storefront_edge::tracing_support::TraceContext;
    ///
    /// let ctx = TraceContext::from_traceparent(
    ///     "00-463ac35c9f6413ad48485a3953bb6124-a2fb4a1d1a96d312-00",
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(ctx.span_id().to_string(), "a2fb4a1d1a96d312");
    /// assert!(!ctx.is_sampled());
    /// ```
    pub fn from_traceparent(value: &str) -> Result<Self, TraceContextError> {
        let mut fields = value.trim().split('-');
        let (Some(version), Some(trace), Some(span), Some(flags), None) =
            (fields.next(), fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(TraceContextError::InvalidFormat);
        };

        if version != TRACEPARENT_VERSION {
            return Err(TraceContextError::UnsupportedVersion);
        }
        if trace.len() != 32 {
            return Err(TraceContextError::InvalidTraceId);
        }
        let [flags] = decode::<1>(flags).map_err(|_| TraceContextError::InvalidFlags)?;

        let ctx = Self::new(TraceId::from_hex(trace)?, SpanId::from_hex(span)?);
        Ok(ctx.with_sampled(flags & 0x01 == 0x01))
    }

    /// Renders the context as a `traceparent` value.
    ///
    /// A 64-bit trace id is left-padded with zeros to 32 characters.
    ///
    /// ```rust
    /// use storefront_edge::tracing_support::{SpanId, TraceContext, TraceId};
    ///
    /// let ctx = TraceContext::new(
    ///     TraceId::from_hex("48485a3953bb6124").unwrap(),
    ///     SpanId::from_hex("a2fb4a1d1a96d312").unwrap(),
    /// );
    /// assert_eq!(
    ///     ctx.to_traceparent(),
    ///     "00-000000000000000048485a3953bb6124-a2fb4a1d1a96d312-01"
    /// );
    /// ```
    pub fn to_traceparent(&self) -> String {
        format!(
            "{}-{}-{}-{:02x}",
            TRACEPARENT_VERSION,
            self.trace_id.to_w3c_hex(),
            self.span_id,
            u8::from(self.sampled)
        )
    }

    /// Identifier shared by every span of the trace.
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// This span's identifier.
    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    /// The span that caused this one, if any.
    pub fn parent_span_id(&self) -> Option<&SpanId> {
        self.parent_span_id.as_ref()
    }

    /// Whether spans in this trace should be reported.
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Records the span this context was started from.
    #[must_use]
    pub fn with_parent(mut self, parent: SpanId) -> Self {
        self.parent_span_id = Some(parent);
        self
    }

    /// Overrides the sampling decision.
    #[must_use]
    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.sampled = sampled;
        self
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new_root()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

/// Random bytes, redrawn until at least one is non-zero.
fn random_nonzero<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    while bytes.iter().all(|b| *b == 0) {
        if getrandom::getrandom(&mut bytes).is_err() {
            fastrand::fill(&mut bytes);
        }
    }
    bytes
}

/// Decodes exactly `2 * N` hex characters.
fn decode<const N: usize>(text: &str) -> Result<[u8; N], hex::FromHexError> {
    let mut bytes = [0u8; N];
    hex::decode_to_slice(text, &mut bytes)?;
    Ok(bytes)
}

/// A 64- or 128-bit trace identifier.
///
/// Zipkin tracers still emit 16-character ids, so a narrow id keeps that
/// width in B3 headers and is zero-padded only for `traceparent`. Equality
/// and hashing use the numeric value.
#[derive(Clone)]
pub struct TraceId {
    bytes: [u8; 16],
    wide: bool,
}

impl TraceId {
    /// A random 128-bit id.
    pub fn random() -> Self {
        Self::from_bytes(random_nonzero())
    }

    /// Wraps 16 bytes as a 128-bit id.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes, wide: true }
    }

    /// Parses 16 or 32 hex characters. The all-zero id is rejected.
    pub fn from_hex(text: &str) -> Result<Self, TraceContextError> {
        let invalid = |_: hex::FromHexError| TraceContextError::InvalidTraceId;
        let id = match text.len() {
            32 => Self { bytes: decode(text).map_err(invalid)?, wide: true },
            16 => {
                let low: [u8; 8] = decode(text).map_err(invalid)?;
                let mut bytes = [0u8; 16];
                bytes[8..].copy_from_slice(&low);
                Self { bytes, wide: false }
            }
            _ => return Err(TraceContextError::InvalidTraceId),
        };
        if id.bytes.iter().all(|b| *b == 0) {
            return Err(TraceContextError::InvalidTraceId);
        }
        Ok(id)
    }

    /// Big-endian bytes; a 64-bit id sits in the low half.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Whether the id was created or parsed as 128 bits.
    pub fn is_wide(&self) -> bool {
        self.wide
    }

    /// Always 32 characters.
    pub fn to_w3c_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl PartialEq for TraceId {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for TraceId {}

impl Hash for TraceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.wide { &self.bytes[..] } else { &self.bytes[8..] };
        f.write_str(&hex::encode(shown))
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TraceId").field(&format_args!("{self}")).finish()
    }
}

/// A 64-bit span identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SpanId([u8; 8]);

impl SpanId {
    /// A random non-zero id.
    pub fn random() -> Self {
        Self(random_nonzero())
    }

    /// Wraps 8 big-endian bytes.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Parses exactly 16 hex characters. The all-zero id is rejected.
    pub fn from_hex(text: &str) -> Result<Self, TraceContextError> {
        match decode::<8>(text) {
            Ok(bytes) if bytes.iter().any(|b| *b != 0) => Ok(Self(bytes)),
            _ => Err(TraceContextError::InvalidSpanId),
        }
    }

    /// Big-endian bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SpanId").field(&format_args!("{self}")).finish()
    }
}

/// Why an inbound trace header could not be used.
///
/// These never reach a caller of the gateway: an unusable header simply
/// starts a new trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TraceContextError {
    /// Header absent or not shaped as expected.
    #[error("trace header is missing or malformed")]
    InvalidFormat,
    /// A traceparent version other than `00`.
    #[error("unsupported traceparent version")]
    UnsupportedVersion,
    /// Trace id of the wrong width, not hex, or zero.
    #[error("invalid trace id")]
    InvalidTraceId,
    /// Span id of the wrong width, not hex, or zero.
    #[error("invalid span id")]
    InvalidSpanId,
    /// Flags or sampling field not understood.
    #[error("invalid sampling flags")]
    InvalidFlags,
}
