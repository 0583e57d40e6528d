//! Inbound request view and gateway responses.

use serde_json::{json, Value};

use crate::headers::HeaderBag;
use crate::tracing_support::Span;
use crate::Error;

/// Read-only view of an inbound request plus a slot for its server span.
///
/// The routing layer implements this for its own request type. The span
/// slot lives as long as the request so steps can find their parent.
pub trait RequestAccessor {
    /// The HTTP method.
    fn method(&self) -> &str;

    /// The request path, including any query string.
    fn path(&self) -> &str;

    /// Inbound headers.
    fn headers(&self) -> &HeaderBag;

    /// The attached server span, if any.
    fn server_span(&self) -> Option<&Span>;

    /// Mutable access to the attached server span.
    fn server_span_mut(&mut self) -> Option<&mut Span>;

    /// Attaches the server span, replacing any earlier one.
    fn attach_span(&mut self, span: Span);
}

/// A plain inbound request.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::gateway::{InboundRequest, RequestAccessor};
///
/// let request = InboundRequest::new("DELETE", "/cart/sock-1")
///     .with_header("X-Fault", "FE-ERR-01");
///
/// assert_eq!(request.headers().get("x-fault"), Some("FE-ERR-01"));
/// assert!(request.server_span().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: String,
    path: String,
    headers: HeaderBag,
    span: Option<Span>,
}

impl InboundRequest {
    /// Creates a request without headers.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HeaderBag::new(),
            span: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderBag) -> Self {
        self.headers = headers;
        self
    }

    /// Detaches and returns the server span.
    pub fn take_span(&mut self) -> Option<Span> {
        self.span.take()
    }
}

impl RequestAccessor for InboundRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn headers(&self) -> &HeaderBag {
        &self.headers
    }

    fn server_span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    fn server_span_mut(&mut self) -> Option<&mut Span> {
        self.span.as_mut()
    }

    fn attach_span(&mut self, span: Span) {
        self.span = Some(span);
    }
}

/// Status and JSON body returned to the inbound caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    /// HTTP status.
    pub status: u16,
    /// JSON body. `Null` means no body.
    pub body: Value,
}

impl GatewayResponse {
    /// Creates a response with a body.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Creates a response without a body.
    pub fn status(status: u16) -> Self {
        Self::new(status, Value::Null)
    }

    /// Maps an error to its client-facing response.
    ///
    /// The body carries the message, plus the machine code when present.
    pub fn from_error(err: &Error) -> Self {
        let mut body = json!({ "error": err.message() });
        if let Some(code) = err.code() {
            body["code"] = Value::from(code);
        }
        Self::new(err.status(), body)
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
