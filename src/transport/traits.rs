//! Transport trait definitions and common types.
//!
//! A transport moves one HTTP exchange. It reports failures to reach the
//! downstream service as errors; any status the service answers with,
//! including 4xx and 5xx, is a successful exchange at this layer.

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::headers::HeaderBag;
use crate::{Error, Result};

// ============================================================================
// Requests
// ============================================================================

/// HTTP methods used for downstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    /// GET.
    #[default]
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
}

impl HttpMethod {
    /// Returns the upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(Error::invalid_argument(format!(
                "unsupported method: {}",
                other
            ))),
        }
    }
}

/// A downstream call descriptor.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::transport::{HttpMethod, HttpRequest};
/// use url::Url;
///
/// let url = Url::parse("http://orders/orders").unwrap();
/// let request = HttpRequest::new(HttpMethod::Post, url)
///     .with_header("Authorization", "Basic dXNlcjpwYXNz")
///     .with_json(serde_json::json!({"customer": "c1"}));
///
/// assert_eq!(request.headers.get("authorization"), Some("Basic dXNlcjpwYXNz"));
/// assert!(request.body.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The target URL.
    pub url: Url,
    /// Outbound headers. Trace headers are added before the call fires.
    pub headers: HeaderBag,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderBag::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A downstream response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// The status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderBag,
    /// The raw body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response with an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Creates a response with a JSON body.
    pub fn json_body(status: u16, body: &Value) -> Self {
        let mut headers = HeaderBag::new();
        headers.insert("content-type", "application/json");
        Self {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::invalid_response(format!("invalid JSON body (status {}): {}", self.status, e))
                .with_source(e)
        })
    }

    /// Returns the body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A streamed downstream response.
pub struct StreamResponse {
    /// The status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderBag,
    /// The body chunks.
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Core transport trait for downstream HTTP calls.
///
/// Implemented by [`RestTransport`](super::RestTransport) and
/// [`MockTransport`](super::MockTransport). Timeouts are enforced here and
/// surface as [`ErrorKind::Timeout`](crate::ErrorKind::Timeout).
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs a call and buffers the response body.
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Performs a call and returns the body as a stream.
    async fn stream(&self, request: HttpRequest) -> Result<StreamResponse>;
}

/// Request counters kept by a transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total requests sent.
    pub requests_sent: u64,
    /// Requests that never produced a response.
    pub requests_failed: u64,
    /// Streaming responses opened.
    pub streams_opened: u64,
}
