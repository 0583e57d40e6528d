//! REST transport implementation using reqwest.
//!
//! Each call is a single attempt: there are no retries at this layer, and
//! a non-2xx status is returned to the caller as an ordinary response.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::RwLock;

use crate::headers::HeaderBag;
use crate::transport::traits::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, StreamResponse, TransportStats,
};
use crate::{Error, Result};

/// User agent sent on every downstream call.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// REST Transport
// ============================================================================

/// REST transport using reqwest.
#[derive(Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    stats: Arc<RwLock<TransportStats>>,
}

impl std::fmt::Debug for RestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestTransport")
            .field("stats", &*self.stats.read())
            .finish_non_exhaustive()
    }
}

impl RestTransport {
    /// Creates a new REST transport builder.
    pub fn builder() -> RestTransportBuilder {
        RestTransportBuilder::new()
    }

    /// Creates a REST transport with default settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Returns a snapshot of the request counters.
    pub fn stats(&self) -> TransportStats {
        *self.stats.read()
    }

    async fn send(&self, request: HttpRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.clone());

        builder = builder.headers(request.headers.as_header_map().clone());
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let result = builder.send().await;

        let mut stats = self.stats.write();
        stats.requests_sent += 1;
        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                stats.requests_failed += 1;
                drop(stats);
                tracing::debug!(method = %request.method, url = %request.url, error = %e, "downstream call failed");
                Err(map_reqwest_error(e))
            }
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for RestTransport {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers = to_header_bag(response.headers());
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn stream(&self, request: HttpRequest) -> Result<StreamResponse> {
        let response = self.send(request).await?;
        self.stats.write().streams_opened += 1;

        let status = response.status().as_u16();
        let headers = to_header_bag(response.headers());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error));

        Ok(StreamResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`RestTransport`].
#[derive(Debug, Clone)]
pub struct RestTransportBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    max_idle_per_host: usize,
    idle_timeout: Duration,
}

impl RestTransportBuilder {
    fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_idle_per_host: 16,
            idle_timeout: Duration::from_secs(90),
        }
    }

    /// Sets the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum idle connections kept per host.
    pub fn max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Sets how long idle connections are kept.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Builds the REST transport.
    pub fn build(self) -> Result<RestTransport> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .pool_idle_timeout(self.idle_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::configuration(format!("cannot build HTTP client: {e}")).with_source(e))?;

        Ok(RestTransport {
            client,
            stats: Arc::new(RwLock::new(TransportStats::default())),
        })
    }
}

impl Default for RestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn to_header_bag(headers: &reqwest::header::HeaderMap) -> HeaderBag {
    HeaderBag::from(headers.clone())
}

/// A failed exchange never carries a status; the gateway picks 502 or 504.
fn map_reqwest_error(e: reqwest::Error) -> Error {
    let message = e.to_string();
    let err = if e.is_timeout() {
        Error::timeout(message)
    } else if e.is_connect() {
        Error::connection(message)
    } else if e.is_builder() {
        Error::invalid_argument(message)
    } else {
        Error::transport(message)
    };
    err.with_source(e)
}
