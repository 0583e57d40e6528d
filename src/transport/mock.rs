//! Scripted in-memory transport.
//!
//! Replies are keyed by method and URL. Every request is recorded with the
//! headers the tracer attached, so tests can assert on outbound propagation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

use super::traits::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, StreamResponse, TransportStats,
};
use crate::error::ErrorKind;
use crate::{Error, Result};

/// What a mocked route produces.
#[derive(Debug, Clone)]
enum MockOutcome {
    Respond(HttpResponse),
    Fail(ErrorKind, String),
}

/// A scripted reply for one route.
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: MockOutcome,
    delay: Duration,
}

impl MockReply {
    /// Replies with `status` and a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            outcome: MockOutcome::Respond(HttpResponse::json_body(status, &body)),
            delay: Duration::ZERO,
        }
    }

    /// Replies with `status` and an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            outcome: MockOutcome::Respond(HttpResponse::new(status)),
            delay: Duration::ZERO,
        }
    }

    /// Replies with `status` and a raw body.
    pub fn raw(status: u16, body: impl Into<Bytes>) -> Self {
        let mut response = HttpResponse::new(status);
        response.body = body.into();
        Self {
            outcome: MockOutcome::Respond(response),
            delay: Duration::ZERO,
        }
    }

    /// Fails the call without a response.
    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            outcome: MockOutcome::Fail(kind, message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Settles the call only after `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Mock transport for testing.
///
/// Routes are keyed by method and full URL. Every request is recorded with
/// its headers; unmatched requests fail as connection errors.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::transport::{HttpMethod, HttpRequest, HttpTransport, MockReply, MockTransport};
/// use url::Url;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = MockTransport::new();
/// transport.on(HttpMethod::Get, "http://carts/carts/1", MockReply::json(200, serde_json::json!([])));
///
/// let url = Url::parse("http://carts/carts/1").unwrap();
/// let response = transport.call(HttpRequest::get(url)).await.unwrap();
/// assert_eq!(response.status, 200);
/// assert_eq!(transport.request_count(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Scripted replies.
    routes: RwLock<HashMap<(HttpMethod, String), MockReply>>,
    /// Every request received, in arrival order.
    requests: RwLock<Vec<HttpRequest>>,
    /// URLs of calls that settled, in settle order.
    completed: RwLock<Vec<String>>,
    /// Request counter.
    request_count: AtomicU64,
    /// Failed request counter.
    failed_count: AtomicU64,
    /// Streams opened.
    stream_count: AtomicU64,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the reply for `method` on `url`, replacing any earlier one.
    pub fn on(&self, method: HttpMethod, url: &str, reply: MockReply) {
        self.routes.write().insert((method, normalize(url)), reply);
    }

    /// Returns every recorded request.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.read().clone()
    }

    /// Returns the recorded requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.requests
            .read()
            .iter()
            .filter(|r| r.url.as_str().starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the URLs of settled calls, in settle order.
    pub fn completed(&self) -> Vec<String> {
        self.completed.read().clone()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Returns request counters.
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            requests_sent: self.request_count.load(Ordering::Relaxed),
            requests_failed: self.failed_count.load(Ordering::Relaxed),
            streams_opened: self.stream_count.load(Ordering::Relaxed),
        }
    }

    /// Forgets recorded requests. Routes are kept.
    pub fn clear_requests(&self) {
        self.requests.write().clear();
        self.completed.write().clear();
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let key = (request.method, request.url.as_str().to_string());
        self.requests.write().push(request);

        let reply = self.routes.read().get(&key).cloned();
        let Some(reply) = reply else {
            self.failed_count.fetch_add(1, Ordering::Relaxed);
            return Err(Error::connection(format!(
                "no mock route for {} {}",
                key.0, key.1
            )));
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        self.completed.write().push(key.1);

        match reply.outcome {
            MockOutcome::Respond(response) => Ok(response),
            MockOutcome::Fail(kind, message) => {
                self.failed_count.fetch_add(1, Ordering::Relaxed);
                Err(Error::new(kind, message))
            }
        }
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.exchange(request).await
    }

    async fn stream(&self, request: HttpRequest) -> Result<StreamResponse> {
        let response = self.exchange(request).await?;
        self.stream_count.fetch_add(1, Ordering::Relaxed);
        let body = response.body;
        Ok(StreamResponse {
            status: response.status,
            headers: response.headers,
            body: Box::pin(futures::stream::once(async move { Ok(body) })),
        })
    }
}
