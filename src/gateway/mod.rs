//! The gateway surface handed to the routing layer.
//!
//! A request goes through four calls:
//! - [`Gateway::handle_inbound`]: extract trace context, start and attach
//!   the server span
//! - [`Gateway::run`]: run a plan with the server span as parent
//! - [`Gateway::complete`]: finish the server span with the final outcome
//! - [`Gateway::dispatch`]: all of the above for one [`Route`], mapping
//!   errors to a client-facing [`GatewayResponse`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use storefront_edge::gateway::{Gateway, InboundRequest, RequestAccessor};
//! use storefront_edge::storefront;
//! use storefront_edge::transport::{HttpMethod, MockReply, MockTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = Arc::new(MockTransport::new());
//! transport.on(
//!     HttpMethod::Delete,
//!     "http://carts/carts/c1/items/sock-1",
//!     MockReply::status(202),
//! );
//!
//! let gateway = Gateway::builder().transport(transport).build().unwrap();
//! let route = storefront::delete_cart_item(gateway.endpoints(), "c1", "sock-1").unwrap();
//!
//! let mut request = InboundRequest::new("DELETE", "/cart/sock-1");
//! let response = gateway.dispatch(&mut request, &route, json!(null)).await;
//!
//! assert_eq!(response.status, 202);
//! assert!(request.server_span().unwrap().is_finished());
//! # }
//! ```

mod builder;
mod request;
mod route;

pub use builder::GatewayBuilder;
pub use request::{GatewayResponse, InboundRequest, RequestAccessor};
pub use route::{Responder, Route};

use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;
use url::Url;

use crate::config::{Endpoints, GatewayConfig};
use crate::fault::FaultInjector;
use crate::headers::HeaderBag;
use crate::orchestrator::{OrchestrationPlan, Orchestrator, RunContext};
use crate::tracing_support::{tag_keys, SpanOutcome, TraceContext, Tracer};
use crate::transport::{HttpRequest, HttpTransport, StreamResponse};
use crate::Result;

/// The edge gateway.
///
/// `Gateway` is `Clone` and cheap to share across tasks.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: GatewayConfig,
    transport: Arc<dyn HttpTransport>,
    orchestrator: Orchestrator,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("service_name", &self.inner.config.service_name)
            .field("orchestrator", &self.inner.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Creates a gateway with every collaborator derived from `config`.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Returns the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Returns the downstream locations.
    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.config.endpoints
    }

    /// Returns the tracer.
    pub fn tracer(&self) -> &Tracer {
        self.inner.orchestrator.tracer()
    }

    /// Returns the fault injector.
    pub fn faults(&self) -> &FaultInjector {
        self.inner.orchestrator.faults()
    }

    // ========================================================================
    // Request lifecycle
    // ========================================================================

    /// Extracts the inbound context, starts the server span and attaches it
    /// to the request.
    pub fn handle_inbound<R: RequestAccessor + ?Sized>(&self, req: &mut R) -> TraceContext {
        let span = self
            .tracer()
            .handle_inbound(req.headers(), req.method(), req.path());
        let context = span.context().clone();
        req.attach_span(span);
        context
    }

    /// Runs `plan` under the request's server span.
    pub async fn run<R: RequestAccessor + ?Sized>(
        &self,
        req: &R,
        plan: &OrchestrationPlan,
        input: Value,
    ) -> Result<Value> {
        let (parent, baggage) = self.parent_of(req);
        let ctx = RunContext {
            parent: &parent,
            baggage: &baggage,
            path: req.path(),
            headers: req.headers(),
        };
        self.inner.orchestrator.run(&ctx, plan, input).await
    }

    /// Finishes the request's server span. Later calls are no-ops.
    pub fn complete<R: RequestAccessor + ?Sized>(&self, req: &mut R, outcome: SpanOutcome) {
        match req.server_span_mut() {
            Some(span) => self.tracer().finish(span, outcome),
            None => tracing::debug!(path = req.path(), "no server span to finish"),
        }
    }

    /// Handles one request end to end.
    ///
    /// A server span already attached by [`handle_inbound`](Gateway::handle_inbound)
    /// is reused; otherwise one is started here.
    ///
    /// Errors never escape: they become a response carrying the error's
    /// status, or the route's fixed error status, and a `{"error": message}`
    /// body.
    pub async fn dispatch<R: RequestAccessor + ?Sized>(
        &self,
        req: &mut R,
        route: &Route,
        input: Value,
    ) -> GatewayResponse {
        let trace = match req.server_span() {
            Some(span) => span.context().clone(),
            None => self.handle_inbound(req),
        };
        let span = tracing::info_span!(
            "inbound",
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
            method = req.method(),
            path = req.path(),
        );

        let result = self.execute(req, route, input).instrument(span.clone()).await;

        let _entered = span.enter();
        match result {
            Ok(response) => {
                tracing::info!(status = response.status, "request completed");
                self.complete(req, SpanOutcome::Status(response.status));
                response
            }
            Err(err) => {
                tracing::warn!(
                    upstream_status = err.upstream_status(),
                    step = err.step(),
                    error = %err,
                    "request failed"
                );
                let response = route.error_response(&err);
                if let Some(span) = req.server_span_mut() {
                    span.tag(tag_keys::HTTP_STATUS_CODE, response.status);
                }
                self.complete(req, SpanOutcome::from(&err));
                response
            }
        }
    }

    /// Proxies a streaming `GET` under a traced client span.
    ///
    /// The span is finished once the response head is available.
    pub async fn stream_through<R: RequestAccessor + ?Sized>(
        &self,
        req: &R,
        url: Url,
    ) -> Result<StreamResponse> {
        let (parent, baggage) = self.parent_of(req);
        let (mut span, headers) = self
            .tracer()
            .start_client_from(&parent, &baggage, "GET", &url);
        span.tag(tag_keys::STEP, "stream");

        let mut request = HttpRequest::get(url);
        request.headers = headers;
        let result = self.inner.transport.stream(request).await;

        let outcome = match &result {
            Ok(response) => SpanOutcome::Status(response.status),
            Err(err) => SpanOutcome::from(err),
        };
        self.tracer().finish(&mut span, outcome);
        result
    }

    async fn execute<R: RequestAccessor + ?Sized>(
        &self,
        req: &R,
        route: &Route,
        input: Value,
    ) -> Result<GatewayResponse> {
        let (parent, baggage) = self.parent_of(req);
        let ctx = RunContext {
            parent: &parent,
            baggage: &baggage,
            path: req.path(),
            headers: req.headers(),
        };
        let done = self.inner.orchestrator.execute(&ctx, route.plan(), input).await?;
        route.respond(done)
    }

    /// The parent context and baggage for outbound calls.
    ///
    /// Falls back to the inbound headers when no server span is attached.
    fn parent_of<R: RequestAccessor + ?Sized>(&self, req: &R) -> (TraceContext, HeaderBag) {
        match req.server_span() {
            Some(span) => (span.context().clone(), span.baggage().clone()),
            None => {
                tracing::debug!(path = req.path(), "no server span attached, using inbound headers");
                (
                    self.tracer().extract_inbound(req.headers()),
                    Tracer::inbound_baggage(req.headers()),
                )
            }
        }
    }
}
