//! # Storefront Edge
//!
//! Edge gateway for a microservice storefront. Every inbound request is
//! traced, its downstream calls are orchestrated as a plan of sequential and
//! parallel steps, and configured faults can be injected into named steps.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use storefront_edge::prelude::*;
//! use storefront_edge::transport::{HttpMethod, MockReply, MockTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> storefront_edge::Result<()> {
//! let transport = Arc::new(MockTransport::new());
//! transport.on(HttpMethod::Get, "http://catalogue/tags", MockReply::json(200, serde_json::json!({"tags": []})));
//!
//! let gateway = Gateway::builder().transport(transport).build()?;
//! let route = storefront_edge::storefront::tags(gateway.endpoints())?;
//!
//! let mut request = InboundRequest::new("GET", "/tags")
//!     .with_header("x-b3-traceid", "463ac35c9f6413ad48485a3953bb6124")
//!     .with_header("x-b3-spanid", "a2fb4a1d1a96d312");
//! let response = gateway.dispatch(&mut request, &route, serde_json::Value::Null).await;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! - **Trace continuity**: the inbound trace (B3 multi-header, B3 single-header
//!   or W3C `traceparent`) is continued by every downstream call.
//! - **Plans**: an [`OrchestrationPlan`](orchestrator::OrchestrationPlan) runs
//!   stages in order; a parallel stage joins every branch before moving on.
//! - **Failure policies**: a failing step either aborts the plan or degrades
//!   to a fallback value.
//! - **Faults**: delays, crashes and synthetic errors attached to step names,
//!   drawn once per call.
//!
//! ## Features
//!
//! - `rest` (default): HTTP transport and Zipkin reporting via reqwest
//! - `rustls` (default): Use rustls for TLS
//! - `native-tls`: Use native TLS

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod fault;
pub mod gateway;
pub mod headers;
pub mod logging;
pub mod orchestrator;
pub mod storefront;
pub mod tracing_support;
pub mod transport;

// Prelude for convenient imports
pub mod prelude;

pub use error::{Error, ErrorCategory, ErrorKind, Result};
pub use gateway::{Gateway, GatewayBuilder, GatewayResponse, InboundRequest, Route};
pub use headers::HeaderBag;

pub use config::{Endpoints, FaultConfig, GatewayConfig};
pub use fault::FaultInjector;
pub use orchestrator::{FailurePolicy, OrchestrationPlan, Orchestrator, Step};
pub use tracing_support::{Span, TraceContext, Tracer};
