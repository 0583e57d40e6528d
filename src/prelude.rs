//! Prelude module for convenient imports.
//!
//! ```rust
//! use storefront_edge::prelude::*;
//! ```
//!
//! This provides access to:
//! - The gateway and its request/response types
//! - Plans, steps and failure policies
//! - Configuration
//! - Error types

pub use crate::{
    config::{Endpoints, FaultConfig, GatewayConfig},
    error::{Error, ErrorKind, Result},
    fault::{FaultInjector, FaultRule},
    gateway::{Gateway, GatewayResponse, InboundRequest, RequestAccessor, Route},
    headers::HeaderBag,
    orchestrator::{FailurePolicy, OrchestrationPlan, PlanOutput, Step, StepInput},
    tracing_support::{SpanOutcome, TraceContext, Tracer},
    transport::{HttpRequest, HttpResponse, HttpTransport},
};
