//! Waterfall and fan-out orchestration of downstream calls.
//!
//! An [`OrchestrationPlan`] is an ordered list of stages. A stage is a single
//! [`Step`] or a parallel group of steps. Each step names its call, an
//! optional transform of earlier outputs into its input, a response decoder
//! and a [`FailurePolicy`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::{json, Value};
//! use storefront_edge::HeaderBag;
//! use storefront_edge::fault::FaultInjector;
//! use storefront_edge::orchestrator::{OrchestrationPlan, Orchestrator, RunContext, Step};
//! use storefront_edge::tracing_support::{TraceContext, Tracer};
//! use storefront_edge::transport::{HttpMethod, HttpRequest, MockReply, MockTransport};
//! use url::Url;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = Arc::new(MockTransport::new());
//! transport.on(HttpMethod::Get, "http://catalogue/tags", MockReply::json(200, json!(["blue"])));
//!
//! let orchestrator = Orchestrator::new(transport, Tracer::default(), FaultInjector::disabled());
//! let plan = OrchestrationPlan::new("tags").then(Step::new("tags", |_: &Value| {
//!     Ok(HttpRequest::get(Url::parse("http://catalogue/tags")?))
//! }));
//!
//! let parent = TraceContext::new_root();
//! let headers = HeaderBag::new();
//! let ctx = RunContext { parent: &parent, baggage: &headers, path: "/tags", headers: &headers };
//!
//! let output = orchestrator.run(&ctx, &plan, Value::Null).await.unwrap();
//! assert_eq!(output, json!(["blue"]));
//! # }
//! ```

mod engine;
mod plan;

pub use engine::{Orchestrator, RunContext};
pub use plan::{
    decode_json, Decoder, FailurePolicy, OrchestrationPlan, PlanOutput, RequestBuilder, Stage,
    Step, StepInput, Transform,
};
