//! Routes: a plan plus the mapping of its output to a response.

use std::sync::Arc;

use crate::gateway::request::GatewayResponse;
use crate::orchestrator::{OrchestrationPlan, PlanOutput};
use crate::{Error, Result};

/// Maps a finished plan to the inbound response.
pub type Responder = Arc<dyn Fn(PlanOutput) -> Result<GatewayResponse> + Send + Sync>;

/// One routable operation.
///
/// ## Example
///
/// ```rust
/// use serde_json::Value;
/// use storefront_edge::Error;
/// use storefront_edge::gateway::Route;
/// use storefront_edge::orchestrator::{OrchestrationPlan, Step};
/// use storefront_edge::transport::HttpRequest;
/// use url::Url;
///
/// let plan = OrchestrationPlan::new("login").then(Step::new("login", |_: &Value| {
///     Ok(HttpRequest::get(Url::parse("http://user/login")?))
/// }));
/// let route = Route::with_status(plan, 200).failing_with(401);
///
/// let response = route.error_response(&Error::timeout("deadline exceeded"));
/// assert_eq!(response.status, 401);
/// ```
#[derive(Clone)]
pub struct Route {
    plan: OrchestrationPlan,
    respond: Responder,
    error_status: Option<u16>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("plan", &self.plan.name())
            .field("error_status", &self.error_status)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// Creates a route.
    pub fn new<F>(plan: OrchestrationPlan, respond: F) -> Self
    where
        F: Fn(PlanOutput) -> Result<GatewayResponse> + Send + Sync + 'static,
    {
        Self {
            plan,
            respond: Arc::new(respond),
            error_status: None,
        }
    }

    /// Creates a route answering with `status` and the last stage's output.
    pub fn with_status(plan: OrchestrationPlan, status: u16) -> Self {
        Self::new(plan, move |done| Ok(GatewayResponse::new(status, done.output)))
    }

    /// Reports every failure of this route with `status`.
    #[must_use]
    pub fn failing_with(mut self, status: u16) -> Self {
        self.error_status = Some(status);
        self
    }

    /// Returns the plan.
    pub fn plan(&self) -> &OrchestrationPlan {
        &self.plan
    }

    /// Maps the finished plan to a response.
    pub fn respond(&self, done: PlanOutput) -> Result<GatewayResponse> {
        (self.respond)(done)
    }

    /// Maps a failure to a response.
    pub fn error_response(&self, err: &Error) -> GatewayResponse {
        let mut response = GatewayResponse::from_error(err);
        if let Some(status) = self.error_status {
            response.status = status;
        }
        response
    }
}
