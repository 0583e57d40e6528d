//! Declarative orchestration plans.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::transport::{HttpRequest, HttpResponse};
use crate::{Error, Result};

/// Builds a step's outbound call from its input.
pub type RequestBuilder = Arc<dyn Fn(&Value) -> Result<HttpRequest> + Send + Sync>;

/// Derives a step's input from what earlier stages produced.
pub type Transform = Arc<dyn Fn(&StepInput<'_>) -> Result<Value> + Send + Sync>;

/// Turns a downstream response into the step's output.
pub type Decoder = Arc<dyn Fn(&HttpResponse) -> Result<Value> + Send + Sync>;

/// What a step does when its call fails.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FailurePolicy {
    /// Fail the plan. Later stages never run.
    #[default]
    Abort,
    /// Substitute the value and continue.
    DegradeToValue(Value),
}

/// Everything a transform may read.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    /// Output of the previous stage, or the initial input for the first.
    pub previous: &'a Value,
    /// Input the plan was started with.
    pub initial: &'a Value,
    /// Resolved outputs of every step that already ran, by name.
    pub outputs: &'a Map<String, Value>,
}

impl StepInput<'_> {
    /// Returns the resolved output of an earlier step.
    pub fn output(&self, step: &str) -> Option<&Value> {
        self.outputs.get(step)
    }
}

/// Everything a finished plan produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanOutput {
    /// Output of the last stage.
    pub output: Value,
    /// Resolved output of every step, by name.
    pub steps: Map<String, Value>,
}

impl PlanOutput {
    /// Returns the resolved output of one step.
    pub fn step(&self, name: &str) -> Option<&Value> {
        self.steps.get(name)
    }
}

/// One downstream call in a plan.
///
/// ## Example
///
/// ```rust
/// use serde_json::{json, Value};
/// use storefront_edge::orchestrator::{FailurePolicy, Step};
/// use storefront_edge::transport::HttpRequest;
/// use url::Url;
///
/// let step = Step::new("fetch-card", |input: &Value| {
///     let href = input["href"].as_str().unwrap_or_default();
///     Ok(HttpRequest::get(Url::parse(href)?))
/// })
/// .degrade_to(Value::Null);
///
/// assert_eq!(step.name(), "fetch-card");
/// assert_eq!(step.policy(), &FailurePolicy::DegradeToValue(Value::Null));
/// ```
#[derive(Clone)]
pub struct Step {
    name: String,
    request: RequestBuilder,
    transform: Option<Transform>,
    decoder: Decoder,
    policy: FailurePolicy,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("transform", &self.transform.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Step {
    /// Creates an aborting step with the default JSON decoder.
    pub fn new<F>(name: impl Into<String>, request: F) -> Self
    where
        F: Fn(&Value) -> Result<HttpRequest> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            request: Arc::new(request),
            transform: None,
            decoder: Arc::new(decode_json),
            policy: FailurePolicy::Abort,
        }
    }

    /// Sets the transform applied before the request is built.
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&StepInput<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Replaces the response decoder.
    #[must_use]
    pub fn with_decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&HttpResponse) -> Result<Value> + Send + Sync + 'static,
    {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for [`FailurePolicy::DegradeToValue`].
    #[must_use]
    pub fn degrade_to(self, value: Value) -> Self {
        self.with_policy(FailurePolicy::DegradeToValue(value))
    }

    /// Returns the step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the failure policy.
    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    /// Computes this step's input.
    pub(crate) fn input(&self, input: &StepInput<'_>) -> Result<Value> {
        match &self.transform {
            Some(transform) => transform(input),
            None => Ok(input.previous.clone()),
        }
    }

    /// Builds the outbound call.
    pub(crate) fn request(&self, input: &Value) -> Result<HttpRequest> {
        (self.request)(input)
    }

    /// Decodes the response.
    pub(crate) fn decode(&self, response: &HttpResponse) -> Result<Value> {
        (self.decoder)(response)
    }
}

/// Default decoder: 2xx bodies as JSON (empty as `null`), anything else
/// as an upstream error carrying the status.
pub fn decode_json(response: &HttpResponse) -> Result<Value> {
    if !response.is_success() {
        return Err(Error::upstream(
            response.status,
            format!("upstream returned status {}", response.status),
        ));
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    response.json()
}

/// One stage of a plan.
#[derive(Debug, Clone)]
pub enum Stage {
    /// A step on its own.
    Single(Step),
    /// Steps started together and joined before the next stage.
    Parallel(Vec<Step>),
}

impl Stage {
    /// Returns the steps of this stage in declared order.
    pub fn steps(&self) -> &[Step] {
        match self {
            Stage::Single(step) => std::slice::from_ref(step),
            Stage::Parallel(steps) => steps,
        }
    }
}

/// An ordered sequence of stages.
///
/// ## Example
///
/// ```rust
/// use serde_json::Value;
/// use storefront_edge::orchestrator::{OrchestrationPlan, Step};
/// use storefront_edge::transport::HttpRequest;
/// use url::Url;
///
/// fn fetch(name: &str, url: &'static str) -> Step {
///     Step::new(name, move |_: &Value| Ok(HttpRequest::get(Url::parse(url)?)))
/// }
///
/// let plan = OrchestrationPlan::new("place-order")
///     .then(fetch("customer", "http://user/customers/c1"))
///     .parallel(vec![
///         fetch("address", "http://user/addresses/a1").degrade_to(Value::Null),
///         fetch("card", "http://user/cards/k1").degrade_to(Value::Null),
///     ]);
///
/// assert_eq!(plan.stages().len(), 2);
/// assert!(plan.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct OrchestrationPlan {
    name: String,
    stages: Vec<Stage>,
}

impl OrchestrationPlan {
    /// Creates an empty plan.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Appends a sequential step.
    #[must_use]
    pub fn then(mut self, step: Step) -> Self {
        self.stages.push(Stage::Single(step));
        self
    }

    /// Appends a parallel group.
    #[must_use]
    pub fn parallel(mut self, steps: Vec<Step>) -> Self {
        self.stages.push(Stage::Parallel(steps));
        self
    }

    /// Returns the plan name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Checks the plan is runnable: at least one stage, no empty group and
    /// unique step names.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::invalid_plan(format!("plan {} has no stages", self.name)));
        }

        let mut seen = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.steps().is_empty() {
                return Err(Error::invalid_plan(format!(
                    "plan {} has an empty parallel group at stage {}",
                    self.name, index
                )));
            }
            for step in stage.steps() {
                if !seen.insert(step.name()) {
                    return Err(Error::invalid_plan(format!(
                        "plan {} declares step {} twice",
                        self.name,
                        step.name()
                    )));
                }
            }
        }
        Ok(())
    }
}
