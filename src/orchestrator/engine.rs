//! Plan execution.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::fault::{FaultContext, FaultInjector};
use crate::headers::HeaderBag;
use crate::orchestrator::plan::{
    FailurePolicy, OrchestrationPlan, PlanOutput, Stage, Step, StepInput,
};
use crate::tracing_support::{tag_keys, Span, SpanOutcome, TraceContext, Tracer};
use crate::transport::{HttpRequest, HttpTransport};
use crate::Result;

/// The request-scoped context every step runs under.
///
/// Passed explicitly into [`Orchestrator::run`]; client spans are started as
/// children of `parent` and carry `baggage`.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    /// Context of the enclosing server span.
    pub parent: &'a TraceContext,
    /// Headers copied to every outbound call.
    pub baggage: &'a HeaderBag,
    /// Inbound request path, seen by fault rules.
    pub path: &'a str,
    /// Inbound request headers, seen by fault rules.
    pub headers: &'a HeaderBag,
}

/// Runs orchestration plans.
///
/// Each step is consulted against the fault injector, traced with a client
/// span and resolved through its failure policy. Sequential stages run in
/// order; a parallel group starts every step at once and joins on all of
/// them before the next stage starts.
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn HttpTransport>,
    tracer: Tracer,
    faults: FaultInjector,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tracer", &self.tracer)
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    pub fn new(transport: Arc<dyn HttpTransport>, tracer: Tracer, faults: FaultInjector) -> Self {
        Self {
            transport,
            tracer,
            faults,
        }
    }

    /// Returns the tracer used for client spans.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Returns the fault injector.
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Runs `plan` from `input` and returns the last stage's output.
    ///
    /// The first aborting failure ends the plan. For a parallel group that
    /// is the first failed aborting step in declared order, reported only
    /// once every step of the group has settled.
    pub async fn run(
        &self,
        ctx: &RunContext<'_>,
        plan: &OrchestrationPlan,
        input: Value,
    ) -> Result<Value> {
        self.execute(ctx, plan, input).await.map(|done| done.output)
    }

    /// Like [`run`](Self::run), also returning every step's output.
    pub async fn execute(
        &self,
        ctx: &RunContext<'_>,
        plan: &OrchestrationPlan,
        input: Value,
    ) -> Result<PlanOutput> {
        plan.validate()?;
        tracing::debug!(plan = plan.name(), stages = plan.stages().len(), "running plan");

        let mut outputs = Map::new();
        let mut previous = input.clone();

        for stage in plan.stages() {
            let step_input = StepInput {
                previous: &previous,
                initial: &input,
                outputs: &outputs,
            };

            let output = match stage {
                Stage::Single(step) => {
                    let value = self.run_step(ctx, step, &step_input).await?;
                    outputs.insert(step.name().to_string(), value.clone());
                    value
                }
                Stage::Parallel(steps) => {
                    let settled =
                        join_all(steps.iter().map(|step| self.run_step(ctx, step, &step_input)))
                            .await;

                    let mut group = Map::new();
                    for (step, result) in steps.iter().zip(settled) {
                        group.insert(step.name().to_string(), result?);
                    }
                    for (name, value) in &group {
                        outputs.insert(name.clone(), value.clone());
                    }
                    Value::Object(group)
                }
            };
            previous = output;
        }

        Ok(PlanOutput {
            output: previous,
            steps: outputs,
        })
    }

    /// Runs one step and resolves its failure policy.
    async fn run_step(
        &self,
        ctx: &RunContext<'_>,
        step: &Step,
        input: &StepInput<'_>,
    ) -> Result<Value> {
        match self.attempt(ctx, step, input).await {
            Ok(value) => Ok(value),
            Err(err) => match step.policy() {
                FailurePolicy::Abort => Err(err.with_step(step.name())),
                FailurePolicy::DegradeToValue(value) => {
                    tracing::warn!(
                        step = step.name(),
                        error = %err,
                        "step failed, using fallback value"
                    );
                    Ok(value.clone())
                }
            },
        }
    }

    /// Performs one step's call under its client span.
    ///
    /// The span opens under the step's name before the request is built,
    /// so a step whose input or request cannot be built is still traced.
    async fn attempt(
        &self,
        ctx: &RunContext<'_>,
        step: &Step,
        input: &StepInput<'_>,
    ) -> Result<Value> {
        let mut span = self.tracer.start_client_named(ctx.parent, ctx.baggage, step.name());
        span.tag(tag_keys::STEP, step.name());

        let (outcome, result) = match build_request(step, input) {
            Ok(request) => self.call(ctx, step, &mut span, request).await,
            Err(err) => (SpanOutcome::from(&err), Err(err)),
        };

        if result.is_err() && matches!(step.policy(), FailurePolicy::DegradeToValue(_)) {
            span.tag("degraded", true);
        }
        self.tracer.finish(&mut span, outcome);

        result
    }

    async fn call(
        &self,
        ctx: &RunContext<'_>,
        step: &Step,
        span: &mut Span,
        mut request: HttpRequest,
    ) -> (SpanOutcome, Result<Value>) {
        let decision = self.faults.decide(&FaultContext {
            step: step.name(),
            path: ctx.path,
            headers: ctx.headers,
        });

        let trace_headers = self.tracer.describe_call(span, request.method.as_str(), &request.url);
        if let Some(rule_id) = decision.rule_id() {
            span.tag(tag_keys::FAULT_ID, rule_id);
        }
        request.headers.extend_from(&trace_headers);

        let called = match decision.pre_call_error() {
            Some(err) => Err(err),
            None => self.transport.call(request).await,
        };

        if let Some(delay) = decision.delay() {
            tokio::time::sleep(delay).await;
        }

        match called {
            Ok(response) => match step.decode(&response) {
                Ok(value) => (SpanOutcome::Status(response.status), Ok(value)),
                Err(err) if response.status >= 400 => (SpanOutcome::Status(response.status), Err(err)),
                Err(err) => (SpanOutcome::from(&err), Err(err)),
            },
            Err(err) => (SpanOutcome::from(&err), Err(err)),
        }
    }
}

fn build_request(step: &Step, input: &StepInput<'_>) -> Result<HttpRequest> {
    let step_input = step.input(input)?;
    step.request(&step_input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaultConfig;
    use crate::error::ErrorKind;
    use crate::Error;
    use crate::fault::FaultRule;
    use crate::tracing_support::InMemoryCollector;
    use crate::transport::{HttpMethod, MockReply, MockTransport};
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    struct Harness {
        transport: Arc<MockTransport>,
        collector: Arc<InMemoryCollector>,
        orchestrator: Orchestrator,
        parent: TraceContext,
        headers: HeaderBag,
    }

    impl Harness {
        fn new(faults: FaultInjector) -> Self {
            let transport = Arc::new(MockTransport::new());
            let collector = Arc::new(InMemoryCollector::new());
            let orchestrator = Orchestrator::new(
                transport.clone(),
                Tracer::new(collector.clone()),
                faults,
            );
            Self {
                transport,
                collector,
                orchestrator,
                parent: TraceContext::new_root(),
                headers: HeaderBag::new(),
            }
        }

        fn ctx(&self) -> RunContext<'_> {
            RunContext {
                parent: &self.parent,
                baggage: &self.headers,
                path: "/test",
                headers: &self.headers,
            }
        }

        async fn run(&self, plan: &OrchestrationPlan, input: Value) -> Result<Value> {
            self.orchestrator.run(&self.ctx(), plan, input).await
        }
    }

    fn get(name: &str, url: &'static str) -> Step {
        Step::new(name, move |_: &Value| Ok(HttpRequest::get(Url::parse(url)?)))
    }

    #[tokio::test]
    async fn test_sequential_feeds_previous_output() {
        let h = Harness::new(FaultInjector::disabled());
        h.transport.on(
            HttpMethod::Get,
            "http://user/customers/c1",
            MockReply::json(200, json!({"card": "http://user/cards/k1"})),
        );
        h.transport.on(
            HttpMethod::Get,
            "http://user/cards/k1",
            MockReply::json(200, json!({"number": "4111"})),
        );

        let plan = OrchestrationPlan::new("p")
            .then(get("customer", "http://user/customers/c1"))
            .then(Step::new("card", |input: &Value| {
                let href = input["card"].as_str().unwrap_or_default();
                Ok(HttpRequest::get(Url::parse(href)?))
            }));

        let output = h.run(&plan, Value::Null).await.unwrap();
        assert_eq!(output, json!({"number": "4111"}));
        assert_eq!(h.collector.len(), 2);
    }

    #[tokio::test]
    async fn test_abort_skips_later_stages() {
        let h = Harness::new(FaultInjector::disabled());
        h.transport.on(HttpMethod::Get, "http://user/customers/c1", MockReply::status(500));

        let plan = OrchestrationPlan::new("p")
            .then(get("customer", "http://user/customers/c1"))
            .then(get("cards", "http://user/cards/k1"));

        let err = h.run(&plan, Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.status(), 500);
        assert_eq!(err.step(), Some("customer"));
        assert!(h.transport.requests_to("http://user/cards").is_empty());
    }

    #[tokio::test]
    async fn test_degrade_substitutes_value() {
        let h = Harness::new(FaultInjector::disabled());
        h.transport.on(
            HttpMethod::Get,
            "http://user/addresses/a1",
            MockReply::fail(ErrorKind::Connection, "refused"),
        );
        h.transport.on(HttpMethod::Get, "http://user/cards/k1", MockReply::json(200, json!("card")));

        let plan = OrchestrationPlan::new("p").parallel(vec![
            get("address", "http://user/addresses/a1").degrade_to(Value::Null),
            get("card", "http://user/cards/k1").degrade_to(Value::Null),
        ]);

        let output = h.run(&plan, Value::Null).await.unwrap();
        assert_eq!(output, json!({"address": null, "card": "card"}));

        let address = &h.collector.find("addresses")[0];
        assert!(address.is_error());
        assert_eq!(
            address.tags().get("degraded").and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[tokio::test]
    async fn test_unbuildable_step_is_traced_and_degraded() {
        let h = Harness::new(FaultInjector::disabled());
        let plan = OrchestrationPlan::new("p").then(
            Step::new("address", |_: &Value| Err(Error::missing_link("no address link")))
                .degrade_to(Value::Null),
        );

        let output = h.run(&plan, Value::Null).await.unwrap();
        assert_eq!(output, Value::Null);
        assert_eq!(h.transport.request_count(), 0);

        let spans = h.collector.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name(), "address");
        assert!(spans[0].is_error());
        assert_eq!(spans[0].tags().get(tag_keys::STEP).and_then(|v| v.as_str()), Some("address"));
        assert_eq!(spans[0].tags().get("degraded").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(spans[0].context().parent_span_id(), Some(h.parent.span_id()));
    }

    #[tokio::test]
    async fn test_failed_transform_aborts_with_a_span() {
        let h = Harness::new(FaultInjector::disabled());
        let plan = OrchestrationPlan::new("p").then(
            get("card", "http://user/cards/k1")
                .with_transform(|_| Err(Error::invalid_argument("card id is required"))),
        );

        let err = h.run(&plan, Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.step(), Some("card"));
        assert_eq!(h.transport.request_count(), 0);

        let spans = h.collector.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name(), "card");
        assert!(spans[0].is_error());
        assert!(spans[0].tags().get("degraded").is_none());
    }

    #[tokio::test]
    async fn test_group_reports_first_declared_failure() {
        let h = Harness::new(FaultInjector::disabled());
        h.transport.on(
            HttpMethod::Get,
            "http://a/x",
            MockReply::status(502).with_delay(Duration::from_millis(20)),
        );
        h.transport.on(HttpMethod::Get, "http://b/x", MockReply::status(503));

        let plan = OrchestrationPlan::new("p")
            .parallel(vec![get("first", "http://a/x"), get("second", "http://b/x")]);

        let err = h.run(&plan, Value::Null).await.unwrap_err();
        assert_eq!(err.step(), Some("first"));
        assert_eq!(err.status(), 502);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_waits_for_slow_branch() {
        let h = Harness::new(FaultInjector::disabled());
        h.transport.on(HttpMethod::Get, "http://fast/x", MockReply::status(500));
        h.transport.on(
            HttpMethod::Get,
            "http://slow/x",
            MockReply::status(200).with_delay(Duration::from_secs(5)),
        );

        let plan = OrchestrationPlan::new("p")
            .parallel(vec![get("fast", "http://fast/x"), get("slow", "http://slow/x")]);

        let started = tokio::time::Instant::now();
        let err = h.run(&plan, Value::Null).await.unwrap_err();

        assert_eq!(err.step(), Some("fast"));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(h.transport.completed(), vec!["http://fast/x", "http://slow/x"]);
    }

    #[tokio::test]
    async fn test_invalid_plan_makes_no_calls() {
        let h = Harness::new(FaultInjector::disabled());
        let err = h
            .run(&OrchestrationPlan::new("empty"), Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPlan);
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_pre_call_fault_is_traced_without_a_call() {
        let config = FaultConfig::builder()
            .enabled(true)
            .rules(vec![FaultRule::crash("FE-TE-01").with_enabled(true).with_always(true)])
            .build();
        let h = Harness::new(FaultInjector::new(&config));

        let plan = OrchestrationPlan::new("p").then(get("delete-cart-item", "http://carts/carts/1/items/2"));
        let err = h.run(&plan, Value::Null).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(h.transport.request_count(), 0);

        let spans = h.collector.spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].is_error());
        assert_eq!(
            spans[0].tags().get(tag_keys::FAULT_ID).and_then(|v| v.as_str()),
            Some("FE-TE-01")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_fault_holds_result() {
        let config = FaultConfig::builder()
            .enabled(true)
            .rules(vec![
                FaultRule::delay("FE-SLEEP-01", Duration::from_millis(2000), 100.0).with_enabled(true),
            ])
            .build();
        let h = Harness::new(FaultInjector::new(&config).with_random_source(Arc::new(|| 0.0)));
        h.transport.on(HttpMethod::Get, "http://carts/x", MockReply::json(200, json!({"ok": true})));

        let plan = OrchestrationPlan::new("p").then(get("cart", "http://carts/x"));
        let started = tokio::time::Instant::now();
        let output = h.run(&plan, Value::Null).await.unwrap();

        assert_eq!(output, json!({"ok": true}));
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!(h.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_outbound_calls_carry_trace_headers() {
        let h = Harness::new(FaultInjector::disabled());
        h.transport.on(HttpMethod::Get, "http://carts/x", MockReply::status(200));

        let plan = OrchestrationPlan::new("p").then(get("cart", "http://carts/x"));
        h.run(&plan, Value::Null).await.unwrap();

        let sent = &h.transport.requests()[0];
        assert_eq!(
            sent.headers.get("x-b3-traceid"),
            Some(h.parent.trace_id().to_string().as_str())
        );
        assert_eq!(
            sent.headers.get("x-b3-parentspanid"),
            Some(h.parent.span_id().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_transform_sees_earlier_outputs() {
        let h = Harness::new(FaultInjector::disabled());
        h.transport.on(HttpMethod::Get, "http://a/x", MockReply::json(200, json!("a-out")));
        h.transport.on(HttpMethod::Get, "http://b/x", MockReply::json(200, json!("b-out")));
        h.transport.on(HttpMethod::Post, "http://c/x", MockReply::json(201, json!("done")));

        let plan = OrchestrationPlan::new("p")
            .then(get("a", "http://a/x"))
            .then(get("b", "http://b/x"))
            .then(
                Step::new("c", |input: &Value| {
                    Ok(HttpRequest::new(HttpMethod::Post, Url::parse("http://c/x")?).with_json(input.clone()))
                })
                .with_transform(|input| {
                    Ok(json!({
                        "a": input.output("a").cloned(),
                        "b": input.previous.clone(),
                        "seed": input.initial.clone(),
                    }))
                }),
            );

        let done = h
            .orchestrator
            .execute(&h.ctx(), &plan, json!(7))
            .await
            .unwrap();
        assert_eq!(done.step("a"), Some(&json!("a-out")));
        assert_eq!(done.output, json!("done"));
        let posted = h.transport.requests_to("http://c")[0].body.clone().unwrap();
        assert_eq!(posted, json!({"a": "a-out", "b": "b-out", "seed": 7}));
    }
}
