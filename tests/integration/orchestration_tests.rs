//! Plan execution through the gateway: joins, policies and ordering.

use std::time::Duration;

use serde_json::{Value, json};
use storefront_edge::gateway::RequestAccessor;
use storefront_edge::orchestrator::{OrchestrationPlan, Step};
use storefront_edge::transport::{HttpMethod, HttpRequest, MockReply};
use storefront_edge::{ErrorKind, Route};
use url::Url;

use crate::common::{TestGateway, inbound};

fn get_step(name: &str, url: &'static str) -> Step {
    Step::new(name, move |_: &Value| Ok(HttpRequest::get(Url::parse(url)?)))
}

#[tokio::test(start_paused = true)]
async fn test_parallel_group_waits_for_slowest_branch() {
    let gateway = TestGateway::new();
    gateway.transport.on(
        HttpMethod::Get,
        "http://svc/slow",
        MockReply::json(200, json!("slow")).with_delay(Duration::from_millis(300)),
    );
    gateway.transport.on(
        HttpMethod::Get,
        "http://svc/fast",
        MockReply::json(200, json!("fast")).with_delay(Duration::from_millis(10)),
    );
    gateway
        .transport
        .on(HttpMethod::Get, "http://svc/after", MockReply::json(200, json!("after")));

    let plan = OrchestrationPlan::new("join")
        .parallel(vec![get_step("slow", "http://svc/slow"), get_step("fast", "http://svc/fast")])
        .then(get_step("after", "http://svc/after"));

    let mut req = inbound("GET", "/join", &[]);
    gateway.gateway.handle_inbound(&mut req);

    let started = tokio::time::Instant::now();
    let output = gateway.gateway.run(&req, &plan, Value::Null).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(output, json!("after"));
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(600), "branches ran sequentially: {:?}", elapsed);
    assert_eq!(
        gateway.transport.completed(),
        vec!["http://svc/fast", "http://svc/slow", "http://svc/after"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_branch_still_joins_before_reporting() {
    let gateway = TestGateway::new();
    gateway.transport.on(
        HttpMethod::Get,
        "http://svc/slow",
        MockReply::json(200, json!("slow")).with_delay(Duration::from_millis(200)),
    );
    gateway.transport.on(HttpMethod::Get, "http://svc/broken", MockReply::status(500));

    let plan = OrchestrationPlan::new("join")
        .parallel(vec![get_step("broken", "http://svc/broken"), get_step("slow", "http://svc/slow")]);

    let mut req = inbound("GET", "/join", &[]);
    gateway.gateway.handle_inbound(&mut req);
    let err = gateway.gateway.run(&req, &plan, Value::Null).await.unwrap_err();

    assert_eq!(err.step(), Some("broken"));
    assert_eq!(err.upstream_status(), Some(500));
    assert!(gateway.transport.completed().contains(&"http://svc/slow".to_string()));
    assert_eq!(gateway.collector.find("GET svc /slow").len(), 1);
}

#[tokio::test]
async fn test_degraded_steps_never_abort() {
    let gateway = TestGateway::new();
    gateway.transport.on(
        HttpMethod::Get,
        "http://svc/down",
        MockReply::fail(ErrorKind::Connection, "refused"),
    );
    gateway.transport.on(HttpMethod::Get, "http://svc/bad", MockReply::raw(200, "{not json"));
    gateway.transport.on(HttpMethod::Get, "http://svc/ok", MockReply::json(200, json!({"ok": true})));

    let plan = OrchestrationPlan::new("degrade")
        .then(get_step("down", "http://svc/down").degrade_to(json!("fallback")))
        .parallel(vec![
            get_step("bad", "http://svc/bad").degrade_to(Value::Null),
            get_step("ok", "http://svc/ok"),
        ]);

    let route = Route::with_status(plan, 200);
    let mut req = inbound("GET", "/degrade", &[]);
    let response = gateway.gateway.dispatch(&mut req, &route, Value::Null).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"bad": null, "ok": {"ok": true}}));
    assert!(!req.server_span().unwrap().is_error());

    for name in ["GET svc /down", "GET svc /bad"] {
        let span = &gateway.collector.find(name)[0];
        assert!(span.is_error());
        assert_eq!(span.tags().get("degraded").and_then(|v| v.as_bool()), Some(true));
    }
}

#[tokio::test]
async fn test_abort_skips_later_stages() {
    let gateway = TestGateway::new();
    gateway.transport.on(HttpMethod::Get, "http://svc/first", MockReply::status(503));

    let plan = OrchestrationPlan::new("abort")
        .then(get_step("first", "http://svc/first"))
        .then(get_step("second", "http://svc/second"));

    let route = Route::with_status(plan, 200);
    let mut req = inbound("GET", "/abort", &[]);
    let response = gateway.gateway.dispatch(&mut req, &route, Value::Null).await;

    assert_eq!(response.status, 503);
    assert_eq!(gateway.transport.request_count(), 1);
    assert!(req.server_span().unwrap().is_error());
}

#[tokio::test]
async fn test_invalid_plan_is_rejected_before_any_call() {
    let gateway = TestGateway::new();
    let plan = OrchestrationPlan::new("dup")
        .then(get_step("same", "http://svc/a"))
        .then(get_step("same", "http://svc/b"));

    let mut req = inbound("GET", "/dup", &[]);
    gateway.gateway.handle_inbound(&mut req);
    let err = gateway.gateway.run(&req, &plan, Value::Null).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidPlan);
    assert_eq!(gateway.transport.request_count(), 0);
}
