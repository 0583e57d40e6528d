//! Flows over the reqwest transport against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use storefront_edge::config::{CollectorConfig, Endpoints, GatewayConfig};
use storefront_edge::gateway::Gateway;
use storefront_edge::storefront;
use storefront_edge::tracing_support::InMemoryCollector;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{SPAN_ID, TRACE_ID, inbound};

fn endpoints(server: &MockServer) -> Endpoints {
    let uri = server.uri();
    Endpoints::builder()
        .catalogue(uri.clone())
        .tags(format!("{}/tags", uri))
        .carts(format!("{}/carts", uri))
        .orders(uri.clone())
        .customers(format!("{}/customers", uri))
        .addresses(format!("{}/addresses", uri))
        .cards(format!("{}/cards", uri))
        .login(format!("{}/login", uri))
        .register(format!("{}/register", uri))
        .build()
}

fn config(server: &MockServer) -> GatewayConfig {
    GatewayConfig::builder()
        .endpoints(endpoints(server))
        .request_timeout(Duration::from_secs(2))
        .build()
}

#[tokio::test]
async fn test_checkout_over_http() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/customers/c1"))
        .and(header("x-b3-traceid", TRACE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_links": {
                "customer": {"href": format!("{}/customers/c1", uri)},
                "addresses": {"href": format!("{}/customers/c1/addresses", uri)},
                "cards": {"href": format!("{}/customers/c1/cards", uri)},
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/c1/addresses"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/c1/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"card": [{"_links": {"self": {"href": format!("{}/cards/k1", uri)}}}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({"address": null, "card": format!("{}/cards/k1", uri)})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "o1"})))
        .expect(1)
        .mount(&server)
        .await;

    let collector = Arc::new(InMemoryCollector::new());
    let gateway = Gateway::builder()
        .config(config(&server))
        .collector(collector.clone())
        .build()
        .unwrap();

    let route = storefront::place_order(gateway.endpoints(), "c1").unwrap();
    let mut req = inbound(
        "POST",
        "/orders",
        &[("X-B3-TraceId", TRACE_ID), ("X-B3-SpanId", SPAN_ID), ("X-Request-Id", "r-1")],
    );
    let response = gateway.dispatch(&mut req, &route, Value::Null).await;

    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!({"id": "o1"}));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 4);
    for request in &received {
        let traceparent = request.headers.get("traceparent").unwrap().to_str().unwrap();
        assert!(traceparent.contains(TRACE_ID));
        assert_eq!(request.headers.get("x-b3-parentspanid").unwrap(), SPAN_ID);
        assert_eq!(request.headers.get("x-request-id").unwrap(), "r-1");
    }
    assert_eq!(collector.len(), 5);
}

#[tokio::test]
async fn test_login_merge_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": "c1"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/carts/c1/merge"))
        .and(query_param("sessionId", "s1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(config(&server)).unwrap();
    let route = storefront::login(gateway.endpoints(), "Basic dXNlcjpwYXNz", "s1").unwrap();
    let mut req = inbound("GET", "/login", &[]);
    let response = gateway.dispatch(&mut req, &route, Value::Null).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"id": "c1"}));
}

#[tokio::test]
async fn test_spans_are_reported_to_zipkin() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tags": ["blue"]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/spans"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.collector = CollectorConfig::builder().zipkin_base_url(server.uri()).build();
    let gateway = Gateway::new(config).unwrap();

    let route = storefront::tags(gateway.endpoints()).unwrap();
    let mut req = inbound("GET", "/tags", &[("X-B3-TraceId", TRACE_ID), ("X-B3-SpanId", SPAN_ID)]);
    let response = gateway.dispatch(&mut req, &route, Value::Null).await;
    assert_eq!(response.status, 200);

    let mut reported = Vec::new();
    for _ in 0..50 {
        reported = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == "/api/v2/spans")
            .collect();
        if reported.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(reported.len(), 2);
    for request in &reported {
        let spans: Vec<Value> = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(spans[0]["traceId"], TRACE_ID);
        assert_eq!(spans[0]["localEndpoint"]["serviceName"], "front-end");
    }
}
