//! Trace continuity from inbound headers to every downstream call.

use proptest::prelude::*;
use serde_json::{Value, json};
use storefront_edge::gateway::RequestAccessor;
use storefront_edge::storefront;
use storefront_edge::tracing_support::{SpanId, TraceId};
use storefront_edge::transport::{HttpMethod, HttpRequest, MockReply};
use test_case::test_case;

use crate::common::{SPAN_ID, TRACE_ID, TestGateway, inbound};

const TAGS_URL: &str = "http://catalogue/tags";

async fn call_tags(gateway: &TestGateway, headers: &[(&str, &str)]) -> (HttpRequest, TraceId) {
    gateway
        .transport
        .on(HttpMethod::Get, TAGS_URL, MockReply::json(200, json!({"tags": []})));
    let route = storefront::tags(gateway.gateway.endpoints()).expect("route");
    let mut req = inbound("GET", "/tags", headers);
    let response = gateway.gateway.dispatch(&mut req, &route, Value::Null).await;
    assert_eq!(response.status, 200);

    let server = req.server_span().expect("server span attached");
    let trace_id = server.context().trace_id().clone();
    let outbound = gateway.transport.requests_to(TAGS_URL).remove(0);
    (outbound, trace_id)
}

fn outbound_trace(request: &HttpRequest) -> TraceId {
    TraceId::from_hex(request.headers.get("x-b3-traceid").expect("x-b3-traceid"))
        .expect("valid trace id")
}

#[test_case(&[("X-B3-TraceId", TRACE_ID), ("X-B3-SpanId", SPAN_ID), ("X-B3-Sampled", "1")] ; "b3 multi")]
#[test_case(&[("b3", "463ac35c9f6413ad48485a3953bb6124-a2fb4a1d1a96d312-1")] ; "b3 single")]
#[test_case(&[("traceparent", "00-463ac35c9f6413ad48485a3953bb6124-a2fb4a1d1a96d312-01")] ; "w3c")]
#[tokio::test]
async fn test_inbound_trace_is_continued(headers: &[(&str, &str)]) {
    let gateway = TestGateway::new();
    let (outbound, server_trace) = call_tags(&gateway, headers).await;

    let expected = TraceId::from_hex(TRACE_ID).unwrap();
    assert_eq!(server_trace, expected);
    assert_eq!(outbound_trace(&outbound), expected);
    assert_eq!(outbound.headers.get("x-b3-parentspanid"), Some(SPAN_ID));
    assert!(outbound.headers.get("traceparent").unwrap().contains(TRACE_ID));
    assert!(outbound.headers.get("b3").unwrap().starts_with(TRACE_ID));
}

#[tokio::test]
async fn test_client_span_is_child_of_server_span() {
    let gateway = TestGateway::new();
    call_tags(&gateway, &[("X-B3-TraceId", TRACE_ID), ("X-B3-SpanId", SPAN_ID)]).await;

    let client = &gateway.collector.find("GET catalogue /tags")[0];
    let server = &gateway.collector.find("GET /tags")[0];
    assert_eq!(client.context().trace_id(), server.context().trace_id());
    assert_eq!(client.context().parent_span_id(), Some(server.context().span_id()));
    assert_eq!(server.context().span_id(), &SpanId::from_hex(SPAN_ID).unwrap());
}

#[tokio::test]
async fn test_b3_multi_wins_over_traceparent() {
    let gateway = TestGateway::new();
    let (outbound, _) = call_tags(
        &gateway,
        &[
            ("traceparent", "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"),
            ("X-B3-TraceId", TRACE_ID),
            ("X-B3-SpanId", SPAN_ID),
        ],
    )
    .await;
    assert_eq!(outbound_trace(&outbound), TraceId::from_hex(TRACE_ID).unwrap());
}

#[tokio::test]
async fn test_malformed_headers_start_a_new_trace() {
    let gateway = TestGateway::new();
    let (outbound, server_trace) = call_tags(
        &gateway,
        &[("X-B3-TraceId", "not-hex"), ("X-B3-SpanId", SPAN_ID)],
    )
    .await;

    assert_ne!(server_trace, TraceId::from_hex(TRACE_ID).unwrap());
    assert_eq!(outbound_trace(&outbound), server_trace);
    assert!(server_trace.is_wide());
}

#[tokio::test]
async fn test_baggage_is_forwarded() {
    let gateway = TestGateway::new();
    let (outbound, _) = call_tags(
        &gateway,
        &[("X-Request-Id", "req-42"), ("X-Unrelated", "no")],
    )
    .await;
    assert_eq!(outbound.headers.get("x-request-id"), Some("req-42"));
    assert_eq!(outbound.headers.get("x-unrelated"), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_trace_id_survives_every_encoding(
        trace in 1u128..=u128::MAX,
        span in 1u64..=u64::MAX,
        encoding in 0usize..3,
    ) {
        let trace_hex = format!("{:032x}", trace);
        let span_hex = format!("{:016x}", span);
        let headers: Vec<(String, String)> = match encoding {
            0 => vec![
                ("x-b3-traceid".into(), trace_hex.clone()),
                ("x-b3-spanid".into(), span_hex.clone()),
            ],
            1 => vec![("b3".into(), format!("{}-{}-1", trace_hex, span_hex))],
            _ => vec![("traceparent".into(), format!("00-{}-{}-01", trace_hex, span_hex))],
        };
        let headers: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let gateway = TestGateway::new();
        let (outbound, _) = runtime.block_on(call_tags(&gateway, &headers));

        prop_assert_eq!(outbound_trace(&outbound), TraceId::from_hex(&trace_hex).unwrap());
        prop_assert_eq!(
            outbound.headers.get("x-b3-parentspanid").map(str::to_string),
            Some(span_hex)
        );
    }
}
