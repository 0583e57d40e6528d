//! Fault injection on the cart item delete route.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use storefront_edge::config::{DEFAULT_FAULT_STEP, FaultConfig};
use storefront_edge::fault::{FaultInjector, FaultRule};
use storefront_edge::gateway::GatewayResponse;
use storefront_edge::storefront;
use storefront_edge::tracing_support::tag_keys;
use storefront_edge::transport::{HttpMethod, MockReply};

use crate::common::{TestGateway, inbound};

const ITEM_URL: &str = "http://carts/carts/c1/items/sock-1";

fn injector(rules: Vec<FaultRule>) -> FaultInjector {
    FaultInjector::new(&FaultConfig::builder().enabled(true).rules(rules).build())
}

async fn delete_item(gateway: &TestGateway, headers: &[(&str, &str)]) -> GatewayResponse {
    gateway.transport.on(HttpMethod::Delete, ITEM_URL, MockReply::status(202));
    let route = storefront::delete_cart_item(gateway.gateway.endpoints(), "c1", "sock-1").unwrap();
    let mut req = inbound("DELETE", "/cart/sock-1", headers);
    gateway.gateway.dispatch(&mut req, &route, Value::Null).await
}

fn fault_id(gateway: &TestGateway) -> Option<String> {
    let span = &gateway.collector.find(ITEM_URL.trim_start_matches("http://carts"))[0];
    span.tags()
        .get(tag_keys::FAULT_ID)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[tokio::test]
async fn test_first_matching_rule_wins() {
    let gateway = TestGateway::with_faults(injector(vec![
        FaultRule::synthetic_error("FE-ERR-01", "CART_UNAVAILABLE", 503, "cart unavailable")
            .with_enabled(true)
            .with_always(true),
        FaultRule::crash("FE-TE-01").with_enabled(true).with_always(true),
    ]));

    let response = delete_item(&gateway, &[]).await;

    assert_eq!(response.status, 503);
    assert_eq!(response.body["code"], "CART_UNAVAILABLE");
    assert_eq!(fault_id(&gateway).as_deref(), Some("FE-ERR-01"));
    assert_eq!(gateway.transport.request_count(), 0);
}

#[tokio::test]
async fn test_header_selects_crash() {
    let gateway = TestGateway::with_faults(injector(vec![
        FaultRule::synthetic_error("FE-ERR-01", "CART_UNAVAILABLE", 503, "cart unavailable")
            .with_enabled(true),
        FaultRule::crash("FE-TE-01").with_enabled(true),
    ]));

    let response = delete_item(&gateway, &[("X-Fault", "FE-TE-01")]).await;

    assert_eq!(response.status, 500);
    assert_eq!(fault_id(&gateway).as_deref(), Some("FE-TE-01"));
    assert_eq!(gateway.transport.request_count(), 0);
}

#[tokio::test]
async fn test_rules_scoped_to_other_steps_do_not_fire() {
    let gateway = TestGateway::with_faults(injector(vec![
        FaultRule::crash("FE-TE-01")
            .with_enabled(true)
            .with_always(true)
            .applies_to("list-orders"),
    ]));

    let response = delete_item(&gateway, &[]).await;

    assert_eq!(response, GatewayResponse::status(202));
    assert_eq!(fault_id(&gateway), None);
}

#[tokio::test(start_paused = true)]
async fn test_delay_holds_the_real_result() {
    let faults = injector(vec![
        FaultRule::delay("FE-SLEEP-01", Duration::from_millis(2000), 10.0)
            .with_enabled(true)
            .applies_to(DEFAULT_FAULT_STEP),
    ])
    .with_random_source(Arc::new(|| 0.05));
    let gateway = TestGateway::with_faults(faults);

    let started = tokio::time::Instant::now();
    let response = delete_item(&gateway, &[]).await;

    assert_eq!(response, GatewayResponse::status(202));
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(gateway.transport.request_count(), 1);
    assert_eq!(fault_id(&gateway).as_deref(), Some("FE-SLEEP-01"));
}

#[tokio::test(start_paused = true)]
async fn test_delay_draw_above_threshold_does_not_fire() {
    let faults = injector(vec![
        FaultRule::delay("FE-SLEEP-01", Duration::from_millis(2000), 10.0).with_enabled(true),
    ])
    .with_random_source(Arc::new(|| 0.5));
    let gateway = TestGateway::with_faults(faults);

    let started = tokio::time::Instant::now();
    let response = delete_item(&gateway, &[]).await;

    assert_eq!(response.status, 202);
    assert!(started.elapsed() < Duration::from_millis(2000));
    assert_eq!(fault_id(&gateway), None);
}

#[tokio::test]
async fn test_global_switch_off_ignores_rules() {
    let config = FaultConfig::builder()
        .enabled(false)
        .rules(vec![FaultRule::crash("FE-TE-01").with_enabled(true).with_always(true)])
        .build();
    let gateway = TestGateway::with_faults(FaultInjector::new(&config));

    let response = delete_item(&gateway, &[("X-Fault", "FE-TE-01")]).await;
    assert_eq!(response.status, 202);
}
