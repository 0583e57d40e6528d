//! Storefront flows end to end over the scripted transport.

use anyhow::Context;
use serde_json::{Value, json};
use storefront_edge::ErrorKind;
use storefront_edge::gateway::RequestAccessor;
use storefront_edge::storefront;
use storefront_edge::transport::{HttpMethod, MockReply};

use crate::common::{ADDRESSES_URL, CARDS_URL, CUSTOMER_URL, ORDERS_URL, TestGateway, inbound};

#[tokio::test]
async fn test_checkout_with_unreachable_address_service() {
    let gateway = TestGateway::new();
    gateway.script_profile();
    gateway.transport.on(
        HttpMethod::Get,
        ADDRESSES_URL,
        MockReply::fail(ErrorKind::Connection, "connection refused"),
    );
    gateway
        .transport
        .on(HttpMethod::Post, ORDERS_URL, MockReply::json(201, json!({"id": "o1"})));

    let route = storefront::place_order(gateway.gateway.endpoints(), "c1").unwrap();
    let mut req = inbound("POST", "/orders", &[]);
    let response = gateway.gateway.dispatch(&mut req, &route, Value::Null).await;

    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!({"id": "o1"}));

    let order = gateway.transport.requests_to(ORDERS_URL).remove(0);
    assert_eq!(
        order.body,
        Some(json!({
            "customer": CUSTOMER_URL,
            "address": null,
            "card": "http://user/cards/k1",
            "items": "http://carts/carts/c1/items",
        }))
    );

    let server = req.server_span().unwrap();
    assert!(server.is_finished());
    assert!(!server.is_error());

    // server span plus customer, address, card and order client spans
    let spans = gateway.collector.spans();
    assert_eq!(spans.len(), 5);
    for span in &spans {
        assert_eq!(span.context().trace_id(), server.context().trace_id());
    }

    let address = &gateway.collector.find("/customers/c1/addresses")[0];
    assert!(address.is_error());
    assert_eq!(address.tags().get("degraded").and_then(|v| v.as_bool()), Some(true));
}

#[tokio::test]
async fn test_checkout_parallel_lookups_share_the_server_parent() {
    let gateway = TestGateway::new();
    gateway.script_profile();
    gateway.transport.on(HttpMethod::Post, ORDERS_URL, MockReply::status(201));

    let route = storefront::place_order(gateway.gateway.endpoints(), "c1").unwrap();
    let mut req = inbound("POST", "/orders", &[]);
    let response = gateway.gateway.dispatch(&mut req, &route, Value::Null).await;
    assert_eq!(response.body, json!({"message": "Order created successfully"}));

    let server_span_id = req.server_span().unwrap().context().span_id().clone();
    for path in ["/customers/c1/addresses", "/customers/c1/cards"] {
        let span = &gateway.collector.find(path)[0];
        assert_eq!(span.context().parent_span_id(), Some(&server_span_id));
    }
    assert_eq!(gateway.transport.requests_to(CARDS_URL).len(), 1);
}

#[tokio::test]
async fn test_checkout_without_profile_never_orders() {
    let gateway = TestGateway::new();
    gateway.transport.on(HttpMethod::Get, CUSTOMER_URL, MockReply::status(404));

    let route = storefront::place_order(gateway.gateway.endpoints(), "c1").unwrap();
    let mut req = inbound("POST", "/orders", &[]);
    let response = gateway.gateway.dispatch(&mut req, &route, Value::Null).await;

    assert_eq!(response.status, 404);
    assert!(gateway.transport.requests_to(ORDERS_URL).is_empty());
    assert!(req.server_span().unwrap().is_error());
}

#[tokio::test]
async fn test_order_history_is_empty_when_orders_has_none() {
    let gateway = TestGateway::new();
    gateway.transport.on(
        HttpMethod::Get,
        "http://orders/orders/search/customerId?sort=date&custId=c1",
        MockReply::status(404),
    );

    let route = storefront::list_orders(gateway.gateway.endpoints(), "c1").unwrap();
    let mut req = inbound("GET", "/orders", &[]);
    let response = gateway.gateway.dispatch(&mut req, &route, Value::Null).await;

    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!([]));
}

#[tokio::test]
async fn test_login_then_add_to_cart() -> anyhow::Result<()> {
    let gateway = TestGateway::new();
    gateway.transport.on(
        HttpMethod::Get,
        "http://user/login",
        MockReply::json(200, json!({"user": {"id": "c1"}})),
    );
    gateway.transport.on(
        HttpMethod::Get,
        "http://carts/carts/c1/merge?sessionId=s1",
        MockReply::status(202),
    );
    gateway.transport.on(
        HttpMethod::Get,
        "http://catalogue/catalogue/sock-1",
        MockReply::json(200, json!({"id": "sock-1", "price": 12.5})),
    );
    gateway
        .transport
        .on(HttpMethod::Post, "http://carts/carts/c1/items", MockReply::status(201));

    let endpoints = gateway.gateway.endpoints().clone();
    let login = storefront::login(&endpoints, "Basic dXNlcjpwYXNz", "s1")?;
    let mut req = inbound("GET", "/login", &[]);
    let response = gateway.gateway.dispatch(&mut req, &login, Value::Null).await;
    assert_eq!(response.status, 200);

    let customer_id = response.body["id"]
        .as_str()
        .context("login response should carry the customer id")?
        .to_string();
    let add = storefront::add_to_cart(&endpoints, &customer_id, "sock-1")?;
    let mut req = inbound("POST", "/cart", &[]);
    let response = gateway.gateway.dispatch(&mut req, &add, Value::Null).await;

    assert_eq!(response.status, 201);
    let line = gateway.transport.requests_to("http://carts/carts/c1/items").remove(0);
    assert_eq!(line.body, Some(json!({"itemId": "sock-1", "unitPrice": 12.5})));
    Ok(())
}
