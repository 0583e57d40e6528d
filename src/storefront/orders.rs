//! Order history and checkout.

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{body_value, follow, get, required_link, respond_passthrough};
use crate::config::Endpoints;
use crate::gateway::Route;
use crate::orchestrator::{OrchestrationPlan, Step};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse};
use crate::{Error, Result};

const CUSTOMER_STEP: &str = "customer";
const ADDRESS_STEP: &str = "address";
const CARD_STEP: &str = "card";
const CREATE_ORDER_STEP: &str = "create-order";

/// Lists a customer's orders, newest first.
///
/// A missing history, an error status or an unreadable body all answer with
/// an empty list. Transport failures are reported.
pub fn list_orders(endpoints: &Endpoints, customer_id: &str) -> Result<Route> {
    let plan = OrchestrationPlan::new("list-orders").then(
        Step::new("list-orders", get(endpoints.orders_search(customer_id)?))
            .with_decoder(decode_orders),
    );
    Ok(Route::with_status(plan, 201))
}

fn decode_orders(response: &HttpResponse) -> Result<Value> {
    if response.status == 404 {
        debug!("no orders found");
        return Ok(json!([]));
    }
    if !response.is_success() {
        return Ok(json!([]));
    }
    let body: Value = match response.json() {
        Ok(body) => body,
        Err(_) => return Ok(json!([])),
    };
    match body.pointer("/_embedded/customerOrders") {
        Some(orders @ Value::Array(_)) => Ok(orders.clone()),
        _ => Ok(json!([])),
    }
}

/// Places an order for the customer's current cart.
///
/// The customer profile must link its customer, address and card
/// resources. The address and card are resolved in parallel; either may
/// come back `null`, in which case the orders service decides whether the
/// order is acceptable. The orders service's status is passed through.
pub fn place_order(endpoints: &Endpoints, customer_id: &str) -> Result<Route> {
    let items = endpoints.cart_items(customer_id)?.to_string();
    let orders = endpoints.orders()?;

    let customer = Step::new(CUSTOMER_STEP, get(endpoints.customer(customer_id)?))
        .with_decoder(decode_customer_links);

    let address = Step::new(ADDRESS_STEP, follow)
        .with_transform(|input| Ok(input.previous["addresses"].clone()))
        .with_decoder(|response| first_self_link(response, "address"))
        .degrade_to(Value::Null);

    let card = Step::new(CARD_STEP, follow)
        .with_transform(|input| Ok(input.previous["cards"].clone()))
        .with_decoder(|response| first_self_link(response, "card"))
        .degrade_to(Value::Null);

    let create = Step::new(CREATE_ORDER_STEP, move |order: &Value| {
        Ok(HttpRequest::new(HttpMethod::Post, orders.clone()).with_json(order.clone()))
    })
    .with_transform(move |input| {
        let links = input.output(CUSTOMER_STEP).unwrap_or(&Value::Null);
        Ok(json!({
            "customer": links["customer"],
            "address": input.previous[ADDRESS_STEP],
            "card": input.previous[CARD_STEP],
            "items": items,
        }))
    })
    .with_decoder(decode_order_created);

    let plan = OrchestrationPlan::new("place-order")
        .then(customer)
        .parallel(vec![address, card])
        .then(create);
    Ok(Route::new(plan, respond_passthrough))
}

fn decode_customer_links(response: &HttpResponse) -> Result<Value> {
    if !response.is_success() {
        return Err(Error::upstream(
            response.status,
            format!("customer lookup returned status {}", response.status),
        ));
    }
    let body: Value = response.json()?;
    if body.get("status_code").and_then(Value::as_i64) == Some(500) {
        return Err(Error::upstream(500, "customer service reported an internal error"));
    }
    Ok(json!({
        "customer": required_link(&body, "/_links/customer/href", "customer")?,
        "addresses": required_link(&body, "/_links/addresses/href", "addresses")?,
        "cards": required_link(&body, "/_links/cards/href", "cards")?,
    }))
}

/// Self link of the first embedded `kind`, or `null` when there is none.
fn first_self_link(response: &HttpResponse, kind: &str) -> Result<Value> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let body: Value = response.json()?;
    if body.get("status_code").and_then(Value::as_i64) == Some(500) {
        return Ok(Value::Null);
    }
    Ok(body
        .pointer(&format!("/_embedded/{}/0/_links/self/href", kind))
        .cloned()
        .unwrap_or(Value::Null))
}

fn decode_order_created(response: &HttpResponse) -> Result<Value> {
    if !response.is_success() {
        warn!(status = response.status, "order rejected");
    }
    let body = match body_value(response) {
        Value::Null => json!({ "message": "Order created successfully" }),
        body => body,
    };
    Ok(json!({ "status": response.status, "body": body }))
}
