//! Cart reads and writes.

use serde_json::{json, Value};

use super::{get, passthrough, require, respond_passthrough};
use crate::config::{Endpoints, DEFAULT_FAULT_STEP};
use crate::gateway::{GatewayResponse, Route};
use crate::orchestrator::{OrchestrationPlan, PlanOutput, Step};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse};
use crate::{Error, ErrorKind, Result};

const CATALOGUE_ITEM_STEP: &str = "catalogue-item";

/// Returns the customer's cart items with the cart service's status.
pub fn get_cart(endpoints: &Endpoints, customer_id: &str) -> Result<Route> {
    let plan = OrchestrationPlan::new("get-cart").then(
        Step::new("get-cart", get(endpoints.cart_items(customer_id)?)).with_decoder(passthrough),
    );
    Ok(Route::new(plan, respond_passthrough))
}

/// Empties the customer's cart.
pub fn delete_cart(endpoints: &Endpoints, customer_id: &str) -> Result<Route> {
    let url = endpoints.cart(customer_id)?;
    let plan = OrchestrationPlan::new("delete-cart").then(
        Step::new("delete-cart", move |_: &Value| {
            Ok(HttpRequest::new(HttpMethod::Delete, url.clone()))
        })
        .with_decoder(status_only),
    );
    Ok(Route::new(plan, respond_status))
}

/// Removes one item from the customer's cart.
///
/// The step is named `delete-cart-item`, the default target of the fault
/// rules.
pub fn delete_cart_item(endpoints: &Endpoints, customer_id: &str, item_id: &str) -> Result<Route> {
    require(item_id, "Must pass id of item to delete")?;
    let url = endpoints.cart_item(customer_id, item_id)?;
    let plan = OrchestrationPlan::new(DEFAULT_FAULT_STEP).then(
        Step::new(DEFAULT_FAULT_STEP, move |_: &Value| {
            Ok(HttpRequest::new(HttpMethod::Delete, url.clone()))
        })
        .with_decoder(status_only),
    );
    Ok(Route::new(plan, respond_status))
}

/// Adds one unit of a catalogue item to the customer's cart.
///
/// The unit price is taken from the catalogue. The cart service must answer
/// `201 Created`.
pub fn add_to_cart(endpoints: &Endpoints, customer_id: &str, item_id: &str) -> Result<Route> {
    require(item_id, "Must pass id of item to add")?;
    let items = endpoints.cart_items(customer_id)?;

    let plan = OrchestrationPlan::new("add-to-cart")
        .then(catalogue_item(endpoints, item_id)?)
        .then(
            Step::new("add-cart-item", move |line: &Value| {
                Ok(HttpRequest::new(HttpMethod::Post, items.clone()).with_json(line.clone()))
            })
            .with_transform(|input| {
                Ok(json!({
                    "itemId": input.previous["id"],
                    "unitPrice": input.previous["price"],
                }))
            })
            .with_decoder(|response| expect_status(response, 201, "Unable to add to cart")),
        );
    Ok(Route::with_status(plan, 201))
}

/// Sets the quantity of an item in the customer's cart.
///
/// The cart service must answer `202 Accepted`.
pub fn update_cart(
    endpoints: &Endpoints,
    customer_id: &str,
    item_id: &str,
    quantity: i64,
) -> Result<Route> {
    require(item_id, "Must pass id of item to update")?;
    let items = endpoints.cart_items(customer_id)?;

    let plan = OrchestrationPlan::new("update-cart")
        .then(catalogue_item(endpoints, item_id)?)
        .then(
            Step::new("update-cart-item", move |line: &Value| {
                Ok(HttpRequest::new(HttpMethod::Patch, items.clone()).with_json(line.clone()))
            })
            .with_transform(move |input| {
                Ok(json!({
                    "itemId": input.previous["id"],
                    "quantity": quantity,
                    "unitPrice": input.previous["price"],
                }))
            })
            .with_decoder(|response| expect_status(response, 202, "Unable to update cart")),
        );
    Ok(Route::with_status(plan, 202))
}

fn catalogue_item(endpoints: &Endpoints, item_id: &str) -> Result<Step> {
    Ok(Step::new(CATALOGUE_ITEM_STEP, get(endpoints.catalogue_item(item_id)?)))
}

/// A cart write that answered anything but `expected` is reported as a bad
/// gateway; the cart service's status is kept for the logs only.
fn expect_status(response: &HttpResponse, expected: u16, what: &str) -> Result<Value> {
    if response.status != expected {
        return Err(Error::new(
            ErrorKind::Upstream,
            format!("{}. Status code: {}", what, response.status),
        ));
    }
    Ok(Value::Null)
}

fn status_only(response: &HttpResponse) -> Result<Value> {
    Ok(json!(response.status))
}

fn respond_status(done: PlanOutput) -> Result<GatewayResponse> {
    let status = done
        .output
        .as_u64()
        .and_then(|s| u16::try_from(s).ok())
        .ok_or_else(|| Error::internal("plan output carries no status"))?;
    Ok(GatewayResponse::status(status))
}
