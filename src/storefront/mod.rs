//! Storefront operations as routes.
//!
//! Each function returns a [`Route`]: the orchestration plan for one
//! storefront operation plus the mapping of its result to the response the
//! browser sees. Identity (customer and session ids) comes from the routing
//! layer's session handling.
//!
//! | Route | Plan |
//! |-------|------|
//! | [`list_orders`] | orders search |
//! | [`place_order`] | customer, then address and card in parallel, then create order |
//! | [`login`] | login, then cart merge |
//! | [`register`] | register, then cart merge |
//! | [`add_to_cart`] / [`update_cart`] | catalogue lookup, then cart write |
//! | [`delete_cart_item`] | cart item delete |
//! | [`card_summary`] / [`default_address`] | customer profile lookups |

mod cart;
mod catalogue;
mod orders;
mod user;

pub use cart::{add_to_cart, delete_cart, delete_cart_item, get_cart, update_cart};
pub use catalogue::{catalogue, tags};
pub use orders::{list_orders, place_order};
pub use user::{add_address, add_card, card_summary, customer, default_address, login, register};

use serde_json::{json, Value};
use url::Url;

use crate::gateway::{GatewayResponse, Route};
use crate::orchestrator::PlanOutput;
use crate::transport::{HttpRequest, HttpResponse};
use crate::{Error, Result};

/// Request builder for a fixed `GET`.
fn get(url: Url) -> impl Fn(&Value) -> Result<HttpRequest> + Send + Sync + 'static {
    move |_: &Value| Ok(HttpRequest::get(url.clone()))
}

/// Request builder for a `GET` of the URL carried by the step input.
fn follow(input: &Value) -> Result<HttpRequest> {
    let href = input
        .as_str()
        .ok_or_else(|| Error::missing_link("no link to follow"))?;
    Ok(HttpRequest::get(Url::parse(href)?))
}

/// Body as JSON, as text when it is not JSON, or `null` when empty.
fn body_value(response: &HttpResponse) -> Value {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(&response.body).unwrap_or_else(|_| Value::String(response.text()))
}

/// Decoder keeping the status and body of any response.
fn passthrough(response: &HttpResponse) -> Result<Value> {
    Ok(json!({ "status": response.status, "body": body_value(response) }))
}

/// Responder for [`passthrough`] output.
fn respond_passthrough(done: PlanOutput) -> Result<GatewayResponse> {
    let status = done.output["status"]
        .as_u64()
        .and_then(|s| u16::try_from(s).ok())
        .ok_or_else(|| Error::internal("plan output carries no status"))?;
    Ok(GatewayResponse::new(status, done.output["body"].clone()))
}

/// Reads a required string at `pointer`.
fn required_link(body: &Value, pointer: &str, what: &str) -> Result<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::missing_link(format!("response is missing the {} link", what)))
}

/// Reads an id that may be a string or a number.
fn id_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Rejects a blank required argument.
fn require(value: &str, message: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_argument(message));
    }
    Ok(())
}
