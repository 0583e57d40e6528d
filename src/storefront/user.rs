//! Accounts: login, registration and the customer profile.
//!
//! Login and registration both finish by merging the anonymous session
//! cart into the customer's cart. A failed merge does not block a login but
//! does fail a registration.

use serde_json::{json, Value};
use tracing::info;

use super::{body_value, get, id_of};
use crate::config::Endpoints;
use crate::gateway::{GatewayResponse, Route};
use crate::orchestrator::{OrchestrationPlan, PlanOutput, Step};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse};
use crate::{Error, ErrorKind, Result};

const LOGIN_STEP: &str = "login";
const REGISTER_STEP: &str = "register";
const MERGE_STEP: &str = "cart-merge";

// ============================================================================
// Login and registration
// ============================================================================

/// Logs a customer in with the browser's `Authorization` header.
///
/// Answers `200` with `{"id": customer_id}`; every failure is reported as
/// `401`.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::config::Endpoints;
/// use storefront_edge::Error;
///
/// let route = storefront_edge::storefront::login(&Endpoints::default(), "Basic dXNlcjpwYXNz", "s1").unwrap();
/// assert_eq!(route.error_response(&Error::timeout("slow")).status, 401);
/// ```
pub fn login(endpoints: &Endpoints, authorization: &str, session_id: &str) -> Result<Route> {
    let url = endpoints.login_url()?;
    let authorization = authorization.to_string();

    let plan = OrchestrationPlan::new("login")
        .then(
            Step::new(LOGIN_STEP, move |_: &Value| {
                Ok(HttpRequest::get(url.clone()).with_header("Authorization", authorization.clone()))
            })
            .with_decoder(decode_login),
        )
        .then(merge_cart(endpoints, session_id).degrade_to(Value::Null));
    Ok(Route::new(plan, customer_id_from(LOGIN_STEP)).failing_with(401))
}

/// Registers a customer with the browser's form body.
///
/// Answers `200` with `{"id": customer_id}`; every failure is reported as
/// `500`.
pub fn register(endpoints: &Endpoints, registration: Value, session_id: &str) -> Result<Route> {
    let url = endpoints.register_url()?;

    let plan = OrchestrationPlan::new("register")
        .then(
            Step::new(REGISTER_STEP, move |_: &Value| {
                Ok(HttpRequest::new(HttpMethod::Post, url.clone()).with_json(registration.clone()))
            })
            .with_decoder(decode_registration),
        )
        .then(merge_cart(endpoints, session_id));
    Ok(Route::new(plan, customer_id_from(REGISTER_STEP)).failing_with(500))
}

/// Merges the session cart into the cart of the customer id given as input.
/// Any status counts as merged.
fn merge_cart(endpoints: &Endpoints, session_id: &str) -> Step {
    let endpoints = endpoints.clone();
    let session_id = session_id.to_string();
    Step::new(MERGE_STEP, move |customer_id: &Value| {
        let customer_id = customer_id
            .as_str()
            .ok_or_else(|| Error::internal("no customer id to merge the cart into"))?;
        info!(customer_id, session_id = %session_id, "merging carts");
        Ok(HttpRequest::get(endpoints.cart_merge(customer_id, &session_id)?))
    })
    .with_decoder(|response| Ok(json!(response.status)))
}

fn decode_login(response: &HttpResponse) -> Result<Value> {
    if response.status != 200 || body_value(response).is_null() {
        return Err(Error::unauthorized(format!(
            "login returned status {}",
            response.status
        )));
    }
    let body: Value = response.json()?;
    id_of(body.pointer("/user/id"))
        .map(Value::String)
        .ok_or_else(|| Error::unauthorized("login response carries no user id"))
}

fn decode_registration(response: &HttpResponse) -> Result<Value> {
    let body = body_value(response);
    if response.status != 200 || body.is_null() {
        return Err(Error::new(
            ErrorKind::Upstream,
            format!("registration returned status {}", response.status),
        ));
    }
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error.as_str().map_or_else(|| error.to_string(), str::to_string);
        return Err(Error::new(ErrorKind::Upstream, message));
    }
    id_of(body.get("id"))
        .map(Value::String)
        .ok_or_else(|| Error::invalid_response("registration response carries no id"))
}

fn customer_id_from(step: &'static str) -> impl Fn(PlanOutput) -> Result<GatewayResponse> {
    move |done| {
        let id = done.step(step).cloned().unwrap_or(Value::Null);
        Ok(GatewayResponse::new(200, json!({ "id": id })))
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Returns the customer's profile.
pub fn customer(endpoints: &Endpoints, customer_id: &str) -> Result<Route> {
    let plan = OrchestrationPlan::new("customer")
        .then(Step::new("customer", get(endpoints.customer(customer_id)?)));
    Ok(Route::with_status(plan, 200))
}

/// Returns the last four digits of the customer's first card, or
/// `{"status_code": 500}` when there is none.
pub fn card_summary(endpoints: &Endpoints, customer_id: &str) -> Result<Route> {
    let plan = OrchestrationPlan::new("card-summary").then(
        Step::new("customer-cards", get(endpoints.customer_cards(customer_id)?)).with_decoder(
            |response| {
                let card = first_embedded(response, "card")?;
                Ok(match card.get("longNum").and_then(Value::as_str) {
                    Some(number) => json!({ "number": last_four(number) }),
                    None => json!({ "status_code": 500 }),
                })
            },
        ),
    );
    Ok(Route::with_status(plan, 200))
}

/// Returns the customer's first address, or `{"status_code": 500}` when
/// there is none.
pub fn default_address(endpoints: &Endpoints, customer_id: &str) -> Result<Route> {
    let plan = OrchestrationPlan::new("default-address").then(
        Step::new("customer-addresses", get(endpoints.customer_addresses(customer_id)?))
            .with_decoder(|response| {
                Ok(match first_embedded(response, "address")? {
                    Value::Null => json!({ "status_code": 500 }),
                    address => address,
                })
            }),
    );
    Ok(Route::with_status(plan, 200))
}

/// Stores a new address for the customer.
pub fn add_address(endpoints: &Endpoints, customer_id: &str, address: Value) -> Result<Route> {
    let url = endpoints.addresses_url()?;
    create_for_customer("add-address", url, customer_id, address)
}

/// Stores a new card for the customer.
pub fn add_card(endpoints: &Endpoints, customer_id: &str, card: Value) -> Result<Route> {
    let url = endpoints.cards_url()?;
    create_for_customer("add-card", url, customer_id, card)
}

fn create_for_customer(
    name: &'static str,
    url: url::Url,
    customer_id: &str,
    mut record: Value,
) -> Result<Route> {
    let Some(fields) = record.as_object_mut() else {
        return Err(Error::invalid_argument("request body must be a JSON object"));
    };
    fields.insert("userID".to_string(), json!(customer_id));

    let plan = OrchestrationPlan::new(name).then(
        Step::new(name, move |_: &Value| {
            Ok(HttpRequest::new(HttpMethod::Post, url.clone()).with_json(record.clone()))
        })
        .with_decoder(|response| Ok(body_value(response))),
    );
    Ok(Route::with_status(plan, 200))
}

/// First embedded `kind` unless the user service reported an internal
/// error.
fn first_embedded(response: &HttpResponse, kind: &str) -> Result<Value> {
    let body: Value = response.json()?;
    if body.get("status_code").and_then(Value::as_i64) == Some(500) {
        return Ok(Value::Null);
    }
    Ok(body
        .pointer(&format!("/_embedded/{}/0", kind))
        .cloned()
        .unwrap_or(Value::Null))
}

fn last_four(number: &str) -> &str {
    let start = number.char_indices().rev().nth(3).map_or(0, |(i, _)| i);
    &number[start..]
}
