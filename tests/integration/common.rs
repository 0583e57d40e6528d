//! Common harness for gateway integration tests.

use std::sync::Arc;

use serde_json::{Value, json};
use storefront_edge::fault::FaultInjector;
use storefront_edge::gateway::{Gateway, InboundRequest};
use storefront_edge::tracing_support::InMemoryCollector;
use storefront_edge::transport::{HttpMethod, MockReply, MockTransport};

/// 128-bit trace id used for inbound requests.
pub const TRACE_ID: &str = "463ac35c9f6413ad48485a3953bb6124";

/// Span id of the inbound caller.
pub const SPAN_ID: &str = "a2fb4a1d1a96d312";

pub const CUSTOMER_URL: &str = "http://user/customers/c1";
pub const ADDRESSES_URL: &str = "http://user/customers/c1/addresses";
pub const CARDS_URL: &str = "http://user/customers/c1/cards";
pub const ORDERS_URL: &str = "http://orders/orders";

/// A gateway over a scripted transport, recording spans in memory.
pub struct TestGateway {
    pub gateway: Gateway,
    pub transport: Arc<MockTransport>,
    pub collector: Arc<InMemoryCollector>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_faults(FaultInjector::disabled())
    }

    pub fn with_faults(faults: FaultInjector) -> Self {
        let transport = Arc::new(MockTransport::new());
        let collector = Arc::new(InMemoryCollector::new());
        let gateway = Gateway::builder()
            .transport(transport.clone())
            .collector(collector.clone())
            .fault_injector(faults)
            .build()
            .expect("gateway should build");
        Self {
            gateway,
            transport,
            collector,
        }
    }

    /// Scripts a customer profile whose address and card lookups succeed.
    pub fn script_profile(&self) {
        self.transport.on(
            HttpMethod::Get,
            CUSTOMER_URL,
            MockReply::json(
                200,
                json!({
                    "_links": {
                        "customer": {"href": CUSTOMER_URL},
                        "addresses": {"href": ADDRESSES_URL},
                        "cards": {"href": CARDS_URL},
                    }
                }),
            ),
        );
        self.transport.on(
            HttpMethod::Get,
            ADDRESSES_URL,
            MockReply::json(200, embedded("address", "http://user/addresses/a1")),
        );
        self.transport.on(
            HttpMethod::Get,
            CARDS_URL,
            MockReply::json(200, embedded("card", "http://user/cards/k1")),
        );
    }
}

/// A HAL collection holding one `kind` with a self link.
pub fn embedded(kind: &str, href: &str) -> Value {
    json!({"_embedded": {kind: [{"_links": {"self": {"href": href}}}]}})
}

/// An inbound request carrying `headers`.
pub fn inbound(method: &str, path: &str, headers: &[(&str, &str)]) -> InboundRequest {
    headers
        .iter()
        .fold(InboundRequest::new(method, path), |req, (name, value)| {
            req.with_header(name, *value)
        })
}
