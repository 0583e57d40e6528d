//! Gateway builder.

use std::sync::Arc;

use super::{Gateway, GatewayInner};
use crate::config::GatewayConfig;
use crate::fault::FaultInjector;
use crate::orchestrator::Orchestrator;
use crate::tracing_support::{SpanCollector, Tracer};
use crate::transport::HttpTransport;
use crate::Result;

/// Builder for [`Gateway`].
///
/// Every collaborator is optional. Unset ones are derived from the config:
/// the REST transport with the configured timeout, the configured span
/// collector and the configured fault rules.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use storefront_edge::config::GatewayConfig;
/// use storefront_edge::gateway::Gateway;
/// use storefront_edge::tracing_support::InMemoryCollector;
/// use storefront_edge::transport::MockTransport;
///
/// let gateway = Gateway::builder()
///     .config(GatewayConfig::default())
///     .transport(Arc::new(MockTransport::new()))
///     .collector(Arc::new(InMemoryCollector::new()))
///     .build()
///     .unwrap();
///
/// assert_eq!(gateway.config().service_name, "front-end");
/// ```
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    collector: Option<Arc<dyn SpanCollector>>,
    faults: Option<FaultInjector>,
}

impl GatewayBuilder {
    /// Creates a builder with the default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the config.
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the downstream transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the span collector.
    #[must_use]
    pub fn collector(mut self, collector: Arc<dyn SpanCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Sets the fault injector, overriding the configured rules.
    #[must_use]
    pub fn fault_injector(mut self, faults: FaultInjector) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Builds the gateway.
    pub fn build(self) -> Result<Gateway> {
        let config = self.config;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&config)?,
        };
        let collector = match self.collector {
            Some(collector) => collector,
            None => config.collector.build(&config.service_name)?,
        };
        let faults = self
            .faults
            .unwrap_or_else(|| FaultInjector::new(&config.faults));

        if faults.is_enabled() {
            let active: Vec<&str> = faults
                .rules()
                .iter()
                .filter(|rule| rule.is_enabled())
                .map(|rule| rule.id())
                .collect();
            tracing::warn!(rules = ?active, "fault injection enabled");
        }

        let tracer = Tracer::new(collector).with_vendor_key(config.propagation.vendor_key.clone());
        let orchestrator = Orchestrator::new(transport.clone(), tracer, faults);

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                config,
                transport,
                orchestrator,
            }),
        })
    }
}

#[cfg(feature = "rest")]
fn default_transport(config: &GatewayConfig) -> Result<Arc<dyn HttpTransport>> {
    let transport = crate::transport::RestTransport::builder()
        .timeout(config.request_timeout)
        .build()?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "rest"))]
fn default_transport(_config: &GatewayConfig) -> Result<Arc<dyn HttpTransport>> {
    Err(crate::Error::configuration(
        "no transport configured and the `rest` feature is disabled",
    ))
}
