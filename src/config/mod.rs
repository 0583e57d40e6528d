//! Configuration types for the gateway.
//!
//! This module provides configuration for:
//! - [`Endpoints`]: where the storefront backends live
//! - [`FaultConfig`]: operator-controlled fault injection
//! - [`CollectorConfig`]: where finished spans are reported
//! - [`PropagationConfig`]: outbound trace header details
//!
//! Every type can be built in code through its builder, or loaded from the
//! environment with `from_env`. The `from_lookup` variants take any key
//! lookup so loading is testable without touching process state.

mod endpoints;
mod env;
mod faults;
mod observability;

use std::time::Duration;

pub use endpoints::Endpoints;
pub use faults::{DEFAULT_FAULT_STEP, DEFAULT_SLEEP_MS, DEFAULT_SLEEP_PERCENT, FaultConfig};
pub use observability::{CollectorConfig, DEFAULT_ZIPKIN_PORT, PropagationConfig};

use crate::logging::LogFormat;

/// Top-level gateway configuration.
///
/// ## Default Values
///
/// - `service_name`: `front-end`
/// - `request_timeout`: 30s
/// - `log_format`: text
/// - faults globally disabled, spans logged at `debug`
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use storefront_edge::config::{Endpoints, GatewayConfig};
///
/// let config = GatewayConfig::builder()
///     .service_name("edge")
///     .endpoints(Endpoints::for_domain(Some("shop.svc")))
///     .request_timeout(Duration::from_secs(5))
///     .build();
///
/// assert_eq!(config.service_name, "edge");
/// assert!(!config.faults.enabled);
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct GatewayConfig {
    /// Service name reported on spans and logs.
    #[builder(into, default = "front-end".to_string())]
    pub service_name: String,

    /// Downstream service locations.
    #[builder(default)]
    pub endpoints: Endpoints,

    /// Fault rules.
    #[builder(default)]
    pub faults: FaultConfig,

    /// Span reporting.
    #[builder(default)]
    pub collector: CollectorConfig,

    /// Outbound propagation details.
    #[builder(default)]
    pub propagation: PropagationConfig,

    /// Timeout applied to each downstream call by the transport.
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,

    /// Log output format.
    #[builder(default)]
    pub log_format: LogFormat,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GatewayConfig {
    /// Loads every section from the given lookup.
    ///
    /// Reads `SERVICE_NAME`, `REQUEST_TIMEOUT_MS` and `LOG_FORMAT` here, and
    /// delegates the rest to the section loaders.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let timeout_ms = env::number(
            &lookup,
            "REQUEST_TIMEOUT_MS",
            u64::try_from(defaults.request_timeout.as_millis()).unwrap_or(u64::MAX),
        );
        let log_format = match env::string(&lookup, "LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("text") | None => LogFormat::Text,
            Some(other) => {
                tracing::warn!(value = other, "unknown LOG_FORMAT, using text");
                LogFormat::Text
            }
        };

        Self {
            service_name: env::string(&lookup, "SERVICE_NAME").unwrap_or(defaults.service_name),
            endpoints: Endpoints::from_lookup(&lookup),
            faults: FaultConfig::from_lookup(&lookup),
            collector: CollectorConfig::from_lookup(&lookup),
            propagation: defaults.propagation,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format,
        }
    }

    /// Loads every section from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env::process)
    }
}
