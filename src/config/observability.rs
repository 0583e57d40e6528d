//! Span collector and propagation settings.

use std::sync::Arc;

use super::env;
use crate::tracing_support::{LoggingCollector, SpanCollector};
use crate::Result;

/// Default Zipkin collector port.
pub const DEFAULT_ZIPKIN_PORT: u16 = 9411;

/// Where finished spans are reported.
///
/// With no Zipkin location, spans are written to the log at `debug`.
#[derive(Debug, Clone, Default, bon::Builder)]
pub struct CollectorConfig {
    /// Zipkin base URL, for example `http://zipkin:9411`.
    #[builder(into)]
    pub zipkin_base_url: Option<String>,
}

impl CollectorConfig {
    /// Loads from `ZIPKIN_BASE_URL`, or `ZIPKIN_HOST` and `ZIPKIN_PORT`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let zipkin_base_url = env::string(&lookup, "ZIPKIN_BASE_URL").or_else(|| {
            env::string(&lookup, "ZIPKIN_HOST").map(|host| {
                let port = env::number(&lookup, "ZIPKIN_PORT", DEFAULT_ZIPKIN_PORT);
                format!("http://{}:{}", host, port)
            })
        });
        Self { zipkin_base_url }
    }

    /// Loads from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env::process)
    }

    /// Builds the collector for `service_name`.
    pub fn build(&self, service_name: &str) -> Result<Arc<dyn SpanCollector>> {
        match self.zipkin_base_url.as_deref() {
            #[cfg(feature = "rest")]
            Some(base) => {
                let url = url::Url::parse(base).map_err(|e| {
                    crate::Error::configuration(format!("invalid Zipkin URL {}: {}", base, e))
                        .with_source(e)
                })?;
                let collector = crate::tracing_support::ZipkinCollector::new(&url, service_name)?;
                tracing::info!(endpoint = %collector.endpoint(), "reporting spans to Zipkin");
                Ok(Arc::new(collector))
            }
            #[cfg(not(feature = "rest"))]
            Some(base) => {
                tracing::warn!(zipkin = base, service_name, "Zipkin reporting needs the `rest` feature; logging spans instead");
                Ok(Arc::new(LoggingCollector))
            }
            None => Ok(Arc::new(LoggingCollector)),
        }
    }
}

/// How trace context is written to outbound calls.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct PropagationConfig {
    /// `tracestate` member name carrying the current span id.
    #[builder(into, default = "frontend".to_string())]
    pub vendor_key: String,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
