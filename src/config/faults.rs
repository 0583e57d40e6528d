//! Fault-injection configuration.

use std::time::Duration;

use super::env;
use crate::fault::FaultRule;

/// Step targeted by the default rule set.
pub const DEFAULT_FAULT_STEP: &str = "delete-cart-item";

/// Default probability of the delay rule, in percent.
pub const DEFAULT_SLEEP_PERCENT: f64 = 10.0;

/// Default delay of the delay rule, in milliseconds.
pub const DEFAULT_SLEEP_MS: u64 = 2000;

/// Configuration for operator-controlled fault injection.
///
/// Nothing fires unless `enabled` is set and the rule itself is enabled.
/// Rules are evaluated in the order given; the first applicable rule wins.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::config::FaultConfig;
///
/// let config = FaultConfig::from_lookup(|key| match key {
///     "FAULTS_ENABLED" | "FAULT_FE_ERROR_ENABLED" => Some("true".to_string()),
///     _ => None,
/// });
///
/// assert!(config.enabled);
/// assert!(config.rule("FE-ERR-01").unwrap().is_enabled());
/// assert!(!config.rule("FE-TE-01").unwrap().is_enabled());
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct FaultConfig {
    /// Global switch.
    #[builder(default = false)]
    pub enabled: bool,

    /// Rules in evaluation order.
    #[builder(default = FaultConfig::default_rules())]
    pub rules: Vec<FaultRule>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FaultConfig {
    /// Creates a configuration with no rules.
    pub fn disabled() -> Self {
        Self::builder().rules(Vec::new()).build()
    }

    /// The storefront rule set, all rules switched off.
    pub fn default_rules() -> Vec<FaultRule> {
        vec![
            FaultRule::crash("FE-TE-01").applies_to(DEFAULT_FAULT_STEP),
            FaultRule::synthetic_error(
                "FE-ERR-01",
                "UPSTREAM_CARTS_FAILURE",
                500,
                "Upstream dependency failure while fetching cart items",
            )
            .applies_to(DEFAULT_FAULT_STEP),
            FaultRule::delay(
                "FE-SLEEP-01",
                Duration::from_millis(DEFAULT_SLEEP_MS),
                DEFAULT_SLEEP_PERCENT,
            )
            .applies_to(DEFAULT_FAULT_STEP),
        ]
    }

    /// Loads the storefront rule set from the given lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let percent = env::number(&lookup, "FAULT_FE_SLEEP_PCT", DEFAULT_SLEEP_PERCENT);
        let sleep_ms = env::number(&lookup, "FAULT_FE_SLEEP_MS", DEFAULT_SLEEP_MS);

        let rules = vec![
            FaultRule::crash("FE-TE-01")
                .with_enabled(env::flag(&lookup, "FAULT_FE_TYPEERROR_ENABLED"))
                .with_always(env::flag(&lookup, "FAULTS_FE_TYPEERROR_ALWAYS"))
                .applies_to(DEFAULT_FAULT_STEP),
            FaultRule::synthetic_error(
                "FE-ERR-01",
                "UPSTREAM_CARTS_FAILURE",
                500,
                "Upstream dependency failure while fetching cart items",
            )
            .with_enabled(env::flag(&lookup, "FAULT_FE_ERROR_ENABLED"))
            .with_always(env::flag(&lookup, "FAULTS_FE_ERROR_ALWAYS"))
            .applies_to(DEFAULT_FAULT_STEP),
            FaultRule::delay("FE-SLEEP-01", Duration::from_millis(sleep_ms), percent)
                .with_enabled(env::flag(&lookup, "FAULT_FE_SLEEP_ENABLED"))
                .with_require_header(env::flag(&lookup, "FAULT_FE_SLEEP_REQUIRE_HEADER"))
                .applies_to(DEFAULT_FAULT_STEP),
        ];

        Self {
            enabled: env::flag(&lookup, "FAULTS_ENABLED"),
            rules,
        }
    }

    /// Loads the storefront rule set from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env::process)
    }

    /// Returns the rule with the given id.
    pub fn rule(&self, id: &str) -> Option<&FaultRule> {
        self.rules.iter().find(|rule| rule.id() == id)
    }
}
