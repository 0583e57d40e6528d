//! Fault decisions.

use std::sync::Arc;
use std::time::Duration;

use crate::config::FaultConfig;
use crate::fault::rule::{FaultEffect, FaultRule, FaultTrigger};
use crate::headers::HeaderBag;
use crate::Error;

/// Source of uniform draws in `[0, 1)`.
pub type RandomSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// What the injector sees about one call.
#[derive(Debug, Clone, Copy)]
pub struct FaultContext<'a> {
    /// Orchestration step about to run.
    pub step: &'a str,
    /// Inbound request path.
    pub path: &'a str,
    /// Inbound request headers.
    pub headers: &'a HeaderBag,
}

/// Outcome of evaluating the rule set for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultDecision {
    /// Run the call normally.
    Proceed,
    /// Replace normal behavior with the rule's effect.
    Inject {
        /// Id of the rule that fired.
        rule_id: String,
        /// The effect to apply.
        effect: FaultEffect,
    },
}

impl FaultDecision {
    /// Returns `true` if no rule fired.
    pub fn is_proceed(&self) -> bool {
        matches!(self, FaultDecision::Proceed)
    }

    /// Returns the id of the rule that fired.
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            FaultDecision::Proceed => None,
            FaultDecision::Inject { rule_id, .. } => Some(rule_id),
        }
    }

    /// Returns the error that replaces the call, for pre-call effects.
    pub fn pre_call_error(&self) -> Option<Error> {
        match self {
            FaultDecision::Inject {
                effect: FaultEffect::Crash,
                ..
            } => Some(Error::internal("unexpected internal failure")),
            FaultDecision::Inject {
                effect:
                    FaultEffect::SyntheticError {
                        code,
                        status,
                        message,
                    },
                ..
            } => Some(Error::upstream(*status, message.clone()).with_code(code.clone())),
            FaultDecision::Inject {
                effect: FaultEffect::Delay(_),
                ..
            }
            | FaultDecision::Proceed => None,
        }
    }

    /// Returns the delay applied before the result is returned.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            FaultDecision::Inject {
                effect: FaultEffect::Delay(duration),
                ..
            } => Some(*duration),
            _ => None,
        }
    }
}

/// Stateless evaluator of an ordered fault rule set.
///
/// Rules are gated by the global switch and their own switch, then by their
/// trigger. The first rule that passes wins; no two effects are combined.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use storefront_edge::HeaderBag;
/// use storefront_edge::config::FaultConfig;
/// use storefront_edge::fault::{FaultContext, FaultInjector, FaultRule};
///
/// let config = FaultConfig::builder()
///     .enabled(true)
///     .rules(vec![FaultRule::crash("FE-TE-01").with_enabled(true)])
///     .build();
/// let injector = FaultInjector::new(&config);
///
/// let headers: HeaderBag = [("X-Fault", "FE-TE-01")].into_iter().collect();
/// let ctx = FaultContext { step: "delete-cart-item", path: "/cart/1", headers: &headers };
///
/// assert_eq!(injector.decide(&ctx).rule_id(), Some("FE-TE-01"));
/// ```
#[derive(Clone)]
pub struct FaultInjector {
    enabled: bool,
    rules: Arc<[FaultRule]>,
    random: RandomSource,
}

impl std::fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjector")
            .field("enabled", &self.enabled)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FaultInjector {
    /// Creates an injector for the configured rules.
    pub fn new(config: &FaultConfig) -> Self {
        Self {
            enabled: config.enabled,
            rules: config.rules.clone().into(),
            random: Arc::new(fastrand::f64),
        }
    }

    /// Creates an injector that never fires.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            rules: Arc::from(Vec::new()),
            random: Arc::new(fastrand::f64),
        }
    }

    /// Replaces the source of probability draws.
    #[must_use]
    pub fn with_random_source(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    /// Returns `true` if the global switch is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the rules in evaluation order.
    pub fn rules(&self) -> &[FaultRule] {
        &self.rules
    }

    /// Decides what happens to one call.
    pub fn decide(&self, ctx: &FaultContext<'_>) -> FaultDecision {
        if !self.enabled {
            return FaultDecision::Proceed;
        }

        let Some(rule) = self.rules.iter().find(|rule| self.fires(rule, ctx)) else {
            return FaultDecision::Proceed;
        };

        let effect = rule.effect().clone();
        let delay_ms = match &effect {
            FaultEffect::Delay(d) => u64::try_from(d.as_millis()).unwrap_or(u64::MAX),
            _ => 0,
        };
        tracing::warn!(
            fault_id = rule.id(),
            fault_type = effect.fault_type(),
            delay_ms,
            path = ctx.path,
            step = ctx.step,
            "FAULT_INJECTED"
        );

        FaultDecision::Inject {
            rule_id: rule.id().to_string(),
            effect,
        }
    }

    fn fires(&self, rule: &FaultRule, ctx: &FaultContext<'_>) -> bool {
        if !rule.is_enabled() || !rule.targets(ctx.step) {
            return false;
        }

        match rule.trigger() {
            FaultTrigger::HeaderOrAlways { always } => *always || rule.header_matches(ctx.headers),
            FaultTrigger::Probability {
                percent,
                require_header,
            } => {
                if *require_header && !rule.header_matches(ctx.headers) {
                    return false;
                }
                (self.random)() < percent / 100.0
            }
        }
    }
}
