//! Fault rules.

use std::time::Duration;

use crate::headers::HeaderBag;

/// Request header naming the fault a caller asks for.
pub const FAULT_HEADER: &str = "x-fault";

/// What a matching rule does to the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultEffect {
    /// Fail the step as if the gateway itself broke.
    Crash,
    /// Fail the step with a synthetic upstream error, skipping the call.
    SyntheticError {
        /// Machine-readable error code.
        code: String,
        /// Status reported to the caller.
        status: u16,
        /// Human-readable message.
        message: String,
    },
    /// Hold the obtained result for a while before returning it.
    Delay(Duration),
}

impl FaultEffect {
    /// Returns the operator-facing fault type label.
    pub fn fault_type(&self) -> &'static str {
        match self {
            FaultEffect::Crash => "crash",
            FaultEffect::SyntheticError { .. } => "error",
            FaultEffect::Delay(_) => "tail_latency",
        }
    }
}

/// When a rule applies, beyond its enable switches.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultTrigger {
    /// The fault header names the rule, or the override is set.
    HeaderOrAlways {
        /// Fire regardless of the header.
        always: bool,
    },
    /// A random draw below `percent` / 100. Only delay rules use this.
    Probability {
        /// Chance of firing, in percent.
        percent: f64,
        /// Also require the fault header to name the rule.
        require_header: bool,
    },
}

/// One fault rule: an id, enable switch, trigger, effect and scope.
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use storefront_edge::fault::FaultRule;
///
/// let rule = FaultRule::delay("FE-SLEEP-01", Duration::from_secs(2), 10.0)
///     .with_enabled(true)
///     .applies_to("delete-cart-item");
///
/// assert!(rule.targets("delete-cart-item"));
/// assert!(!rule.targets("list-orders"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRule {
    id: String,
    enabled: bool,
    trigger: FaultTrigger,
    effect: FaultEffect,
    steps: Vec<String>,
}

impl FaultRule {
    /// Creates a disabled crash rule triggered by header or override.
    pub fn crash(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: false,
            trigger: FaultTrigger::HeaderOrAlways { always: false },
            effect: FaultEffect::Crash,
            steps: Vec::new(),
        }
    }

    /// Creates a disabled synthetic-error rule triggered by header or override.
    pub fn synthetic_error(
        id: impl Into<String>,
        code: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            enabled: false,
            trigger: FaultTrigger::HeaderOrAlways { always: false },
            effect: FaultEffect::SyntheticError {
                code: code.into(),
                status,
                message: message.into(),
            },
            steps: Vec::new(),
        }
    }

    /// Creates a disabled delay rule firing with `percent` probability.
    pub fn delay(id: impl Into<String>, duration: Duration, percent: f64) -> Self {
        Self {
            id: id.into(),
            enabled: false,
            trigger: FaultTrigger::Probability {
                percent: percent.clamp(0.0, 100.0),
                require_header: false,
            },
            effect: FaultEffect::Delay(duration),
            steps: Vec::new(),
        }
    }

    /// Sets the per-rule switch.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the override flag of a header-triggered rule.
    ///
    /// Has no effect on probability-triggered rules.
    #[must_use]
    pub fn with_always(mut self, value: bool) -> Self {
        if let FaultTrigger::HeaderOrAlways { ref mut always } = self.trigger {
            *always = value;
        }
        self
    }

    /// Makes a probability-triggered rule also require the fault header.
    ///
    /// Has no effect on header-triggered rules.
    #[must_use]
    pub fn with_require_header(mut self, value: bool) -> Self {
        if let FaultTrigger::Probability {
            ref mut require_header,
            ..
        } = self.trigger
        {
            *require_header = value;
        }
        self
    }

    /// Restricts the rule to the named step. May be called repeatedly.
    #[must_use]
    pub fn applies_to(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Returns the rule id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` if the per-rule switch is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the trigger.
    pub fn trigger(&self) -> &FaultTrigger {
        &self.trigger
    }

    /// Returns the effect.
    pub fn effect(&self) -> &FaultEffect {
        &self.effect
    }

    /// Returns `true` if the rule covers `step`. Unscoped rules cover all.
    pub fn targets(&self, step: &str) -> bool {
        self.steps.is_empty() || self.steps.iter().any(|s| s == step)
    }

    /// Returns `true` if the fault header names this rule.
    pub fn header_matches(&self, headers: &HeaderBag) -> bool {
        headers
            .get(FAULT_HEADER)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(&self.id))
    }
}
