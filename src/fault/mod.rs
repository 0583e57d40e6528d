//! Operator-controlled fault injection.
//!
//! A [`FaultInjector`] is consulted once per orchestration step. Its
//! [`FaultDecision`] is applied at two points:
//!
//! - **pre-call**: [`FaultEffect::Crash`] and [`FaultEffect::SyntheticError`]
//!   replace the downstream call with an error
//! - **pre-response**: [`FaultEffect::Delay`] holds the obtained result
//!
//! Rules carry no state between calls. The default rule set and its
//! environment switches live in [`FaultConfig`](crate::config::FaultConfig).

mod injector;
mod rule;

pub use injector::{FaultContext, FaultDecision, FaultInjector, RandomSource};
pub use rule::{FaultEffect, FaultRule, FaultTrigger, FAULT_HEADER};
