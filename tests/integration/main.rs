//! Integration tests for the storefront edge gateway.
//!
//! Most tests drive a [`Gateway`](storefront_edge::Gateway) over the
//! scripted in-memory transport. The `http_tests` module runs the same
//! flows over the reqwest transport against a local mock server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration
//!
//! # A single module
//! cargo test --test integration fault_tests
//! ```

mod checkout_tests;
mod common;
mod fault_tests;
#[cfg(feature = "rest")]
mod http_tests;
mod orchestration_tests;
mod trace_tests;
