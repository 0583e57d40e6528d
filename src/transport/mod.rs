//! Transport layer for downstream HTTP calls.
//!
//! - [`RestTransport`] (feature `rest`): reqwest-backed transport
//! - [`MockTransport`]: scripted in-memory transport for tests
//!
//! Transports only move bytes. Classifying a status as success or failure
//! is left to the orchestration step that made the call.

mod traits;

#[cfg(feature = "rest")]
mod rest;

mod mock;

pub use mock::{MockReply, MockTransport};
pub use traits::{
    ByteStream, HttpMethod, HttpRequest, HttpResponse, HttpTransport, StreamResponse,
    TransportStats,
};

#[cfg(feature = "rest")]
pub use rest::{RestTransport, RestTransportBuilder};
