//! Error types for the storefront edge gateway.
//!
//! Every fallible operation returns [`Error`], categorized by [`ErrorKind`].
//! The kinds follow the gateway's failure taxonomy:
//!
//! | Category    | Kinds                                        |
//! |-------------|----------------------------------------------|
//! | Transport   | `Connection`, `Timeout`, `Transport`         |
//! | Upstream    | `Upstream`, `InvalidResponse`                |
//! | Plan        | `InvalidPlan`, `MissingLink`                 |
//! | Local       | `InvalidArgument`, `Unauthorized`, `Configuration`, `Internal` |
//!
//! ## Key Invariant
//!
//! Injected faults produce ordinary errors of these kinds. Nothing above the
//! fault injector can tell a synthetic failure from a real one.
//!
//! ```rust
//! use storefront_edge::{Error, ErrorKind};
//!
//! let err = Error::upstream(503, "orders service unavailable");
//! assert_eq!(err.kind(), ErrorKind::Upstream);
//! assert_eq!(err.status(), 503);
//! ```

mod core;
mod kind;

pub use core::Error;
pub use kind::{ErrorCategory, ErrorKind};

/// A specialized `Result` type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
