//! Error kind enumeration for categorizing gateway errors.

/// Broad failure family an [`ErrorKind`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The downstream call never produced a response.
    Transport,
    /// The downstream service answered, but with a failure.
    Upstream,
    /// Orchestration policy or plan structure failed.
    Plan,
    /// The gateway itself rejected or broke the operation.
    Local,
}

/// Categorization of gateway errors.
///
/// This enum provides a stable interface for matching on error types. Transport
/// errors carry no status code; upstream errors usually do, which makes them
/// usable for client-facing status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Connection error (DNS, TLS handshake, refused, reset).
    #[error("connection error")]
    Connection,

    /// Downstream call timed out.
    ///
    /// Timeouts are enforced by the transport; the gateway treats them like
    /// any other transport failure.
    #[error("timeout")]
    Timeout,

    /// Generic transport failure that fits no narrower kind.
    #[error("transport error")]
    Transport,

    /// Downstream service answered with a 4xx or 5xx status.
    #[error("upstream error")]
    Upstream,

    /// Downstream response body could not be parsed.
    #[error("invalid response")]
    InvalidResponse,

    /// The orchestration plan is malformed (empty group, duplicate names).
    #[error("invalid plan")]
    InvalidPlan,

    /// A link or field required from a prior step's output is missing.
    #[error("missing link")]
    MissingLink,

    /// Invalid input supplied by the caller.
    #[error("invalid argument")]
    InvalidArgument,

    /// Caller is not logged in or credentials were rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Configuration error (invalid URL, unparsable setting).
    #[error("configuration error")]
    Configuration,

    /// Internal failure, including injected crashes.
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Returns the failure family of this kind.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::Transport => {
                ErrorCategory::Transport
            }
            ErrorKind::Upstream | ErrorKind::InvalidResponse => ErrorCategory::Upstream,
            ErrorKind::InvalidPlan | ErrorKind::MissingLink => ErrorCategory::Plan,
            ErrorKind::InvalidArgument
            | ErrorKind::Unauthorized
            | ErrorKind::Configuration
            | ErrorKind::Internal => ErrorCategory::Local,
        }
    }

    /// Returns `true` if the downstream call never produced a response.
    #[inline]
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// Returns the default HTTP status code reported to the inbound caller.
    ///
    /// [`Error::status`](crate::Error::status) prefers the upstream status
    /// when one was recorded.
    #[inline]
    pub fn http_status_code(&self) -> u16 {
        match self {
            ErrorKind::Connection | ErrorKind::Transport => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::Upstream | ErrorKind::InvalidResponse => 502,
            ErrorKind::InvalidPlan | ErrorKind::MissingLink => 500,
            ErrorKind::InvalidArgument => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Configuration | ErrorKind::Internal => 500,
        }
    }
}
