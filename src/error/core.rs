//! The gateway error value.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use super::ErrorKind;

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// A failed downstream call, plan, or route.
///
/// Besides the [`ErrorKind`], an error remembers where it came from: the
/// status the downstream service answered with, the plan step that was
/// running, and an optional machine-readable code that injected faults use.
/// [`status`](Error::status) folds these into the status the inbound caller
/// receives.
///
/// ```rust
/// use storefront_edge::{Error, ErrorKind};
///
/// let err = Error::upstream(404, "customer not found").with_step("customer");
/// assert_eq!(err.kind(), ErrorKind::Upstream);
/// assert_eq!(err.status(), 404);
/// assert_eq!(err.step(), Some("customer"));
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    /// Status answered by the downstream service.
    status: Option<u16>,
    code: Option<String>,
    step: Option<String>,
    source: Option<BoxedSource>,
}

impl Error {
    /// An error of `kind` with no status, code, step or cause attached.
    ///
    /// ```rust
    /// use storefront_edge::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::InvalidArgument, "item id is required");
    /// assert_eq!(err.status(), 400);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self { kind, message: message.into(), status: None, code: None, step: None, source: None }
    }

    /// A downstream service answered `status`.
    pub fn upstream(status: u16, message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Upstream, message).with_status(status)
    }

    /// Category used for matching.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable description without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Status for the inbound caller: the downstream status when one was
    /// recorded, else the kind's default.
    pub fn status(&self) -> u16 {
        self.status.unwrap_or_else(|| self.kind.http_status_code())
    }

    /// Status answered by the downstream service, if it answered.
    pub fn upstream_status(&self) -> Option<u16> {
        self.status
    }

    /// Machine-readable code, set by synthetic faults.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Plan step that was running when the error arose.
    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }

    /// Records the downstream status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a machine-readable code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attributes the error to a plan step. The first attribution sticks.
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step.get_or_insert_with(|| step.into());
        self
    }

    /// Keeps `source` as the underlying cause.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }
}

macro_rules! kind_constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident;)*) => {
        impl Error {
            $(
                $(#[$doc])*
                pub fn $name(message: impl Into<Cow<'static, str>>) -> Self {
                    Self::new(ErrorKind::$kind, message)
                }
            )*
        }
    };
}

kind_constructors! {
    /// The connection could not be made or was dropped.
    connection => Connection;
    /// The downstream call ran past its deadline.
    timeout => Timeout;
    /// Any other failure to obtain a response.
    transport => Transport;
    /// The response body could not be decoded.
    invalid_response => InvalidResponse;
    /// The plan was rejected before it ran.
    invalid_plan => InvalidPlan;
    /// A hypermedia link the next step needs is absent.
    missing_link => MissingLink;
    /// The caller supplied unusable input.
    invalid_argument => InvalidArgument;
    /// The caller is not logged in.
    unauthorized => Unauthorized;
    /// A setting could not be used.
    configuration => Configuration;
    /// The gateway itself failed.
    internal => Internal;
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        if let Some(step) = &self.step {
            write!(f, " [step {step}]")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, kind.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            Io::ConnectionRefused | Io::ConnectionReset | Io::ConnectionAborted | Io::NotConnected => {
                ErrorKind::Connection
            }
            Io::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Internal,
        };
        Error::new(kind, err.to_string()).with_source(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::configuration(format!("invalid URL: {err}")).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::invalid_response(format!("JSON error: {err}")).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_bare_error_has_no_context() {
        let err = Error::new(ErrorKind::InvalidArgument, "item id is required");
        assert_eq!(err.message(), "item id is required");
        assert_eq!(err.upstream_status(), None);
        assert_eq!(err.code(), None);
        assert_eq!(err.step(), None);
        assert!(err.source().is_none());
    }

    #[test_case(Error::upstream(503, "down"), 503 ; "upstream status wins")]
    #[test_case(Error::connection("refused"), 502 ; "connection")]
    #[test_case(Error::timeout("slow"), 504 ; "timeout")]
    #[test_case(Error::unauthorized("who"), 401 ; "unauthorized")]
    #[test_case(Error::internal("crash").with_code("FE-TE-01"), 500 ; "crash")]
    fn test_status_for_caller(err: Error, status: u16) {
        assert_eq!(err.status(), status);
    }

    #[test]
    fn test_innermost_step_is_kept() {
        let err = Error::missing_link("no cards link").with_step("card").with_step("place-order");
        assert_eq!(err.step(), Some("card"));
    }

    #[test]
    fn test_display_includes_status_and_step() {
        let err = Error::upstream(404, "customer not found").with_step("customer");
        assert_eq!(
            err.to_string(),
            "upstream error: customer not found (status 404) [step customer]"
        );
    }

    #[test]
    fn test_from_kind_uses_kind_text() {
        let err = Error::from(ErrorKind::Unauthorized);
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.message(), "unauthorized");
    }

    #[test]
    fn test_io_errors_map_to_transport_kinds() {
        let refused: Error = std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into();
        let timed_out: Error = std::io::Error::from(std::io::ErrorKind::TimedOut).into();
        assert_eq!(refused.kind(), ErrorKind::Connection);
        assert_eq!(timed_out.kind(), ErrorKind::Timeout);
        assert!(refused.source().is_some());
    }

    #[test]
    fn test_bad_json_is_invalid_response() {
        let err: Error = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(err.status(), 502);
    }
}
