//! Error taxonomy of the client engine.
//!
//! Three kinds: terminal session failures ([`Error::Closing`]), per-request
//! failures reported by the runtime ([`Error::Request`]), and synchronous API
//! misuse ([`Error::Configuration`], which never crosses the IPC boundary).
//! The engine recovers nothing locally; every error surfaces to the caller of
//! the awaiter it belongs to.

use std::fmt;

use kestrel_proto::RequestErrorType;

/// The closing-error message used when the stream drops underneath us.
pub(crate) const UNEXPECTED_CLOSE: &str = "The communication layer was unexpectedly closed.";

/// The closing-error message for operations attempted after close.
pub(crate) const CLIENT_CLOSED: &str =
    "Unable to execute requests; the client is closed. Please create a new client.";

/// Typed per-request failure kinds, mapped from the wire enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestErrorKind {
    /// Any other per-request failure reported by the server or runtime.
    Unspecified,
    /// The connection dropped while the request was in flight; retriable at
    /// the caller's discretion.
    Disconnect,
    /// A transaction was aborted server-side (e.g. a watched key changed).
    ExecAbort,
    /// The runtime's per-request timeout elapsed.
    Timeout,
}

impl From<RequestErrorType> for RequestErrorKind {
    fn from(wire: RequestErrorType) -> Self {
        match wire {
            RequestErrorType::Unspecified => RequestErrorKind::Unspecified,
            RequestErrorType::Disconnect => RequestErrorKind::Disconnect,
            RequestErrorType::ExecAbort => RequestErrorKind::ExecAbort,
            RequestErrorType::Timeout => RequestErrorKind::Timeout,
        }
    }
}

impl fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestErrorKind::Unspecified => "request error",
            RequestErrorKind::Disconnect => "connection error",
            RequestErrorKind::ExecAbort => "exec abort error",
            RequestErrorKind::Timeout => "timeout error",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the client engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The session is terminal. Raised synchronously on any call after
    /// close, asynchronously on every live awaiter during close, and when
    /// the runtime reports a closing error or the stream hits EOF.
    Closing(String),
    /// A single request failed; the session stays usable.
    Request {
        kind: RequestErrorKind,
        message: String,
    },
    /// Synchronous misuse of the API.
    Configuration(String),
}

impl Error {
    pub(crate) fn closed_client() -> Self {
        Error::Closing(CLIENT_CLOSED.to_string())
    }

    pub fn is_closing(&self) -> bool {
        matches!(self, Error::Closing(_))
    }

    /// The request-failure kind, if this is a request-level error.
    pub fn request_kind(&self) -> Option<RequestErrorKind> {
        match self {
            Error::Request { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Closing(msg) => write!(f, "closing error: {}", msg),
            Error::Request { kind, message } => write!(f, "{}: {}", kind, message),
            Error::Configuration(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_kind_mapping() {
        assert_eq!(
            RequestErrorKind::from(RequestErrorType::Disconnect),
            RequestErrorKind::Disconnect
        );
        assert_eq!(
            RequestErrorKind::from(RequestErrorType::ExecAbort),
            RequestErrorKind::ExecAbort
        );
        assert_eq!(
            RequestErrorKind::from(RequestErrorType::Timeout),
            RequestErrorKind::Timeout
        );
        assert_eq!(
            RequestErrorKind::from(RequestErrorType::Unspecified),
            RequestErrorKind::Unspecified
        );
    }

    #[test]
    fn display_includes_message() {
        let err = Error::Closing("socket gone".to_string());
        assert!(err.to_string().contains("socket gone"));
        assert!(err.is_closing());

        let err = Error::Request {
            kind: RequestErrorKind::Timeout,
            message: "deadline".to_string(),
        };
        assert!(err.to_string().contains("timeout"));
        assert_eq!(err.request_kind(), Some(RequestErrorKind::Timeout));
    }
}
