//! Failure records: transport failures as data.
//!
//! The tracker never sees exceptions; a failed attempt arrives as a
//! [`Failure`] and classification reads it like any other value. Cancelled
//! requests carry no [`ErrorCode`] at all, which keeps them out of every
//! retryable bucket.

use http::{HeaderMap, StatusCode};

use crate::descriptor::RequestDescriptor;

/// Transport-level error category attached to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    /// The client gave up on the attempt (request deadline fired).
    #[error("request aborted")]
    Aborted,
    /// OS-level connect/read timeout.
    #[error("operation timed out")]
    TimedOut,
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("broken pipe")]
    BrokenPipe,
    /// DNS resolution failed.
    #[error("host not found")]
    HostNotFound,
    #[error("network unreachable")]
    NetworkUnreachable,
    /// TLS negotiation or certificate verification failed.
    #[error("tls failure")]
    Tls,
}

impl ErrorCode {
    /// Whether general network-error semantics allow retrying this code.
    /// A missing host, an unreachable network, and a failed TLS handshake
    /// are permanent as far as a retry loop is concerned.
    pub fn retry_allowed(self) -> bool {
        !matches!(
            self,
            ErrorCode::HostNotFound | ErrorCode::NetworkUnreachable | ErrorCode::Tls
        )
    }
}

/// Status line and headers of a response that was actually received.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// One failed attempt, as seen by the classification predicates.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Absent for user-cancelled requests and host-side construction errors.
    pub code: Option<ErrorCode>,
    /// Present only when the server answered.
    pub response: Option<ResponseParts>,
    /// The descriptor of the attempt that failed.
    pub request: Option<RequestDescriptor>,
    /// Human-readable error text; `is_timeout` substring-matches it.
    pub message: String,
}

impl Failure {
    /// Failure for an attempt that produced no response.
    pub fn from_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            response: None,
            request: None,
            message: message.into(),
        }
    }

    /// Failure for a response the host rejected by status.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            code: None,
            response: Some(ResponseParts {
                status,
                headers: HeaderMap::new(),
            }),
            request: None,
            message: format!("HTTP {}", status),
        }
    }

    pub fn with_request(mut self, descriptor: RequestDescriptor) -> Self {
        self.request = Some(descriptor);
        self
    }

    /// Response status, with 0 standing in for "no response received".
    pub fn status_code(&self) -> u16 {
        self.response
            .as_ref()
            .map(|r| r.status.as_u16())
            .unwrap_or(0)
    }
}
