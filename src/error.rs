//! Error types for request execution.
//!
//! Every failure a caller can observe is a variant of [`Error`]. Transport
//! failures keep their classification so the retry policy can tell transient
//! failures (timeouts, DNS lookups) apart from terminal ones.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::transport::{TransportError, TransportErrorKind};

/// The main error type for request execution.
///
/// # Examples
///
/// ```no_run
/// use callsign::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get("/endpoint").send().await {
///     Ok(response) => println!("Status: {}", response.status),
///     Err(Error::MaxRetriesExceeded { attempts, status, .. }) => {
///         eprintln!("Gave up after {} attempts, last status {}", attempts, status);
///     }
///     Err(Error::Transport(e)) if e.is_timeout() => eprintln!("Timed out: {}", e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport failed before a complete response was received.
    ///
    /// Only timeouts and DNS failures are retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The body does not fit the declared content type.
    ///
    /// For example a structured value that is not a flat object sent as
    /// `application/x-www-form-urlencoded`.
    #[error("Invalid body: {0}")]
    InvalidBody(String),

    /// The request body could not be serialized.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Failed to deserialize a response body into the requested type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid configuration was provided, such as an invalid header value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A single-use body was already consumed by an earlier attempt.
    #[error("Request body is a single-use stream and cannot be sent again")]
    BodyNotReplayable,

    /// Every attempt ended in a retryable status and the retry budget ran out.
    ///
    /// The fields describe the response of the final attempt. For streaming
    /// requests the body has already been released and `raw_response` is empty.
    #[error("Max retries exceeded after {attempts} attempts (last status {status})")]
    MaxRetriesExceeded {
        /// The number of attempts made
        attempts: usize,
        /// Status of the last response
        status: StatusCode,
        /// Headers of the last response
        headers: HeaderMap,
        /// Body of the last response
        raw_response: Bytes,
    },
}

impl Error {
    /// Returns `true` if this error is transient and worth another attempt.
    ///
    /// Only transport timeouts and DNS failures qualify. Retryable statuses are
    /// not errors until the retry budget is exhausted, and that is terminal.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsign::Error;
    /// use callsign::transport::TransportError;
    ///
    /// assert!(Error::from(TransportError::timeout("deadline elapsed")).is_retryable());
    /// assert!(Error::from(TransportError::dns("no such host")).is_retryable());
    /// assert!(!Error::from(TransportError::other("connection reset")).is_retryable());
    /// assert!(!Error::BodyNotReplayable.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => matches!(
                e.kind(),
                TransportErrorKind::Timeout | TransportErrorKind::Dns
            ),
            Error::InvalidUrl(_) => false,
            Error::InvalidBody(_) => false,
            Error::SerializationFailed(_) => false,
            Error::DeserializationFailed { .. } => false,
            Error::ConfigurationError(_) => false,
            Error::BodyNotReplayable => false,
            Error::MaxRetriesExceeded { .. } => false,
        }
    }

    /// Returns `true` if the transport gave up waiting.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_timeout())
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::MaxRetriesExceeded { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&[u8]> {
        match self {
            Error::MaxRetriesExceeded { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response.as_bytes()),
            _ => None,
        }
    }
}

/// A specialized `Result` type for request execution.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_transport_errors_are_retryable() {
        assert!(Error::from(TransportError::timeout("slow")).is_retryable());
        assert!(Error::from(TransportError::dns("nxdomain")).is_retryable());
        assert!(!Error::from(TransportError::other("refused")).is_retryable());

        let parse_error = url::Url::parse("not a url").unwrap_err();
        assert!(!Error::InvalidUrl(parse_error).is_retryable());
        assert!(!Error::InvalidBody("nope".to_string()).is_retryable());
    }

    #[test]
    fn test_max_retries_exceeded_exposes_last_response() {
        let err = Error::MaxRetriesExceeded {
            attempts: 4,
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers: HeaderMap::new(),
            raw_response: Bytes::from_static(b"down"),
        };

        assert!(!err.is_retryable());
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.raw_response(), Some(&b"down"[..]));
        assert_eq!(
            err.to_string(),
            "Max retries exceeded after 4 attempts (last status 503 Service Unavailable)"
        );
    }

    #[test]
    fn test_timeout_helper() {
        assert!(Error::from(TransportError::timeout("slow")).is_timeout());
        assert!(!Error::from(TransportError::dns("nxdomain")).is_timeout());
        assert!(!Error::BodyNotReplayable.is_timeout());
    }
}
