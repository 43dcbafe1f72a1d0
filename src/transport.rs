//! The transport seam: "send a request, receive a response".
//!
//! The executor never touches sockets itself. It hands a fully formed
//! [`TransportRequest`] to a [`Transport`] and gets back a status, headers and a
//! body stream, or a classified [`TransportError`]. [`ReqwestTransport`] is the
//! default implementation.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// An outgoing request body produced chunk by chunk.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// A response body as delivered by the transport.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// How a transport failure should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The attempt ran past its deadline.
    Timeout,
    /// The host name could not be resolved.
    Dns,
    /// Anything else: refused connections, resets, TLS failures, broken bodies.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => f.write_str("timeout"),
            TransportErrorKind::Dns => f.write_str("dns"),
            TransportErrorKind::Other => f.write_str("network"),
        }
    }
}

/// A classified failure raised by a [`Transport`].
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    /// Creates an error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Creates a DNS resolution error.
    pub fn dns(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Dns, message)
    }

    /// Creates an unclassified network error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Returns `true` for [`TransportErrorKind::Timeout`].
    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    /// Returns `true` for [`TransportErrorKind::Dns`].
    pub fn is_dns(&self) -> bool {
        self.kind == TransportErrorKind::Dns
    }
}

/// Body handed to the transport.
pub enum TransportBody {
    /// A complete in-memory body.
    Bytes(Bytes),
    /// A body produced while the request is in flight.
    Stream(BodyStream),
}

impl fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            TransportBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A fully formed request, ready to go on the wire.
#[derive(Debug)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The final URL, query parameters included.
    pub url: Url,
    /// All headers, authorization and content type included.
    pub headers: HeaderMap,
    /// The body, if any.
    pub body: Option<TransportBody>,
}

/// What a transport hands back once the response head has arrived.
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The live response body.
    pub body: ResponseStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends one request and returns the response head plus a body stream.
///
/// Implementations must classify their failures: the retry policy only retries
/// [`TransportErrorKind::Timeout`] and [`TransportErrorKind::Dns`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use callsign::transport::{Transport, TransportError, TransportRequest, TransportResponse};
///
/// struct Offline;
///
/// #[async_trait]
/// impl Transport for Offline {
///     async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
///         Err(TransportError::dns("offline"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// The default [`Transport`], backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = match body {
                TransportBody::Bytes(bytes) => builder.body(bytes),
                TransportBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
            };
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(classify_reqwest_error));

        Ok(TransportResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

/// Maps a `reqwest::Error` onto the retry classification.
///
/// reqwest has no dedicated DNS flag, so the source chain is inspected for the
/// resolver's failure.
pub(crate) fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() || chain_has_timeout(&error) {
        TransportErrorKind::Timeout
    } else if chain_has_dns_failure(&error) {
        TransportErrorKind::Dns
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, error.to_string()).with_source(error)
}

fn source_chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&e| e.source())
}

fn chain_has_timeout(error: &(dyn StdError + 'static)) -> bool {
    source_chain(error).any(|e| {
        e.downcast_ref::<io::Error>()
            .is_some_and(|io| io.kind() == io::ErrorKind::TimedOut)
    })
}

fn chain_has_dns_failure(error: &(dyn StdError + 'static)) -> bool {
    source_chain(error).any(|e| {
        let message = e.to_string();
        message.starts_with("dns error") || message.contains("failed to lookup address")
    })
}
