//! Response types for the three execution modes.
//!
//! [`Response`] holds a fully drained body, [`StreamingResponse`] keeps the
//! body open for the caller to consume, and [`Decoded`] pairs a buffered
//! response with its JSON-decoded success or error payload. All of them carry
//! the status, headers, latency and attempt count of the exchange.

use std::fmt;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::retry::AttemptOutcome;
use crate::transport::ResponseStream;
use crate::{Error, Result};

/// A response whose body has been read to the end.
///
/// # Examples
///
/// ```no_run
/// use callsign::Client;
///
/// # async fn example() -> Result<(), callsign::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.get("/users/123").send().await?;
///
/// println!("Status: {}", response.status);
/// println!("Request took {:?}", response.latency);
/// println!("Attempts: {}", response.attempts);
///
/// if response.is_success() {
///     println!("Body: {}", response.text());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The raw response body.
    pub body: Bytes,

    /// Time from the start of the first attempt until the body was read,
    /// backoff sleeps included.
    pub latency: Duration,

    /// The number of attempts made to complete this request.
    ///
    /// This will be `1` for requests that succeeded on the first try,
    /// and higher for requests that required retries.
    pub attempts: usize,
}

impl Response {
    /// Creates a new `Response`.
    ///
    /// This is typically called internally by the client once the body has
    /// been drained.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            latency,
            attempts,
        }
    }

    /// Returns `true` for statuses in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }

    /// Returns `true` for statuses in `[400, 500)`.
    pub fn is_client_error(&self) -> bool {
        is_client_error(self.status)
    }

    /// Returns `true` for every status of 500 or above.
    pub fn is_server_error(&self) -> bool {
        is_server_error(self.status)
    }

    /// Returns `true` if the request required retries.
    ///
    /// # Examples
    ///
    /// ```
    /// # use callsign::Response;
    /// # use bytes::Bytes;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Bytes::new(),
    ///     Duration::from_millis(100),
    ///     3,
    /// );
    ///
    /// assert!(response.was_retried());
    /// ```
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use callsign::Response;
    /// # use bytes::Bytes;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new(
    ///     StatusCode::OK,
    ///     headers,
    ///     Bytes::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// assert_eq!(response.header("content-type").unwrap(), "application/json");
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] with the raw body if the body
    /// does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::DeserializationFailed {
            raw_response: self.text(),
            serde_error: e.to_string(),
            status: self.status,
        })
    }
}

impl AttemptOutcome for Response {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn record_attempts(&mut self, attempts: usize) {
        self.attempts = attempts;
    }

    fn into_exhausted(self, attempts: usize) -> Error {
        Error::MaxRetriesExceeded {
            attempts,
            status: self.status,
            headers: self.headers,
            raw_response: self.body,
        }
    }
}

/// A buffered response together with its decoded payload.
///
/// On a success status the body is decoded into `success`, otherwise into
/// `error`. A body that fails to decode leaves its target `None`; the failure
/// is logged and the raw bytes stay available in `response.body`.
#[derive(Debug, Clone)]
pub struct Decoded<S, E> {
    /// The underlying buffered response.
    pub response: Response,

    /// The decoded body of a 2xx response.
    pub success: Option<S>,

    /// The decoded body of any other response.
    pub error: Option<E>,
}

impl<S, E> Decoded<S, E>
where
    S: DeserializeOwned,
    E: DeserializeOwned,
{
    pub(crate) fn from_response(response: Response) -> Self {
        let mut decoded = Self {
            success: None,
            error: None,
            response,
        };

        if decoded.response.body.is_empty() {
            return decoded;
        }

        if decoded.response.is_success() {
            decoded.success = decode_logged(&decoded.response, "success");
        } else {
            decoded.error = decode_logged(&decoded.response, "error");
        }

        decoded
    }
}

impl<S, E> Decoded<S, E> {
    /// The HTTP status code of the response.
    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    /// Returns `true` for statuses in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }
}

fn decode_logged<T: DeserializeOwned>(response: &Response, target: &str) -> Option<T> {
    match response.json::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(
                error = %e,
                status = response.status.as_u16(),
                target = target,
                raw_response = %response.text(),
                "Failed to deserialize response"
            );
            None
        }
    }
}

/// A response whose body is still being received.
///
/// Dropping it releases the underlying connection.
pub struct StreamingResponse {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the start of the first attempt until the response head
    /// arrived.
    pub latency: Duration,

    /// The number of attempts made to get this response.
    pub attempts: usize,

    body: ResponseStream,
}

impl StreamingResponse {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: ResponseStream,
        latency: Duration,
    ) -> Self {
        Self {
            status,
            headers,
            latency,
            attempts: 1,
            body,
        }
    }

    /// Returns `true` for statuses in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }

    /// Returns `true` for statuses in `[400, 500)`.
    pub fn is_client_error(&self) -> bool {
        is_client_error(self.status)
    }

    /// Returns `true` for every status of 500 or above.
    pub fn is_server_error(&self) -> bool {
        is_server_error(self.status)
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }

    /// Takes the live body stream.
    pub fn into_body(self) -> ResponseStream {
        self.body
    }

    /// Reads the rest of the body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection fails mid-body.
    pub async fn bytes(self) -> Result<Bytes> {
        collect_body(self.body).await
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("latency", &self.latency)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

impl AttemptOutcome for StreamingResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn record_attempts(&mut self, attempts: usize) {
        self.attempts = attempts;
    }

    fn into_exhausted(self, attempts: usize) -> Error {
        // The body is dropped here; only the head survives.
        Error::MaxRetriesExceeded {
            attempts,
            status: self.status,
            headers: self.headers,
            raw_response: Bytes::new(),
        }
    }
}

/// Drains a response stream into a single buffer.
pub(crate) async fn collect_body(mut body: ResponseStream) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

fn is_success(status: StatusCode) -> bool {
    (200..300).contains(&status.as_u16())
}

fn is_client_error(status: StatusCode) -> bool {
    (400..500).contains(&status.as_u16())
}

fn is_server_error(status: StatusCode) -> bool {
    status.as_u16() >= 500
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct ApiError {
        message: String,
    }

    fn response(status: u16, body: &'static str) -> Response {
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
            Duration::from_millis(5),
            1,
        )
    }

    #[test]
    fn test_status_helpers() {
        assert!(response(200, "").is_success());
        assert!(response(204, "").is_success());
        assert!(!response(302, "").is_success());
        assert!(response(404, "").is_client_error());
        assert!(!response(404, "").is_server_error());
        assert!(response(500, "").is_server_error());
        assert!(response(503, "").is_server_error());
    }

    #[test]
    fn test_json_failure_keeps_raw_body() {
        let err = response(200, "not json").json::<User>().unwrap_err();
        match err {
            Error::DeserializationFailed {
                raw_response,
                status,
                ..
            } => {
                assert_eq!(raw_response, "not json");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_decoded_success_target() {
        let decoded: Decoded<User, ApiError> =
            Decoded::from_response(response(200, r#"{"id": 7, "name": "Ada"}"#));

        assert_eq!(
            decoded.success,
            Some(User {
                id: 7,
                name: "Ada".to_string()
            })
        );
        assert!(decoded.error.is_none());
    }

    #[test]
    fn test_decoded_error_target() {
        let decoded: Decoded<User, ApiError> =
            Decoded::from_response(response(422, r#"{"message": "name is taken"}"#));

        assert!(decoded.success.is_none());
        assert_eq!(decoded.error.unwrap().message, "name is taken");
        assert_eq!(decoded.response.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_decode_failure_leaves_target_empty() {
        let decoded: Decoded<User, ApiError> =
            Decoded::from_response(response(200, "<html>maintenance</html>"));

        assert!(decoded.success.is_none());
        assert!(decoded.error.is_none());
        assert_eq!(decoded.response.text(), "<html>maintenance</html>");
    }

    #[test]
    fn test_exhausted_buffered_response_keeps_body() {
        let err = response(503, "busy").into_exhausted(4);
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.raw_response(), Some(&b"busy"[..]));
    }

    #[tokio::test]
    async fn test_streaming_body_is_collected() {
        let chunks: Vec<std::result::Result<Bytes, TransportError>> =
            vec![Ok(Bytes::from("hel")), Ok(Bytes::from("lo"))];
        let streaming = StreamingResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Box::pin(futures::stream::iter(chunks)),
            Duration::ZERO,
        );

        assert_eq!(streaming.bytes().await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_streaming_body_error_surfaces() {
        let chunks: Vec<std::result::Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from("partial")),
            Err(TransportError::other("connection reset")),
        ];
        let streaming = StreamingResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Box::pin(futures::stream::iter(chunks)),
            Duration::ZERO,
        );

        assert!(matches!(streaming.bytes().await, Err(Error::Transport(_))));
    }

    #[test]
    fn test_exhausted_streaming_response_drops_body() {
        let streaming = StreamingResponse::new(
            StatusCode::TOO_MANY_REQUESTS,
            HeaderMap::new(),
            Box::pin(futures::stream::empty()),
            Duration::ZERO,
        );

        let err = streaming.into_exhausted(2);
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(err.raw_response(), Some(&b""[..]));
    }
}
