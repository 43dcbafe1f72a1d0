//! Request executor with retry logic and rich error handling.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::multipart::MultipartForm;
use crate::oauth1::{self, Credentials};
use crate::request::{build_url, parse_header, ContentType, RequestBody, RequestSpec};
use crate::response::{collect_body, Decoded, StreamingResponse};
use crate::retry::RetryPolicy;
use crate::transport::{BodyStream, ReqwestTransport, Transport, TransportError, TransportRequest};
use crate::{Error, Response, Result};

/// An HTTP client that signs, sends and retries requests.
///
/// The client is designed to be reused across multiple requests. Its
/// configuration is immutable once built and shared by every clone.
///
/// # Examples
///
/// ```no_run
/// use callsign::{Client, RetryPolicy};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct ApiError {
///     message: String,
/// }
///
/// # async fn example() -> Result<(), callsign::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::new(3, Duration::from_millis(500)))
///     .build()?;
///
/// // Buffered
/// let response = client.get("/users/123").send().await?;
/// println!("{} after {} attempts", response.status, response.attempts);
///
/// // Decoded
/// let created = client
///     .post("/users")
///     .json(&CreateUser { name: "Alice".to_string() })
///     .call::<User, ApiError>()
///     .await?;
/// if let Some(user) = created.success {
///     println!("Created user with ID: {}", user.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    default_headers: HeaderMap,
    default_query: BTreeMap<String, String>,
    content_type: Option<ContentType>,
    oauth1: Option<Credentials>,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsign::Client;
    ///
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    /// # Ok::<(), callsign::Error>(())
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The retry policy applied to every request.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry_policy
    }

    /// Sends a request and reads the whole response body.
    ///
    /// Retryable outcomes are retried according to the client's
    /// [`RetryPolicy`]. Any status that is not retried is returned as a
    /// [`Response`], including 4xx.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the joined URL cannot be parsed
    /// - [`Error::Transport`] for network failures (after retries for
    ///   timeouts and DNS failures)
    /// - [`Error::MaxRetriesExceeded`] if every attempt returned a retryable status
    ///
    /// A single-use body ends the loop after the attempt that sent it. A
    /// retryable outcome of that attempt is returned as if the budget had run
    /// out, without a backoff sleep.
    pub async fn send(&self, request: RequestSpec) -> Result<Response> {
        let inner = &*self.inner;
        let started = Instant::now();
        let timeout = request.timeout.or(inner.timeout);
        let method = request.method.clone();
        let path = request.path.clone();
        let mut request = request;
        let resendable = AtomicBool::new(true);
        let resendable = &resendable;

        let result = inner
            .retry_policy
            .run_while(
                move |attempt| {
                    let outgoing = inner.build_attempt(&mut request, attempt);
                    resendable.store(request.can_resend(), Ordering::SeqCst);
                    async move {
                        let outgoing = outgoing?;
                        within(timeout, async move {
                            let head = inner.transport.send(outgoing).await?;
                            let body = collect_body(head.body).await?;
                            let response = Response::new(
                                head.status,
                                head.headers,
                                body,
                                started.elapsed(),
                                1,
                            );
                            log_response(response.status, response.latency, attempt);
                            Ok::<_, Error>(response)
                        })
                        .await
                    }
                },
                move || resendable.load(Ordering::SeqCst),
            )
            .await;

        log_outcome(&method, &path, &result);
        result
    }

    /// Sends a request and decodes the body as JSON.
    ///
    /// A 2xx body is decoded into `S`, any other body into `E`. A body that
    /// does not decode is logged at error level and leaves its target empty;
    /// it never fails the request.
    ///
    /// # Errors
    ///
    /// The same as [`Client::send`].
    pub async fn call<S, E>(&self, request: RequestSpec) -> Result<Decoded<S, E>>
    where
        S: DeserializeOwned,
        E: DeserializeOwned,
    {
        let response = self.send(request).await?;
        Ok(Decoded::from_response(response))
    }

    /// Sends a request and returns as soon as the response head arrives.
    ///
    /// The body of every discarded attempt is dropped before the next one
    /// starts. The per-attempt timeout covers the response head only.
    ///
    /// # Errors
    ///
    /// The same as [`Client::send`]. When retries run out on a retryable
    /// status, the error carries an empty `raw_response`.
    pub async fn stream(&self, request: RequestSpec) -> Result<StreamingResponse> {
        let inner = &*self.inner;
        let started = Instant::now();
        let timeout = request.timeout.or(inner.timeout);
        let method = request.method.clone();
        let path = request.path.clone();
        let mut request = request;
        let resendable = AtomicBool::new(true);
        let resendable = &resendable;

        let result = inner
            .retry_policy
            .run_while(
                move |attempt| {
                    let outgoing = inner.build_attempt(&mut request, attempt);
                    resendable.store(request.can_resend(), Ordering::SeqCst);
                    async move {
                        let outgoing = outgoing?;
                        let head = within(timeout, async move {
                            inner.transport.send(outgoing).await.map_err(Error::from)
                        })
                        .await?;
                        let latency = started.elapsed();
                        log_response(head.status, latency, attempt);
                        Ok::<_, Error>(StreamingResponse::new(
                            head.status,
                            head.headers,
                            head.body,
                            latency,
                        ))
                    }
                },
                move || resendable.load(Ordering::SeqCst),
            )
            .await;

        match &result {
            Ok(response) => tracing::debug!(
                method = %method,
                path = %path,
                status = response.status.as_u16(),
                attempts = response.attempts,
                "Streaming response ready"
            ),
            Err(e) => tracing::debug!(
                method = %method,
                path = %path,
                error = %e,
                "Streaming request failed"
            ),
        }
        result
    }

    /// Starts a request with the given method, bound to this client.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            spec: Ok(RequestSpec::new(method, path)),
        }
    }

    /// Starts a GET request to the specified path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use callsign::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), callsign::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user: User = client.get("/users/123").send().await?.json()?;
    /// println!("User: {}", user.name);
    /// # Ok(())
    /// # }
    /// ```
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    /// Starts a POST request to the specified path.
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request to the specified path.
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH request to the specified path.
    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    /// Starts a DELETE request to the specified path.
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }
}

impl ClientInner {
    /// Builds the wire request for one attempt.
    ///
    /// Order matters: the URL is merged first, then signed, then headers are
    /// layered (signature, client defaults, per-request), and the content type
    /// is set last.
    fn build_attempt(&self, request: &mut RequestSpec, attempt: usize) -> Result<TransportRequest> {
        let url = build_url(
            &self.base_url,
            &request.path,
            &self.default_query,
            &request.query_params,
        )?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let mut headers = HeaderMap::new();
        if let Some(credentials) = &self.oauth1 {
            let authorization = oauth1::sign(&request.method, url.as_str(), credentials)?;
            headers.insert(AUTHORIZATION, sensitive_value(&authorization)?);
        }
        headers.extend(self.default_headers.clone());
        headers.extend(request.headers.clone());

        let declared = request
            .content_type
            .clone()
            .or_else(|| self.content_type.clone());

        let body = match request.prepare_body(declared.as_ref())? {
            Some(prepared) => {
                if let Some(content_type) = prepared.content_type {
                    let value = HeaderValue::try_from(content_type).map_err(|e| {
                        Error::ConfigurationError(format!("Invalid content type: {}", e))
                    })?;
                    headers.insert(CONTENT_TYPE, value);
                }
                Some(prepared.body)
            }
            None => None,
        };

        Ok(TransportRequest {
            method: request.method.clone(),
            url,
            headers,
            body,
        })
    }
}

/// Bounds `future` by the per-attempt timeout, if one is configured.
async fn within<T, F>(timeout: Option<Duration>, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
            Error::from(TransportError::timeout(format!(
                "no response within {}ms",
                limit.as_millis()
            )))
        })?,
        None => future.await,
    }
}

fn log_response(status: http::StatusCode, latency: Duration, attempt: usize) {
    tracing::info!(
        status = status.as_u16(),
        latency_ms = latency.as_millis() as u64,
        attempts = attempt + 1,
        "Received HTTP response"
    );
}

fn log_outcome(method: &Method, path: &str, result: &Result<Response>) {
    match result {
        Ok(response) if response.is_client_error() => tracing::warn!(
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            "Client error (4xx)"
        ),
        Ok(_) => {}
        Err(e) => tracing::error!(
            method = %method,
            path = %path,
            error = %e,
            "Request failed"
        ),
    }
}

fn sensitive_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self
            .inner
            .default_headers
            .keys()
            .map(|name| name.as_str())
            .collect();

        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("default_headers", &header_names)
            .field("default_query", &self.inner.default_query)
            .field("content_type", &self.inner.content_type)
            .field("oauth1", &self.inner.oauth1.is_some())
            .field("retry_policy", &self.inner.retry_policy)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

/// A request bound to a [`Client`], built with chained calls.
///
/// Errors from setters such as [`RequestBuilder::header`] are held until the
/// request is sent.
#[must_use = "a request does nothing until it is sent"]
pub struct RequestBuilder<'a> {
    client: &'a Client,
    spec: Result<RequestSpec>,
}

impl<'a> RequestBuilder<'a> {
    fn map(self, f: impl FnOnce(RequestSpec) -> Result<RequestSpec>) -> Self {
        Self {
            client: self.client,
            spec: self.spec.and_then(f),
        }
    }

    /// Adds a header, replacing any client default of the same name.
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|spec| spec.with_header(name, value))
    }

    /// Adds a query parameter, replacing any client default with the same key.
    pub fn query_param(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.map(|spec| Ok(spec.with_query_param(key, value)))
    }

    /// Declares the body's content type, overriding the client's.
    pub fn content_type(self, content_type: ContentType) -> Self {
        self.map(|spec| Ok(spec.with_content_type(content_type)))
    }

    /// Overrides the client's per-attempt timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|spec| Ok(spec.with_timeout(timeout)))
    }

    /// Sets the body.
    pub fn body(self, body: RequestBody) -> Self {
        self.map(|spec| Ok(spec.with_body(body)))
    }

    /// Sets a structured body, sent as JSON unless declared otherwise.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.map(|spec| spec.with_json(value))
    }

    /// Sets a form-urlencoded body.
    pub fn form<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.map(|spec| Ok(spec.with_form(pairs)))
    }

    /// Sets a raw body.
    pub fn bytes(self, bytes: impl Into<bytes::Bytes>) -> Self {
        self.map(|spec| Ok(spec.with_bytes(bytes)))
    }

    /// Sets a text body.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.map(|spec| Ok(spec.with_text(text)))
    }

    /// Sets a multipart body.
    pub fn multipart(self, form: MultipartForm) -> Self {
        self.map(|spec| Ok(spec.with_multipart(form)))
    }

    /// Sets a single-use streaming body.
    pub fn stream_body(self, stream: BodyStream) -> Self {
        self.map(|spec| Ok(spec.with_stream(stream)))
    }

    /// Returns the request built so far.
    pub fn build(self) -> Result<RequestSpec> {
        self.spec
    }

    /// Sends the request in buffered mode. See [`Client::send`].
    pub async fn send(self) -> Result<Response> {
        self.client.send(self.spec?).await
    }

    /// Sends the request in decoded mode. See [`Client::call`].
    pub async fn call<S, E>(self) -> Result<Decoded<S, E>>
    where
        S: DeserializeOwned,
        E: DeserializeOwned,
    {
        self.client.call(self.spec?).await
    }

    /// Sends the request in streaming mode. See [`Client::stream`].
    pub async fn stream(self) -> Result<StreamingResponse> {
        self.client.stream(self.spec?).await
    }
}

impl fmt::Debug for RequestBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```
/// use callsign::{ClientBuilder, ContentType, RetryPolicy};
/// use std::time::Duration;
///
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::new(5, Duration::from_millis(200)))
///     .default_header("User-Agent", "my-app/1.0")?
///     .query_param("api_version", "2")
///     .content_type(ContentType::Json)
///     .bearer_auth("token")?
///     .build()?;
/// # Ok::<(), callsign::Error>(())
/// ```
pub struct ClientBuilder {
    base_url: Option<String>,
    default_headers: HeaderMap,
    default_query: BTreeMap<String, String>,
    content_type: Option<ContentType>,
    oauth1: Option<Credentials>,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            default_query: BTreeMap::new(),
            content_type: None,
            oauth1: None,
            retry_policy: RetryPolicy::default(),
            timeout: None,
            transport: None,
        }
    }

    /// Sets the base URL that request paths are appended to.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        Url::parse(url.as_ref())?;
        self.base_url = Some(url.as_ref().to_string());
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter sent with every request.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_query.insert(key.into(), value.into());
        self
    }

    /// Sets the content type used for bodies that do not declare one.
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Sends `Authorization: Basic ...` with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoded credentials are not a valid header value.
    pub fn basic_auth(
        mut self,
        username: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<Self> {
        let encoded = STANDARD.encode(format!("{}:{}", username.as_ref(), password.as_ref()));
        let value = sensitive_value(&format!("Basic {}", encoded))?;
        self.default_headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value.
    pub fn bearer_auth(mut self, token: impl AsRef<str>) -> Result<Self> {
        let value = sensitive_value(&format!("Bearer {}", token.as_ref()))?;
        self.default_headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Signs every request with OAuth1 HMAC-SHA1.
    pub fn oauth1(mut self, credentials: Credentials) -> Self {
        self.oauth1 = Some(credentials);
        self
    }

    /// Sets the retry policy. Defaults to 3 retries with a 1s base backoff.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the timeout for each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the default reqwest-backed transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let http_client = reqwest::Client::builder().build().map_err(|e| {
                    Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
                })?;
                Arc::new(ReqwestTransport::from(http_client))
            }
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                default_headers: self.default_headers,
                default_query: self.default_query,
                content_type: self.content_type,
                oauth1: self.oauth1,
                retry_policy: self.retry_policy,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::builder()
            .base_url("http://localhost:8080")
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_base_url_is_required() {
        let result = Client::builder().build();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = Client::builder().base_url("not a url");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_headers_layer_defaults_then_request() {
        let client = Client::builder()
            .base_url("http://localhost:8080")
            .unwrap()
            .default_header("x-env", "prod")
            .unwrap()
            .default_header("x-team", "core")
            .unwrap()
            .build()
            .unwrap();

        let mut spec = RequestSpec::new(Method::GET, "/items")
            .with_header("x-env", "staging")
            .unwrap();
        let outgoing = client.inner.build_attempt(&mut spec, 0).unwrap();

        assert_eq!(outgoing.headers["x-env"], "staging");
        assert_eq!(outgoing.headers["x-team"], "core");
        assert!(outgoing.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_request_content_type_overrides_client() {
        let client = Client::builder()
            .base_url("http://localhost:8080")
            .unwrap()
            .content_type(ContentType::FormUrlencoded)
            .build()
            .unwrap();

        let mut form = RequestSpec::new(Method::POST, "/items")
            .with_json(&serde_json::json!({ "a": 1 }))
            .unwrap();
        let outgoing = client.inner.build_attempt(&mut form, 0).unwrap();
        assert_eq!(
            outgoing.headers[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );

        let mut json = RequestSpec::new(Method::POST, "/items")
            .with_content_type(ContentType::Json)
            .with_json(&serde_json::json!({ "a": 1 }))
            .unwrap();
        let outgoing = client.inner.build_attempt(&mut json, 0).unwrap();
        assert_eq!(
            outgoing.headers[CONTENT_TYPE],
            "application/json; charset=UTF-8"
        );
    }

    #[test]
    fn test_oauth_signs_merged_url() {
        let client = Client::builder()
            .base_url("http://localhost:8080")
            .unwrap()
            .query_param("k", "1")
            .oauth1(Credentials::new("ck", "cs", "at", "ats"))
            .build()
            .unwrap();

        let mut spec = RequestSpec::new(Method::GET, "/items").with_query_param("k", "2");
        let outgoing = client.inner.build_attempt(&mut spec, 0).unwrap();

        assert_eq!(outgoing.url.as_str(), "http://localhost:8080/items?k=2");
        let authorization = outgoing.headers[AUTHORIZATION].to_str().unwrap();
        assert!(authorization.starts_with("OAuth oauth_consumer_key=\"ck\""));
        assert!(outgoing.headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_basic_auth_header() {
        let client = Client::builder()
            .base_url("http://localhost:8080")
            .unwrap()
            .basic_auth("aladdin", "opensesame")
            .unwrap()
            .build()
            .unwrap();

        let mut spec = RequestSpec::new(Method::GET, "/");
        let outgoing = client.inner.build_attempt(&mut spec, 0).unwrap();
        assert_eq!(
            outgoing.headers[AUTHORIZATION],
            "Basic YWxhZGRpbjpvcGVuc2VzYW1l"
        );
    }

    #[test]
    fn test_builder_error_is_deferred_to_send() {
        let client = client();
        let builder = client.get("/items").header("bad header", "x");
        assert!(matches!(builder.build(), Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let client = Client::builder()
            .base_url("http://localhost:8080")
            .unwrap()
            .bearer_auth("s3cr3t-token")
            .unwrap()
            .oauth1(Credentials::new("ck", "consumer-secret", "at", "ats"))
            .build()
            .unwrap();

        let debug = format!("{:?}", client);
        assert!(debug.contains("authorization"));
        assert!(!debug.contains("s3cr3t-token"));
        assert!(!debug.contains("consumer-secret"));
    }
}
