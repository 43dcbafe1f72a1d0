//! Per-call request description.
//!
//! A [`RequestSpec`] says what to send: method, path, headers, query
//! parameters, content type and body. The client turns it into a fresh wire
//! request for every attempt.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use url::Url;

use crate::multipart::{self, MultipartForm};
use crate::transport::{BodyStream, TransportBody};
use crate::{Error, Result};

/// Declared content type of a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json; charset=UTF-8`
    Json,
    /// `application/x-www-form-urlencoded`
    FormUrlencoded,
    /// `multipart/form-data`; the boundary is added when the body is encoded.
    MultipartForm,
    /// Any other media type, sent verbatim.
    Custom(String),
}

impl ContentType {
    /// The header value for this content type.
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => "application/json; charset=UTF-8",
            ContentType::FormUrlencoded => "application/x-www-form-urlencoded",
            ContentType::MultipartForm => "multipart/form-data",
            ContentType::Custom(value) => value,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a request.
///
/// Structured values, form fields and multipart forms imply their own
/// `Content-Type`. Raw bodies ([`Bytes`](RequestBody::Bytes),
/// [`Text`](RequestBody::Text), [`Stream`](RequestBody::Stream) and
/// [`StreamFactory`](RequestBody::StreamFactory)) imply none: they are sent
/// without the header unless the request or the client declares a
/// [`ContentType`].
pub enum RequestBody {
    /// Raw bytes, sent as is. No implied content type.
    Bytes(Bytes),
    /// Text, sent as UTF-8. No implied content type.
    Text(String),
    /// A single-use stream. Only the first attempt can send it.
    Stream(BodyStream),
    /// Builds a new stream for every attempt.
    StreamFactory(Box<dyn FnMut() -> BodyStream + Send>),
    /// A value serialized according to the content type (JSON by default).
    Structured(serde_json::Value),
    /// Form fields, sent `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// A multipart form, streamed while it is encoded.
    Multipart(MultipartForm),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream"),
            RequestBody::StreamFactory(_) => f.write_str("StreamFactory"),
            RequestBody::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
            RequestBody::Form(pairs) => f.debug_tuple("Form").field(pairs).finish(),
            RequestBody::Multipart(form) => f.debug_tuple("Multipart").field(form).finish(),
        }
    }
}

impl RequestBody {
    /// Whether every attempt can send this body again.
    pub fn is_replayable(&self) -> bool {
        match self {
            RequestBody::Stream(_) => false,
            RequestBody::Multipart(form) => form.is_replayable(),
            _ => true,
        }
    }

    fn implied_content_type(&self) -> Option<ContentType> {
        match self {
            RequestBody::Structured(_) => Some(ContentType::Json),
            RequestBody::Form(_) => Some(ContentType::FormUrlencoded),
            RequestBody::Multipart(_) => Some(ContentType::MultipartForm),
            _ => None,
        }
    }
}

/// A body ready for the transport, with the content type to announce.
#[derive(Debug)]
pub(crate) struct PreparedBody {
    pub(crate) body: TransportBody,
    pub(crate) content_type: Option<String>,
}

/// Everything needed to make one logical request.
///
/// # Examples
///
/// ```
/// use callsign::request::{ContentType, RequestSpec};
/// use http::Method;
///
/// let spec = RequestSpec::new(Method::POST, "/search")
///     .with_query_param("page", "2")
///     .with_header("x-trace", "abc")?
///     .with_content_type(ContentType::Json)
///     .with_json(&serde_json::json!({ "query": "rust" }))?;
///
/// assert_eq!(spec.query_params["page"], "2");
/// # Ok::<(), callsign::Error>(())
/// ```
#[derive(Debug)]
pub struct RequestSpec {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path, appended to the client's base URL.
    pub path: String,

    /// Headers for this request; they win over the client defaults.
    pub headers: HeaderMap,

    /// Query parameters for this request; they win over the client defaults.
    pub query_params: BTreeMap<String, String>,

    /// Content type for this request; wins over the client default.
    pub content_type: Option<ContentType>,

    /// Per-attempt timeout; wins over the client default.
    pub timeout: Option<Duration>,

    body: Option<RequestBody>,
    body_sent: bool,
}

impl RequestSpec {
    /// Creates a request with the given method and path and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: BTreeMap::new(),
            content_type: None,
            timeout: None,
            body: None,
            body_sent: false,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter, replacing any earlier value for the key.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Adds multiple query parameters.
    pub fn with_query_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Declares the content type of the body.
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Bounds each attempt of this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self.body_sent = false;
        self
    }

    /// Sets a raw byte body.
    pub fn with_bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.with_body(RequestBody::Bytes(bytes.into()))
    }

    /// Sets a text body.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_body(RequestBody::Text(text.into()))
    }

    /// Sets a structured body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if the value cannot be represented.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let value =
            serde_json::to_value(value).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        Ok(self.with_body(RequestBody::Structured(value)))
    }

    /// Sets a form-urlencoded body.
    pub fn with_form<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.with_body(RequestBody::Form(pairs))
    }

    /// Sets a multipart body.
    pub fn with_multipart(self, form: MultipartForm) -> Self {
        self.with_body(RequestBody::Multipart(form))
    }

    /// Sets a single-use streaming body.
    pub fn with_stream(self, stream: BodyStream) -> Self {
        self.with_body(RequestBody::Stream(stream))
    }

    /// Sets a streaming body rebuilt for every attempt.
    pub fn with_stream_factory(self, factory: impl FnMut() -> BodyStream + Send + 'static) -> Self {
        self.with_body(RequestBody::StreamFactory(Box::new(factory)))
    }

    /// The body, if one is set and not yet consumed.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Returns `true` if the request carries a body.
    pub fn has_body(&self) -> bool {
        self.body.is_some() || self.body_sent
    }

    /// Returns `false` once a single-use body has gone out with an attempt.
    pub(crate) fn can_resend(&self) -> bool {
        match &self.body {
            Some(body) => body.is_replayable(),
            None => !self.body_sent,
        }
    }

    /// Encodes the body for one attempt.
    ///
    /// `declared` is the content type chosen by the request or the client.
    /// Single-use bodies are moved out on the first call; later calls fail with
    /// [`Error::BodyNotReplayable`].
    pub(crate) fn prepare_body(
        &mut self,
        declared: Option<&ContentType>,
    ) -> Result<Option<PreparedBody>> {
        let replayable = match &self.body {
            Some(body) => body.is_replayable(),
            None if self.body_sent => return Err(Error::BodyNotReplayable),
            None => return Ok(None),
        };

        let content_type = declared
            .cloned()
            .or_else(|| self.body.as_ref().and_then(RequestBody::implied_content_type));

        if !replayable {
            self.body_sent = true;
            return match self.body.take() {
                Some(RequestBody::Stream(stream)) => Ok(Some(PreparedBody {
                    body: TransportBody::Stream(stream),
                    content_type: content_type.map(|c| c.as_str().to_string()),
                })),
                Some(RequestBody::Multipart(form)) => Ok(Some(encode_multipart(form))),
                _ => Err(Error::BodyNotReplayable),
            };
        }

        match self.body.as_mut() {
            Some(body) => encode_replayable(body, content_type.as_ref()).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

fn encode_replayable(
    body: &mut RequestBody,
    content_type: Option<&ContentType>,
) -> Result<PreparedBody> {
    let encoded = match body {
        RequestBody::Bytes(bytes) => TransportBody::Bytes(bytes.clone()),
        RequestBody::Text(text) => TransportBody::Bytes(Bytes::from(text.clone())),
        RequestBody::StreamFactory(factory) => TransportBody::Stream(factory()),
        RequestBody::Structured(value) => {
            TransportBody::Bytes(serialize_structured(value, content_type)?)
        }
        RequestBody::Form(pairs) => TransportBody::Bytes(Bytes::from(encode_form(
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))),
        RequestBody::Multipart(form) => {
            let form = form.try_clone().ok_or(Error::BodyNotReplayable)?;
            return Ok(encode_multipart(form));
        }
        RequestBody::Stream(_) => return Err(Error::BodyNotReplayable),
    };

    Ok(PreparedBody {
        body: encoded,
        content_type: content_type.map(|c| c.as_str().to_string()),
    })
}

fn encode_multipart(form: MultipartForm) -> PreparedBody {
    let (stream, content_type) = multipart::encode(form);
    PreparedBody {
        body: TransportBody::Stream(Box::pin(stream)),
        content_type: Some(content_type),
    }
}

fn serialize_structured(
    value: &serde_json::Value,
    content_type: Option<&ContentType>,
) -> Result<Bytes> {
    match content_type {
        Some(ContentType::FormUrlencoded) => {
            let object = value.as_object().ok_or_else(|| {
                Error::InvalidBody("form-urlencoded body must be a JSON object".to_string())
            })?;

            let mut pairs = Vec::with_capacity(object.len());
            for (key, value) in object {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Null => String::new(),
                    _ => {
                        return Err(Error::InvalidBody(format!(
                            "form field `{}` must be a scalar",
                            key
                        )))
                    }
                };
                pairs.push((key.as_str(), value));
            }
            Ok(Bytes::from(encode_form(
                pairs.iter().map(|(k, v)| (*k, v.as_str())),
            )))
        }
        Some(ContentType::MultipartForm) => Err(Error::InvalidBody(
            "multipart requests need a MultipartForm body".to_string(),
        )),
        _ => serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::SerializationFailed(e.to_string())),
    }
}

fn encode_form<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

/// Joins `path` onto `base_url` and merges query parameters.
///
/// Parameters already in the URL are kept unless a default or per-request
/// parameter has the same key. Per-request parameters win over defaults. The
/// final query is sorted by key.
pub(crate) fn build_url(
    base_url: &str,
    path: &str,
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", base_url, path))?;

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in defaults.iter().chain(overrides.iter()) {
        pairs.retain(|(existing, _)| existing != key);
        pairs.push((key.clone(), value.clone()));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    Ok(url)
}
