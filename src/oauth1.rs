//! OAuth 1.0a request signing (HMAC-SHA1).
//!
//! [`sign`] produces the value of the `Authorization` header for one request.
//! Every call draws a fresh nonce and timestamp; [`sign_with`] takes them as
//! arguments so that signatures can be reproduced.
//!
//! Query parameters of the signed URL take part in the signature. A query
//! parameter that shares its name with an oauth parameter (say `oauth_nonce`)
//! replaces the oauth value in the base string; callers should not send such
//! parameters.
//!
//! Keys and values are percent-encoded over the RFC 3986 unreserved set, so a
//! space becomes `%20` and `~` stays as is. Form-style query escaping (such as
//! Go's `url.QueryEscape`) writes a space as `+` instead, so a signer built on
//! it produces a different signature for any value containing a space.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;
use url::Url;

use crate::{Error, Result};

/// RFC 3986 unreserved characters stay as they are, everything else is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";

/// OAuth1 consumer and access token credentials.
///
/// The secrets never appear in `Debug` output.
///
/// # Examples
///
/// ```
/// use callsign::oauth1::Credentials;
///
/// let credentials = Credentials::new("consumer-key", "consumer-secret", "token", "token-secret");
/// assert!(!format!("{:?}", credentials).contains("consumer-secret"));
/// ```
#[derive(Clone)]
pub struct Credentials {
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_token_secret: String,
}

impl Credentials {
    /// Creates a set of credentials.
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    fn signing_key(&self) -> String {
        format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.access_token_secret)
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// Signs a request and returns the `Authorization` header value.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if `url` cannot be parsed.
///
/// # Examples
///
/// ```
/// use callsign::oauth1::{sign, Credentials};
/// use http::Method;
///
/// let credentials = Credentials::new("ck", "cs", "at", "ats");
/// let header = sign(&Method::GET, "https://api.example.com/items?page=2", &credentials).unwrap();
///
/// assert!(header.starts_with("OAuth oauth_consumer_key=\"ck\", oauth_nonce=\""));
/// assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
/// ```
pub fn sign(method: &Method, url: &str, credentials: &Credentials) -> Result<String> {
    let nonce = uuid::Uuid::new_v4().to_string();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();

    sign_with(method, url, credentials, &nonce, timestamp)
}

/// Signs a request with a caller-supplied nonce and timestamp.
///
/// Identical inputs produce identical headers.
pub fn sign_with(
    method: &Method,
    url: &str,
    credentials: &Credentials,
    nonce: &str,
    timestamp: u64,
) -> Result<String> {
    let url = Url::parse(url)?;

    let mut params = vec![
        ("oauth_consumer_key", credentials.consumer_key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_token", credentials.access_token.clone()),
        ("oauth_version", VERSION.to_string()),
    ];

    let base = base_string(method, &url, &params);
    let signature = hmac_sha1_base64(&credentials.signing_key(), &base)?;
    params.push(("oauth_signature", signature));

    let mut parts: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, encode(value)))
        .collect();
    parts.sort();

    Ok(format!("OAuth {}", parts.join(", ")))
}

/// Builds the signature base string: method, base URL and the normalized
/// parameter string, each percent-encoded and joined with `&`.
fn base_string(method: &Method, url: &Url, oauth_params: &[(&str, String)]) -> String {
    let mut all: HashMap<String, String> = oauth_params
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();

    // First value wins for repeated query keys; a query key wins over an oauth key.
    let mut seen = HashSet::new();
    for (key, value) in url.query_pairs() {
        if seen.insert(key.clone()) {
            all.insert(key.into_owned(), value.into_owned());
        }
    }

    let mut pairs: Vec<String> = all
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect();
    pairs.sort();

    format!(
        "{}&{}&{}",
        encode(method.as_str()),
        encode(&base_url(url)),
        encode(&pairs.join("&"))
    )
}

/// `scheme://host[:port]/path`, without query or fragment.
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

fn hmac_sha1_base64(key: &str, message: &str) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::ConfigurationError(format!("Invalid signing key: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Published Twitter API walkthrough values, with the form body moved into
    // the query string so that it takes part in the signature.
    const TWITTER_URL: &str = "https://api.twitter.com/1.1/statuses/update.json?include_entities=true&status=Hello%20Ladies%20%2B%20Gentlemen%2C%20a%20signed%20OAuth%20request%21";
    const TWITTER_NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TWITTER_TIMESTAMP: u64 = 1318622958;

    fn twitter_credentials() -> Credentials {
        Credentials::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        )
    }

    #[test]
    fn test_known_signature() {
        let header = sign_with(
            &Method::POST,
            TWITTER_URL,
            &twitter_credentials(),
            TWITTER_NONCE,
            TWITTER_TIMESTAMP,
        )
        .unwrap();

        assert_eq!(
            header,
            "OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\", \
             oauth_nonce=\"kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg\", \
             oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\", \
             oauth_signature_method=\"HMAC-SHA1\", \
             oauth_timestamp=\"1318622958\", \
             oauth_token=\"370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb\", \
             oauth_version=\"1.0\""
        );
    }

    #[test]
    fn test_fixed_nonce_and_timestamp_is_deterministic() {
        let credentials = Credentials::new("ck", "cs", "at", "ats");
        let url = "https://api.example.com/items?b=2&a=1";

        let first = sign_with(&Method::GET, url, &credentials, "nonce", 1700000000).unwrap();
        let second = sign_with(&Method::GET, url, &credentials, "nonce", 1700000000).unwrap();
        assert_eq!(first, second);

        let other_nonce = sign_with(&Method::GET, url, &credentials, "other", 1700000000).unwrap();
        assert_ne!(first, other_nonce);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let credentials = Credentials::new("ck", "cs", "at", "ats");
        let url = "https://api.example.com/items";

        let first = sign(&Method::GET, url, &credentials).unwrap();
        let second = sign(&Method::GET, url, &credentials).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_base_string_strips_query_and_default_port() {
        let url = Url::parse("http://localhost:8080/items?k=2").unwrap();
        let params = vec![
            ("oauth_consumer_key", "ck".to_string()),
            ("oauth_nonce", "n0nce".to_string()),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", "1700000000".to_string()),
            ("oauth_token", "tok".to_string()),
            ("oauth_version", "1.0".to_string()),
        ];

        assert_eq!(
            base_string(&Method::GET, &url, &params),
            "GET&http%3A%2F%2Flocalhost%3A8080%2Fitems&k%3D2%26oauth_consumer_key%3Dck\
             %26oauth_nonce%3Dn0nce%26oauth_signature_method%3DHMAC-SHA1\
             %26oauth_timestamp%3D1700000000%26oauth_token%3Dtok%26oauth_version%3D1.0"
        );

        let default_port = Url::parse("https://example.com:443/a").unwrap();
        assert_eq!(base_url(&default_port), "https://example.com/a");
    }

    #[test]
    fn test_query_parameter_overrides_oauth_parameter() {
        let url = Url::parse("https://example.com/a?oauth_nonce=from-query").unwrap();
        let params = vec![("oauth_nonce", "generated".to_string())];

        let base = base_string(&Method::GET, &url, &params);
        assert!(base.contains("oauth_nonce%3Dfrom-query"));
        assert!(!base.contains("generated"));
    }

    #[test]
    fn test_encoding_uses_rfc3986_unreserved_set() {
        assert_eq!(encode("a b+c~d_e.f-g*"), "a%20b%2Bc~d_e.f-g%2A");
        assert_eq!(encode("é"), "%C3%A9");
    }

    #[test]
    fn test_space_in_query_value_is_signed_as_percent_20() {
        let url = Url::parse("https://example.com/search?q=hello%20world").unwrap();

        let base = base_string(&Method::GET, &url, &[]);
        assert_eq!(
            base,
            "GET&https%3A%2F%2Fexample.com%2Fsearch&q%3Dhello%2520world"
        );
        assert!(!base.contains("%2B"));
    }

    #[test]
    fn test_malformed_url_fails() {
        let credentials = Credentials::new("ck", "cs", "at", "ats");
        let result = sign(&Method::GET, "not a url", &credentials);
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
