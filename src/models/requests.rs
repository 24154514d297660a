//! Request options and bodies
//!
//! Defines what a caller can say about one logical request: method, headers,
//! body, retry budget, cache directive, status validator, and cancellation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use tokio_util::sync::CancellationToken;

// == Request Body ==
/// Outbound request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent verbatim
    Text(String),
    /// Serialized as JSON, with `Content-Type: application/json` by default
    Json(serde_json::Value),
}

impl RequestBody {
    /// Deterministic serialization used in cache keys.
    pub fn fingerprint(&self) -> String {
        match self {
            RequestBody::Text(text) => text.clone(),
            RequestBody::Json(value) => value.to_string(),
        }
    }

    /// Wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Text(text) => Bytes::from(text.clone()),
            RequestBody::Json(value) => Bytes::from(value.to_string()),
        }
    }

    /// Content type implied by the body kind.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Text(_) => None,
            RequestBody::Json(_) => Some("application/json"),
        }
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

// == Status Validator ==
/// Caller-supplied predicate classifying a status as success.
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(StatusCode) -> bool + Send + Sync>);

impl StatusValidator {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn accepts(&self, status: StatusCode) -> bool {
        (self.0)(status)
    }
}

impl Default for StatusValidator {
    /// Accepts 2xx.
    fn default() -> Self {
        Self::new(|status| status.is_success())
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusValidator(..)")
    }
}

// == Request Options ==
/// Per-request settings. Unset fields fall back to the client configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    /// Retries after the first attempt
    pub retries: Option<u32>,
    /// Base delay of the exponential backoff
    pub retry_delay: Option<Duration>,
    /// Upper bound on a single backoff delay
    pub max_retry_delay: Option<Duration>,
    /// Enable or disable caching for this request
    pub cache: Option<bool>,
    /// Hard TTL of the cached response
    pub cache_time: Option<Duration>,
    pub cache_tags: Vec<String>,
    /// Serve stale responses while refreshing in the background
    pub stale_while_revalidate: Option<bool>,
    /// Soft cutoff after which the cached response is stale
    pub cache_max_age: Option<Duration>,
    pub validate_status: Option<StatusValidator>,
    /// Aborts the request when cancelled
    pub signal: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = Some(delay);
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    pub fn cache_time(mut self, ttl: Duration) -> Self {
        self.cache_time = Some(ttl);
        self
    }

    pub fn cache_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = Some(enabled);
        self
    }

    pub fn cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = Some(max_age);
        self
    }

    pub fn validate_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(StatusValidator::new(predicate));
        self
    }

    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.signal = Some(token);
        self
    }
}
