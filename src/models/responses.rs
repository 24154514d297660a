//! Response models
//!
//! A response snapshot shared by the network path, the cache, and synthetic
//! transports, plus the capability trait they all satisfy.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::Validator;

// == Response Like ==
/// Minimal capability set of an HTTP response.
pub trait ResponseLike {
    fn status(&self) -> StatusCode;

    fn header(&self, name: &str) -> Option<&str>;

    fn body(&self) -> &Bytes;

    fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Body as UTF-8 text, lossily decoded.
    fn text(&self) -> String {
        String::from_utf8_lossy(self.body()).into_owned()
    }

    fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T>
    where
        Self: Sized,
    {
        serde_json::from_slice(self.body())
    }
}

// == Response Source ==
/// Where a response handed to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Fetched from an endpoint during this call
    Network,
    /// Fresh cache hit
    Cache,
    /// Stale cache hit served while a refresh runs
    StaleCache,
}

// == Response ==
/// Snapshot of a received response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: String,
    source: ResponseSource,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, url: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body,
            url: url.into(),
            source: ResponseSource::Network,
        }
    }

    /// URL of the attempt that produced this response.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn source(&self) -> ResponseSource {
        self.source
    }

    pub fn is_from_cache(&self) -> bool {
        self.source != ResponseSource::Network
    }

    pub(crate) fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// Conditional-request tokens advertised by the response.
    pub fn validator(&self) -> Option<Validator> {
        Validator::from_parts(
            self.header(http::header::ETAG.as_str()).map(str::to_string),
            self.header(http::header::LAST_MODIFIED.as_str()).map(str::to_string),
        )
    }

    pub fn into_bytes(self) -> Bytes {
        self.body
    }
}

impl ResponseLike for Response {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn body(&self) -> &Bytes {
        &self.body
    }
}
