//! Scripted transport for tests and offline use.
//!
//! Responses come from a handler closure instead of the network, and every
//! call is recorded with the instant it was made.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::models::{Response, ResponseLike};
use crate::transport::{Transport, TransportRequest};

// == Mock Response ==
/// Synthetic response produced without a network exchange.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl MockResponse {
    /// Unknown status codes become 500.
    pub fn new(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn with_text(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = Bytes::from(value.to_string());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn into_response(self, url: impl Into<String>) -> Response {
        Response::new(self.status, self.headers, self.body, url)
    }
}

impl ResponseLike for MockResponse {
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

// == Recorded Call ==
/// A request observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub at: Instant,
}

type Handler = dyn Fn(&TransportRequest) -> Result<MockResponse, TransportError> + Send + Sync;

// == Mock Transport ==
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    latency: Duration,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&TransportRequest) -> Result<MockResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            latency: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every request with `response`.
    pub fn always(response: MockResponse) -> Self {
        Self::from_fn(move |_| Ok(response.clone()))
    }

    /// Fails every request with `error`.
    pub fn failing(error: TransportError) -> Self {
        Self::from_fn(move |_| Err(error.clone()))
    }

    /// Replays `script` in order, repeating the last item once exhausted.
    pub fn sequence(script: Vec<Result<MockResponse, TransportError>>) -> Self {
        let script = Arc::new(script);
        let cursor = Arc::new(Mutex::new(0usize));
        Self::from_fn(move |_| {
            let mut index = cursor.lock().unwrap_or_else(PoisonError::into_inner);
            let item = script
                .get(*index)
                .or_else(|| script.last())
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Request("empty mock script".to_string())));
            *index += 1;
            item
        })
    }

    /// Delays every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of calls whose URL starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.url.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                method: request.method.clone(),
                url: request.url.clone(),
                headers: request.headers.clone(),
                at: Instant::now(),
            });

        if !self.latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(TransportError::Request("request cancelled".to_string()));
                }
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        (self.handler)(&request).map(|mock| mock.into_response(request.url.clone()))
    }
}
