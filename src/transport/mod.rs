//! Transport Module
//!
//! A transport performs exactly one request/response exchange. The client
//! layers caching, endpoint selection, and retries on top of it.

mod mock;
mod network;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::models::Response;

pub use mock::{MockResponse, MockTransport, RecordedCall};
pub use network::ReqwestTransport;

// == Transport Request ==
/// One fully resolved attempt.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout,
        }
    }
}

// == Transport ==
/// Performs a single exchange.
///
/// Implementations should stop promptly when `cancel` fires; the client also
/// races every call against the token and the request timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError>;
}
