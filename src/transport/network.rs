//! reqwest-backed transport.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ConfigError, TransportError};
use crate::models::Response;
use crate::transport::{Transport, TransportRequest};

/// Sends requests over the network with a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds the underlying client from the connection settings in `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let inner = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { inner })
    }

    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    async fn execute(&self, request: TransportRequest) -> Result<Response, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .inner
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| map_error(e, timeout))?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await.map_err(|e| map_error(e, timeout))?;

        debug!(%url, status = status.as_u16(), bytes = body.len(), "received response");
        Ok(Response::new(status, headers, body, url))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Request("request cancelled".to_string())),
            result = self.execute(request) => result,
        }
    }
}

fn map_error(err: reqwest::Error, timeout: std::time::Duration) -> TransportError {
    match TransportError::from(err) {
        TransportError::Timeout(_) => TransportError::Timeout(timeout),
        other => other,
    }
}
