//! Client Module
//!
//! [`FetchClient`] ties the response cache, endpoint selection, retries and
//! the background tasks together.

mod retry;

pub use retry::RetryPolicy;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{HeaderMap, Method, StatusCode};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheStats, CacheStore, EntryOptions, Validator};
use crate::config::ClientConfig;
use crate::error::{ConfigError, FetchError, Result, TransportError};
use crate::health::{EndpointSelector, FailoverStats, HealthTracker};
use crate::models::{
    RequestBody, RequestOptions, Response, ResponseLike, ResponseSource, StatusValidator,
};
use crate::tasks::{spawn_cleanup_task, spawn_probe_task};
use crate::transport::{ReqwestTransport, Transport, TransportRequest};

// == Target ==
#[derive(Debug, Clone)]
enum Target {
    /// Full URL, sent as given
    Absolute(String),
    /// Path joined to a selected endpoint
    Endpoint(String),
}

impl Target {
    fn parse(url: &str) -> Result<Self> {
        if url.starts_with('/') || !url.contains("://") {
            return Ok(Target::Endpoint(normalize_path(url)));
        }

        let parsed = reqwest::Url::parse(url)
            .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(Target::Absolute(url.to_string())),
            other => Err(FetchError::InvalidUrl(format!(
                "unsupported scheme {other} in {url}"
            ))),
        }
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

// == Prepared Request ==
/// Request settings resolved against the client configuration.
#[derive(Debug, Clone)]
struct PreparedRequest {
    method: Method,
    target: Target,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Duration,
    retry: RetryPolicy,
    validate_status: StatusValidator,
    signal: CancellationToken,
}

// == Attempt Outcome ==
enum AttemptOutcome {
    Success(Response),
    Failed(FetchError),
    Cancelled,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    cache: Arc<RwLock<CacheStore<Response>>>,
    health: Arc<RwLock<HealthTracker>>,
    selector: Mutex<EndpointSelector>,
    /// Cache keys with a background refresh in flight
    revalidating: StdMutex<HashSet<String>>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    destroyed: AtomicBool,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// == Fetch Client ==
/// HTTP client with response caching and endpoint failover.
///
/// Cloning is cheap; clones share the cache, health state and background
/// tasks. Construction spawns tasks and must happen inside a tokio runtime.
#[derive(Clone)]
pub struct FetchClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("endpoints", &self.inner.config.endpoints)
            .field("strategy", &self.inner.config.strategy)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl FetchClient {
    /// Creates a client that sends requests with `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(RwLock::new(CacheStore::new(
            config.cache_capacity,
            config.cache_time,
        )));
        let health = Arc::new(RwLock::new(HealthTracker::new(config.failure_threshold)));
        let selector = EndpointSelector::new(config.endpoints.clone(), config.strategy);
        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();

        spawn_cleanup_task(
            cache.clone(),
            config.cleanup_interval,
            shutdown.clone(),
            &tasks,
        );
        if config.probes_enabled() {
            spawn_probe_task(
                transport.clone(),
                health.clone(),
                config.endpoints.clone(),
                config.health_check.clone(),
                shutdown.clone(),
                &tasks,
            );
        }

        info!(
            endpoints = config.endpoints.len(),
            strategy = %config.strategy,
            cache = config.cache_enabled,
            "fetch client started"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                cache,
                health,
                selector: Mutex::new(selector),
                revalidating: StdMutex::new(HashSet::new()),
                tasks,
                shutdown,
                destroyed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // == HTTP Methods ==
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::GET)).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request(url, options.method(Method::POST).body(body)).await
    }

    pub async fn put(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request(url, options.method(Method::PUT).body(body)).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::DELETE)).await
    }

    /// Sends a request against a configured endpoint. `path` must be relative.
    pub async fn request_with_failover(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        if self.inner.config.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints(path.to_string()).into());
        }
        if let Target::Absolute(url) = Target::parse(path)? {
            return Err(FetchError::InvalidUrl(format!(
                "failover requires a relative path, got {url}"
            )));
        }
        self.request(path, options).await
    }

    // == Request ==
    /// Sends a request through the cache and retry pipeline.
    ///
    /// Absolute URLs go out as given. Relative paths are joined to an
    /// endpoint picked by the selector, which may differ between attempts.
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<Response> {
        if options.signal.as_ref().is_some_and(|s| s.is_cancelled()) {
            return Err(FetchError::Cancelled { attempts: 0 });
        }

        let request = self.prepare(url, &options)?;
        let key = self.cache_key_for(&request, &options);

        if let Some(key) = &key {
            let lookup = self.inner.cache.write().await.get(key);
            match lookup {
                Some(lookup) if !lookup.is_stale => {
                    debug!(key = %key, "cache hit");
                    return Ok(lookup.value.with_source(ResponseSource::Cache));
                }
                Some(lookup) if lookup.should_revalidate => {
                    debug!(key = %key, "serving stale response");
                    self.spawn_revalidation(
                        key.clone(),
                        request,
                        options,
                        lookup.validator,
                        lookup.value.clone(),
                    );
                    return Ok(lookup.value.with_source(ResponseSource::StaleCache));
                }
                Some(_) => debug!(key = %key, "cache entry stale, refetching"),
                None => debug!(key = %key, "cache miss"),
            }
        }

        let response = self.execute(&request).await?;

        if let Some(key) = key {
            self.store(key, &response, &options).await;
        }
        Ok(response)
    }

    fn prepare(&self, url: &str, options: &RequestOptions) -> Result<PreparedRequest> {
        let config = &self.inner.config;
        let target = Target::parse(url)?;
        if matches!(target, Target::Endpoint(_)) && config.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints(url.to_string()).into());
        }

        let mut headers = config.default_headers.clone();
        if let Some(content_type) = options.body.as_ref().and_then(RequestBody::content_type) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        headers.extend(options.headers.clone());

        Ok(PreparedRequest {
            method: options.method.clone().unwrap_or(Method::GET),
            target,
            headers,
            body: options.body.as_ref().map(RequestBody::to_bytes),
            timeout: options.timeout.unwrap_or(config.timeout),
            retry: RetryPolicy::resolve(config, options),
            validate_status: options.validate_status.clone().unwrap_or_default(),
            signal: options.signal.clone().unwrap_or_default(),
        })
    }

    /// Key for cache-eligible requests: GET or HEAD with caching on.
    ///
    /// Relative paths are keyed against the first endpoint so a response
    /// is shared whichever endpoint served it.
    fn cache_key_for(&self, request: &PreparedRequest, options: &RequestOptions) -> Option<String> {
        let config = &self.inner.config;
        let safe = request.method == Method::GET || request.method == Method::HEAD;
        if !safe || self.is_destroyed() || !options.cache.unwrap_or(config.cache_enabled) {
            return None;
        }

        let canonical = match &request.target {
            Target::Absolute(url) => url.clone(),
            Target::Endpoint(path) => format!("{}{}", config.endpoints.first()?, path),
        };
        Some(cache_key(&request.method, &canonical, options.body.as_ref()))
    }

    // == Execute ==
    /// Runs attempts until one succeeds, the budget is spent, or the
    /// request is cancelled.
    async fn execute(&self, request: &PreparedRequest) -> Result<Response> {
        let max_attempts = request.retry.max_attempts();
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if request.signal.is_cancelled() {
                return Err(FetchError::Cancelled { attempts: attempt });
            }

            let (endpoint, url) = self.select_target(&request.target).await?;
            let started = Instant::now();

            match self.attempt(request, &url).await {
                AttemptOutcome::Success(response) => {
                    if let Some(endpoint) = &endpoint {
                        self.record_success(endpoint, started.elapsed()).await;
                    }
                    return Ok(response);
                }
                AttemptOutcome::Cancelled => {
                    debug!(%url, attempt, "request cancelled");
                    return Err(FetchError::Cancelled {
                        attempts: attempt + 1,
                    });
                }
                AttemptOutcome::Failed(error) => {
                    warn!(%url, attempt, error = %error, "request attempt failed");
                    if let Some(endpoint) = &endpoint {
                        self.record_failure(endpoint).await;
                    }
                    last_error = Some(error);
                }
            }

            if attempt + 1 < max_attempts {
                let delay = request.retry.delay_for_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                tokio::select! {
                    _ = request.signal.cancelled() => {
                        return Err(FetchError::Cancelled { attempts: attempt + 1 });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        match last_error {
            Some(last) => Err(FetchError::ExhaustedRetries {
                attempts: max_attempts,
                last: Box::new(last),
            }),
            None => Err(FetchError::Cancelled { attempts: 0 }),
        }
    }

    /// One exchange, bounded by the request timeout and its signal.
    async fn attempt(&self, request: &PreparedRequest, url: &str) -> AttemptOutcome {
        let transport_request = TransportRequest {
            method: request.method.clone(),
            url: url.to_string(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            timeout: request.timeout,
        };
        let exchange = tokio::time::timeout(
            request.timeout,
            self.inner.transport.send(transport_request, &request.signal),
        );

        let result = tokio::select! {
            biased;
            _ = request.signal.cancelled() => return AttemptOutcome::Cancelled,
            result = exchange => result,
        };

        match result {
            Err(_) => AttemptOutcome::Failed(TransportError::Timeout(request.timeout).into()),
            Ok(Err(_)) if request.signal.is_cancelled() => AttemptOutcome::Cancelled,
            Ok(Err(err)) => AttemptOutcome::Failed(err.into()),
            Ok(Ok(response)) if request.validate_status.accepts(response.status()) => {
                AttemptOutcome::Success(response)
            }
            Ok(Ok(response)) => AttemptOutcome::Failed(FetchError::StatusValidation {
                status: response.status().as_u16(),
                url: url.to_string(),
            }),
        }
    }

    /// Resolves the URL of the next attempt and the endpoint it targets.
    async fn select_target(&self, target: &Target) -> Result<(Option<String>, String)> {
        match target {
            Target::Absolute(url) => Ok((None, url.clone())),
            Target::Endpoint(path) => {
                let health = self.inner.health.read().await;
                let mut selector = self.inner.selector.lock().await;
                let endpoint = selector
                    .select(&health)
                    .ok_or_else(|| ConfigError::NoEndpoints(path.clone()))?;
                let url = format!("{endpoint}{path}");
                Ok((Some(endpoint), url))
            }
        }
    }

    async fn record_success(&self, endpoint: &str, latency: Duration) {
        self.inner
            .health
            .write()
            .await
            .record_success(endpoint, latency);
        self.inner.selector.lock().await.release(endpoint);
    }

    async fn record_failure(&self, endpoint: &str) {
        let (failures, threshold) = {
            let mut health = self.inner.health.write().await;
            (health.record_failure(endpoint), health.failure_threshold())
        };
        if failures >= threshold {
            self.inner.selector.lock().await.quarantine(endpoint);
        }
    }

    // == Cache Fill ==
    async fn store(&self, key: String, response: &Response, options: &RequestOptions) {
        let config = &self.inner.config;
        let mut entry = EntryOptions::default()
            .with_ttl(options.cache_time.unwrap_or(config.cache_time))
            .with_tags(options.cache_tags.iter().cloned())
            .with_validator(response.validator())
            .stale_while_revalidate(options.stale_while_revalidate.unwrap_or(false));
        if let Some(max_age) = options.cache_max_age {
            entry = entry.with_max_age(max_age);
        }

        let evicted = self
            .inner
            .cache
            .write()
            .await
            .set(key.as_str(), response.clone(), entry);
        if let Some(evicted) = evicted {
            debug!(key = %evicted, "evicted cached response");
        }
    }

    // == Revalidation ==
    /// Refreshes a stale entry in the background, at most once per key at
    /// a time. Errors are logged and dropped.
    fn spawn_revalidation(
        &self,
        key: String,
        mut request: PreparedRequest,
        options: RequestOptions,
        validator: Option<Validator>,
        stale: Response,
    ) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        {
            let mut in_flight = self
                .inner
                .revalidating
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(key.clone()) {
                debug!(key = %key, "revalidation already in flight");
                return;
            }
        }

        request.signal = self.inner.shutdown.child_token();
        if let Some(validator) = validator {
            add_conditional_headers(&mut request.headers, &validator);
            let accepts = request.validate_status.clone();
            request.validate_status = StatusValidator::new(move |status| {
                status == StatusCode::NOT_MODIFIED || accepts.accepts(status)
            });
        }

        let client = self.clone();
        self.inner.tasks.spawn(async move {
            match client.execute(&request).await {
                Ok(response) if response.status() == StatusCode::NOT_MODIFIED => {
                    debug!(key = %key, "cached response not modified");
                    client.store(key.clone(), &stale, &options).await;
                }
                Ok(response) => {
                    debug!(key = %key, "cached response revalidated");
                    client.store(key.clone(), &response, &options).await;
                }
                Err(FetchError::Cancelled { .. }) => {
                    debug!(key = %key, "revalidation cancelled");
                }
                Err(err) => {
                    let err = FetchError::CacheRevalidation {
                        key: key.clone(),
                        message: err.to_string(),
                    };
                    warn!(error = %err, "background revalidation failed");
                }
            }

            client
                .inner
                .revalidating
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        });
    }

    // == Cache Management ==
    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.read().await.stats()
    }

    /// Drops every cached response tagged `tag`. Returns how many were removed.
    pub async fn delete_cache_by_tag(&self, tag: &str) -> usize {
        let removed = self.inner.cache.write().await.delete_by_tag(tag);
        debug!(tag, removed, "invalidated cached responses by tag");
        removed
    }

    pub async fn clear_cache(&self) -> usize {
        self.inner.cache.write().await.clear()
    }

    pub async fn failover_stats(&self) -> FailoverStats {
        let health = self.inner.health.read().await;
        let selector = self.inner.selector.lock().await;
        FailoverStats::collect(&selector, &health)
    }

    // == Lifecycle ==
    /// Stops background tasks. Later requests bypass the cache.
    ///
    /// Safe to call more than once.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        info!("fetch client destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Destroys the client, waits for background tasks, then empties the cache.
    pub async fn shutdown(&self) {
        self.destroy();
        self.inner.tasks.wait().await;
        let cleared = self.inner.cache.write().await.clear();
        debug!(cleared, "fetch client shut down");
    }
}

fn add_conditional_headers(headers: &mut HeaderMap, validator: &Validator) {
    if let Some(etag) = validator.etag.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(IF_NONE_MATCH, etag);
    }
    if let Some(modified) = validator
        .last_modified
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(IF_MODIFIED_SINCE, modified);
    }
}
