//! Configuration Module
//!
//! Handles loading and managing client configuration, from code or from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use http::HeaderMap;

use crate::error::ConfigError;
use crate::health::SelectionStrategy;

// == Health Check Config ==
/// Periodic endpoint probing.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Probe even when the strategy does not rank by health
    pub enabled: bool,
    /// Time between probe rounds
    pub interval: Duration,
    /// Timeout of a single probe
    pub timeout: Duration,
    /// Path appended to each endpoint
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            path: "/health".to_string(),
        }
    }
}

// == Client Config ==
/// Client configuration parameters.
///
/// Every per-request setting here is a default that [`RequestOptions`]
/// can override.
///
/// [`RequestOptions`]: crate::models::RequestOptions
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Candidate base URLs, in selection order
    pub endpoints: Vec<String>,
    /// How an endpoint is chosen among candidates
    pub strategy: SelectionStrategy,
    /// Timeout of a single attempt
    pub timeout: Duration,
    /// Connection timeout handed to the HTTP client
    pub connect_timeout: Duration,
    /// Retries after the first attempt
    pub retries: u32,
    /// Base delay of the exponential backoff
    pub retry_delay: Duration,
    /// Upper bound on a single backoff delay, None = unbounded
    pub max_retry_delay: Option<Duration>,
    /// Cache GET/HEAD responses unless a request says otherwise
    pub cache_enabled: bool,
    /// Default TTL of cached responses
    pub cache_time: Duration,
    /// Maximum number of cached responses
    pub cache_capacity: usize,
    /// Interval of the expired-entry sweep
    pub cleanup_interval: Duration,
    /// Consecutive failures before an endpoint is quarantined
    pub failure_threshold: u32,
    pub health_check: HealthCheckConfig,
    /// Headers sent with every request
    pub default_headers: HeaderMap,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            strategy: SelectionStrategy::RoundRobin,
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            max_retry_delay: None,
            cache_enabled: false,
            cache_time: Duration::from_secs(300),
            cache_capacity: 100,
            cleanup_interval: Duration::from_secs(60),
            failure_threshold: 3,
            health_check: HealthCheckConfig::default(),
            default_headers: HeaderMap::new(),
            user_agent: format!("fetchline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Creates a new ClientConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FETCHLINE_ENDPOINTS` - Comma-separated base URLs (default: none)
    /// - `FETCHLINE_STRATEGY` - `round-robin`, `random` or `health-ranked`
    /// - `FETCHLINE_TIMEOUT_MS` - Attempt timeout (default: 10000)
    /// - `FETCHLINE_RETRIES` - Retries after the first attempt (default: 3)
    /// - `FETCHLINE_RETRY_DELAY_MS` - Backoff base (default: 1000)
    /// - `FETCHLINE_CACHE` - Enable caching (default: false)
    /// - `FETCHLINE_CACHE_TIME_MS` - Cached response TTL (default: 300000)
    /// - `FETCHLINE_CACHE_CAPACITY` - Maximum cached responses (default: 100)
    /// - `FETCHLINE_CLEANUP_INTERVAL_MS` - Sweep frequency (default: 60000)
    /// - `FETCHLINE_FAILURE_THRESHOLD` - Failures before quarantine (default: 3)
    /// - `FETCHLINE_HEALTH_CHECK_INTERVAL_MS` - Probe frequency; setting it
    ///   enables probing (default: unset)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let endpoints = env::var("FETCHLINE_ENDPOINTS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .map(|s| s.trim_end_matches('/'))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut health_check = defaults.health_check.clone();
        if let Some(interval) = env_millis("FETCHLINE_HEALTH_CHECK_INTERVAL_MS") {
            health_check.enabled = true;
            health_check.interval = interval;
        }

        Self {
            endpoints,
            strategy: env_parse("FETCHLINE_STRATEGY").unwrap_or(defaults.strategy),
            timeout: env_millis("FETCHLINE_TIMEOUT_MS").unwrap_or(defaults.timeout),
            retries: env_parse("FETCHLINE_RETRIES").unwrap_or(defaults.retries),
            retry_delay: env_millis("FETCHLINE_RETRY_DELAY_MS").unwrap_or(defaults.retry_delay),
            cache_enabled: env_parse("FETCHLINE_CACHE").unwrap_or(defaults.cache_enabled),
            cache_time: env_millis("FETCHLINE_CACHE_TIME_MS").unwrap_or(defaults.cache_time),
            cache_capacity: env_parse("FETCHLINE_CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            cleanup_interval: env_millis("FETCHLINE_CLEANUP_INTERVAL_MS")
                .unwrap_or(defaults.cleanup_interval),
            failure_threshold: env_parse("FETCHLINE_FAILURE_THRESHOLD")
                .unwrap_or(defaults.failure_threshold),
            health_check,
            ..defaults
        }
    }

    // == Validate ==
    /// Rejects settings the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("cleanup_interval"));
        }
        if self.probes_enabled() && self.health_check.interval.is_zero() {
            return Err(ConfigError::ZeroInterval("health_check.interval"));
        }
        if let Some(bad) = self
            .endpoints
            .iter()
            .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(ConfigError::InvalidEndpoint(bad.clone()));
        }
        Ok(())
    }

    /// Whether the periodic health probe should run.
    pub fn probes_enabled(&self) -> bool {
        !self.endpoints.is_empty()
            && (self.health_check.enabled || self.strategy == SelectionStrategy::HealthRanked)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_millis)
}

// == Builder ==
/// Builder for client configuration.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Add a candidate base URL. A trailing slash is dropped.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.config
            .endpoints
            .push(url.trim_end_matches('/').to_string());
        self
    }

    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for url in urls {
            self = self.endpoint(url);
        }
        self
    }

    pub fn strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.max_retry_delay = Some(delay);
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    pub fn cache_time(mut self, ttl: Duration) -> Self {
        self.config.cache_time = ttl;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn health_check(mut self, health_check: HealthCheckConfig) -> Self {
        self.config.health_check = health_check;
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.config.default_headers = headers;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: [&str; 5] = [
        "FETCHLINE_ENDPOINTS",
        "FETCHLINE_STRATEGY",
        "FETCHLINE_RETRIES",
        "FETCHLINE_CACHE",
        "FETCHLINE_HEALTH_CHECK_INTERVAL_MS",
    ];

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.strategy, SelectionStrategy::RoundRobin);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_time, Duration::from_secs(300));
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.health_check.path, "/health");
        assert!(config.validate().is_ok());
    }

    // One test touches the environment so parallel tests cannot race on it.
    #[test]
    fn test_config_from_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
        let config = ClientConfig::from_env();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.retries, 3);
        assert!(!config.probes_enabled());

        env::set_var("FETCHLINE_ENDPOINTS", "http://a:1/, http://b:2,");
        env::set_var("FETCHLINE_STRATEGY", "health-ranked");
        env::set_var("FETCHLINE_RETRIES", "5");
        env::set_var("FETCHLINE_CACHE", "true");
        env::set_var("FETCHLINE_HEALTH_CHECK_INTERVAL_MS", "250");

        let config = ClientConfig::from_env();
        assert_eq!(config.endpoints, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.strategy, SelectionStrategy::HealthRanked);
        assert_eq!(config.retries, 5);
        assert!(config.cache_enabled);
        assert!(config.health_check.enabled);
        assert_eq!(config.health_check.interval, Duration::from_millis(250));

        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .endpoints(["http://a:1/", "http://b:2"])
            .strategy(SelectionStrategy::Random)
            .retries(1)
            .cache(true)
            .build();

        assert_eq!(config.endpoints, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.strategy, SelectionStrategy::Random);
        assert_eq!(config.retries, 1);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let config = ClientConfig::builder().cache_capacity(0).build();
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let config = ClientConfig::builder().endpoint("ftp://files").build();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEndpoint(_))));

        let config = ClientConfig::builder()
            .cleanup_interval(Duration::ZERO)
            .build();
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval("cleanup_interval"))
        );
    }

    #[test]
    fn test_probes_follow_strategy() {
        let config = ClientConfig::builder()
            .endpoint("http://a:1")
            .strategy(SelectionStrategy::HealthRanked)
            .build();
        assert!(config.probes_enabled());

        let config = ClientConfig::builder()
            .strategy(SelectionStrategy::HealthRanked)
            .build();
        assert!(!config.probes_enabled(), "no endpoints, nothing to probe");
    }
}
