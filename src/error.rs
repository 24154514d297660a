//! Error types for the client runtime
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Transport Error ==
/// Failure of a single request/response exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt did not complete within its timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request could not be built or sent
    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(Duration::ZERO)
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

// == Config Error ==
/// Invalid client configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Cache capacity must admit at least one entry
    #[error("Cache capacity must be at least 1")]
    ZeroCapacity,

    /// An endpoint is not an absolute http(s) URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An interval that drives a periodic task is zero
    #[error("Interval must be non-zero: {0}")]
    ZeroInterval(&'static str),

    /// Unrecognized selection strategy name
    #[error("Unknown selection strategy: {0}")]
    UnknownStrategy(String),

    /// The underlying HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// A relative request was made with no endpoints to resolve it against
    #[error("No endpoints configured for {0}")]
    NoEndpoints(String),
}

// == Fetch Error ==
/// Unified error type surfaced by the client.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Misconfiguration; never retried
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Network or timeout failure on one attempt
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response arrived but the status validator rejected it
    #[error("Request to {url} failed with status {status}")]
    StatusValidation {
        /// HTTP status code
        status: u16,
        /// Target of the rejected attempt
        url: String,
    },

    /// Every attempt failed
    #[error("Request failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        /// Number of attempts made
        attempts: u32,
        /// Last observed failure
        #[source]
        last: Box<FetchError>,
    },

    /// The caller's cancellation token fired
    #[error("Request cancelled after {attempts} attempts")]
    Cancelled {
        /// Number of attempts started before cancellation
        attempts: u32,
    },

    /// A background refresh failed; logged, never returned to callers
    #[error("Cache revalidation failed for {key}: {message}")]
    CacheRevalidation {
        /// Cache key of the stale entry
        key: String,
        /// Underlying failure
        message: String,
    },

    /// The request URL could not be resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether another attempt may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(_) | FetchError::StatusValidation { .. }
        )
    }

    /// Status code of a rejected response, looking through exhaustion.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::StatusValidation { status, .. } => Some(*status),
            FetchError::ExhaustedRetries { last, .. } => last.status_code(),
            _ => None,
        }
    }

    /// Total attempts made for errors that carry a count.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            FetchError::ExhaustedRetries { attempts, .. } | FetchError::Cancelled { attempts } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the client.
pub type Result<T> = std::result::Result<T, FetchError>;
