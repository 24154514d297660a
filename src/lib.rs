//! fetchline - An HTTP client runtime with a response cache and endpoint failover
//!
//! Provides stale-while-revalidate caching with TTL expiration and LRU
//! eviction, plus health-aware endpoint selection with retries.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod models;
pub mod tasks;
pub mod transport;

pub use cache::{CacheStats, CacheStore, EntryOptions};
pub use client::{FetchClient, RetryPolicy};
pub use config::{ClientConfig, HealthCheckConfig};
pub use error::{ConfigError, FetchError, Result, TransportError};
pub use health::{EndpointStatus, FailoverStats, SelectionStrategy};
pub use logging::init_tracing;
pub use models::{RequestBody, RequestOptions, Response, ResponseLike, ResponseSource};
pub use transport::{MockResponse, MockTransport, ReqwestTransport, Transport, TransportRequest};
