//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task sleeps for `interval` between sweeps and holds the write lock
/// only for the sweep itself. It exits as soon as `shutdown` is cancelled.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::new(100, ttl)));
/// spawn_cleanup_task(cache.clone(), Duration::from_secs(60), token.clone(), &tracker);
/// // Later, during shutdown:
/// token.cancel();
/// tracker.close();
/// tracker.wait().await;
/// ```
pub fn spawn_cleanup_task<V>(
    cache: Arc<RwLock<CacheStore<V>>>,
    interval: Duration,
    shutdown: CancellationToken,
    tracker: &TaskTracker,
) where
    V: Clone + Send + Sync + 'static,
{
    tracker.spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting cache cleanup task");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.sweep_expired()
            };

            if removed > 0 {
                info!(removed, "cache cleanup removed expired entries");
            } else {
                debug!("cache cleanup found no expired entries");
            }
        }

        debug!("cache cleanup task stopped");
    });
}
