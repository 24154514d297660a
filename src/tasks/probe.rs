//! Health Probe Task
//!
//! Background task that periodically probes every endpoint's health path.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::HealthCheckConfig;
use crate::health::HealthTracker;
use crate::models::ResponseLike;
use crate::transport::{Transport, TransportRequest};

/// Spawns a task that probes `endpoints` every `config.interval`.
///
/// A probe passes when `GET {endpoint}{config.path}` answers with a 2xx
/// status within `config.timeout`. The first round runs one interval after
/// the task starts. Probes in a round run concurrently.
pub fn spawn_probe_task(
    transport: Arc<dyn Transport>,
    health: Arc<RwLock<HealthTracker>>,
    endpoints: Vec<String>,
    config: HealthCheckConfig,
    shutdown: CancellationToken,
    tracker: &TaskTracker,
) {
    tracker.spawn(async move {
        info!(
            endpoints = endpoints.len(),
            interval_ms = config.interval.as_millis() as u64,
            "starting health probe task"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(config.interval) => {}
            }

            let round = join_all(endpoints.iter().map(|endpoint| {
                probe_endpoint(transport.as_ref(), endpoint, &config, &shutdown)
            }));

            // Probes cut short by shutdown say nothing about endpoint health.
            let results = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                results = round => results,
            };
            if shutdown.is_cancelled() {
                break;
            }

            let mut health_guard = health.write().await;
            for (endpoint, (healthy, latency)) in endpoints.iter().zip(results) {
                health_guard.record_probe(endpoint, healthy, latency);
            }
        }

        debug!("health probe task stopped");
    });
}

/// Probes one endpoint. Returns whether it passed and, if so, its latency.
async fn probe_endpoint(
    transport: &dyn Transport,
    endpoint: &str,
    config: &HealthCheckConfig,
    shutdown: &CancellationToken,
) -> (bool, Option<Duration>) {
    let url = format!("{}{}", endpoint, config.path);
    let request = TransportRequest::get(url.clone(), config.timeout);
    let started = Instant::now();

    match tokio::time::timeout(config.timeout, transport.send(request, shutdown)).await {
        Ok(Ok(response)) if response.is_success() => {
            let latency = started.elapsed();
            debug!(%url, latency_ms = latency.as_millis() as u64, "probe passed");
            (true, Some(latency))
        }
        Ok(Ok(response)) => {
            debug!(%url, status = response.status().as_u16(), "probe rejected");
            (false, None)
        }
        Ok(Err(err)) => {
            debug!(%url, error = %err, "probe failed");
            (false, None)
        }
        Err(_) => {
            debug!(%url, "probe timed out");
            (false, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::EndpointStatus;
    use crate::transport::{MockResponse, MockTransport};

    fn probe_config() -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: true,
            interval: Duration::from_secs(1),
            timeout: Duration::from_millis(200),
            path: "/health".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_marks_endpoints() {
        let transport = MockTransport::from_fn(|request| {
            if request.url.starts_with("http://up") {
                Ok(MockResponse::ok())
            } else {
                Ok(MockResponse::new(503))
            }
        });
        let health = Arc::new(RwLock::new(HealthTracker::new(3)));
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        spawn_probe_task(
            Arc::new(transport.clone()),
            health.clone(),
            vec!["http://up".to_string(), "http://down".to_string()],
            probe_config(),
            token.clone(),
            &tracker,
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;

        {
            let health_guard = health.read().await;
            assert_eq!(health_guard.status("http://up"), EndpointStatus::Healthy);
            assert_eq!(health_guard.status("http://down"), EndpointStatus::Unhealthy);
        }
        assert_eq!(transport.calls_to("http://up/health"), 1);

        token.cancel();
        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out() {
        let transport = MockTransport::always(MockResponse::ok()).with_latency(Duration::from_secs(5));
        let health = Arc::new(RwLock::new(HealthTracker::new(3)));
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        spawn_probe_task(
            Arc::new(transport),
            health.clone(),
            vec!["http://slow".to_string()],
            probe_config(),
            token.clone(),
            &tracker,
        );

        tokio::time::sleep(Duration::from_millis(1300)).await;

        assert_eq!(health.read().await.status("http://slow"), EndpointStatus::Unhealthy);
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_round_keeps_health() {
        let transport = MockTransport::always(MockResponse::ok()).with_latency(Duration::from_millis(150));
        let health = Arc::new(RwLock::new(HealthTracker::new(3)));
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let endpoints = vec!["http://a".to_string(), "http://b".to_string()];

        spawn_probe_task(
            Arc::new(transport.clone()),
            health.clone(),
            endpoints.clone(),
            probe_config(),
            token.clone(),
            &tracker,
        );

        // First round runs 1.0s..1.15s; the second starts at 2.15s.
        tokio::time::sleep(Duration::from_millis(2250)).await;
        assert_eq!(transport.call_count(), 4);

        token.cancel();
        tracker.close();
        tracker.wait().await;

        let health_guard = health.read().await;
        for endpoint in &endpoints {
            assert_eq!(health_guard.status(endpoint), EndpointStatus::Healthy);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_probe_before_first_interval() {
        let transport = MockTransport::always(MockResponse::ok());
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        spawn_probe_task(
            Arc::new(transport.clone()),
            Arc::new(RwLock::new(HealthTracker::new(3))),
            vec!["http://a".to_string()],
            probe_config(),
            token.clone(),
            &tracker,
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.call_count(), 0);

        token.cancel();
        tracker.close();
        tracker.wait().await;
        assert_eq!(transport.call_count(), 0);
    }
}
