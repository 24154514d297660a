//! Integration Tests for the Fetch Client
//!
//! Exercises caching, retries, cancellation and failover end to end over a
//! scripted transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fetchline::{
    init_tracing, ClientConfig, EndpointStatus, FetchClient, FetchError, HealthCheckConfig,
    MockResponse, MockTransport, RequestOptions, ResponseLike, ResponseSource, SelectionStrategy,
    TransportError,
};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

// == Helper Functions ==

fn cached_config() -> ClientConfig {
    ClientConfig::builder()
        .endpoint("http://api.local")
        .cache(true)
        .retries(0)
        .build()
}

fn start(config: ClientConfig, transport: &MockTransport) -> FetchClient {
    FetchClient::with_transport(config, Arc::new(transport.clone())).unwrap()
}

// == Cache Tests ==

#[tokio::test]
async fn test_fresh_hit_skips_network() {
    let transport = MockTransport::always(MockResponse::ok().with_text("v1"));
    let client = start(cached_config(), &transport);

    let first = client.get("/users", RequestOptions::new()).await.unwrap();
    let second = client.get("/users", RequestOptions::new()).await.unwrap();

    assert_eq!(first.source(), ResponseSource::Network);
    assert_eq!(second.source(), ResponseSource::Cache);
    assert_eq!(second.text(), "v1");
    assert_eq!(transport.call_count(), 1);

    let stats = client.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.insertions, 1);
}

#[tokio::test]
async fn test_cache_can_be_disabled_per_request() {
    let transport = MockTransport::always(MockResponse::ok());
    let client = start(cached_config(), &transport);

    for _ in 0..2 {
        assert_ok!(client.get("/users", RequestOptions::new().cache(false)).await);
    }

    assert_eq!(transport.call_count(), 2);
    assert_eq!(client.cache_stats().await.size, 0);
}

#[tokio::test(start_paused = true)]
async fn test_expired_response_is_refetched() {
    let transport = MockTransport::always(MockResponse::ok());
    let client = start(cached_config(), &transport);
    let options = || RequestOptions::new().cache_time(Duration::from_millis(100));

    client.get("/users", options()).await.unwrap();
    tokio::time::advance(Duration::from_millis(150)).await;
    let response = client.get("/users", options()).await.unwrap();

    assert_eq!(response.source(), ResponseSource::Network);
    assert_eq!(transport.call_count(), 2);
    assert_eq!(client.cache_stats().await.expirations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_while_revalidate_refreshes_once() {
    let transport = MockTransport::sequence(vec![
        Ok(MockResponse::ok().with_text("v1")),
        Ok(MockResponse::ok().with_text("v2")),
    ]);
    let client = start(cached_config(), &transport);
    let options = || {
        RequestOptions::new()
            .cache_time(Duration::from_millis(5000))
            .cache_max_age(Duration::from_millis(50))
            .stale_while_revalidate(true)
    };

    client.get("/feed", options()).await.unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;

    let stale = client.get("/feed", options()).await.unwrap();
    assert_eq!(stale.source(), ResponseSource::StaleCache);
    assert_eq!(stale.text(), "v1");

    assert_ok!(client.get("/feed", options()).await);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(transport.call_count(), 2, "exactly one background refresh");

    let fresh = client.get("/feed", options()).await.unwrap();
    assert_eq!(fresh.source(), ResponseSource::Cache);
    assert_eq!(fresh.text(), "v2");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_revalidation_sends_validator_and_handles_not_modified() {
    let transport = MockTransport::from_fn(|request| {
        if request.headers.get("if-none-match").is_some() {
            Ok(MockResponse::new(304))
        } else {
            Ok(MockResponse::ok().with_header("etag", "\"v1\"").with_text("v1"))
        }
    });
    let client = start(cached_config(), &transport);
    let options = || {
        RequestOptions::new()
            .cache_max_age(Duration::from_millis(50))
            .stale_while_revalidate(true)
    };

    client.get("/doc", options()).await.unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;
    client.get("/doc", options()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].headers["if-none-match"], "\"v1\"");

    let response = client.get("/doc", options()).await.unwrap();
    assert_eq!(response.source(), ResponseSource::Cache);
    assert_eq!(response.text(), "v1");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_revalidation_keeps_stale_value() {
    let transport = MockTransport::sequence(vec![
        Ok(MockResponse::ok().with_text("v1")),
        Err(TransportError::Connection("refused".to_string())),
    ]);
    let client = start(cached_config(), &transport);
    let options = || {
        RequestOptions::new()
            .cache_max_age(Duration::from_millis(50))
            .stale_while_revalidate(true)
    };

    client.get("/feed", options()).await.unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;

    let stale = assert_ok!(client.get("/feed", options()).await);
    assert_eq!(stale.source(), ResponseSource::StaleCache);
    tokio::time::sleep(Duration::from_millis(1)).await;

    let still_stale = client.get("/feed", options()).await.unwrap();
    assert_eq!(still_stale.text(), "v1");
}

#[tokio::test]
async fn test_delete_cache_by_tag() {
    let transport = MockTransport::always(MockResponse::ok());
    let client = start(cached_config(), &transport);

    client
        .get("/k1", RequestOptions::new().cache_tags(["t1", "t2"]))
        .await
        .unwrap();
    client
        .get("/k2", RequestOptions::new().cache_tags(["t2"]))
        .await
        .unwrap();
    client
        .get("/k3", RequestOptions::new().cache_tags(["t3"]))
        .await
        .unwrap();

    assert_eq!(client.delete_cache_by_tag("t2").await, 2);

    let stats = client.cache_stats().await;
    assert_eq!(stats.size, 1);
    assert_eq!(stats.deletions, 2);

    let k3 = client.get("/k3", RequestOptions::new()).await.unwrap();
    assert_eq!(k3.source(), ResponseSource::Cache);
    assert_eq!(client.clear_cache().await, 1);
}

#[tokio::test]
async fn test_cache_stats_are_stable() {
    let transport = MockTransport::always(MockResponse::ok());
    let client = start(cached_config(), &transport);
    client.get("/users", RequestOptions::new()).await.unwrap();

    assert_eq!(client.cache_stats().await, client.cache_stats().await);
}

// == Retry Tests ==

#[tokio::test(start_paused = true)]
async fn test_retries_back_off_exponentially() {
    let transport = MockTransport::failing(TransportError::Connection("refused".to_string()));
    let client = start(ClientConfig::default(), &transport);
    let options = RequestOptions::new()
        .retries(2)
        .retry_delay(Duration::from_millis(100));

    let err = assert_err!(client.get("http://flaky.local/x", options).await);

    assert!(matches!(err, FetchError::ExhaustedRetries { attempts: 3, .. }));
    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[1].at - calls[0].at >= Duration::from_millis(100));
    assert!(calls[2].at - calls[1].at >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_transient_failure() {
    let transport = MockTransport::sequence(vec![
        Ok(MockResponse::new(503)),
        Ok(MockResponse::ok().with_text("ok")),
    ]);
    let client = start(ClientConfig::default(), &transport);

    let response = client
        .get(
            "http://api.local/x",
            RequestOptions::new().retry_delay(Duration::from_millis(10)),
        )
        .await
        .unwrap();

    assert_eq!(response.text(), "ok");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_status_validation() {
    let transport = MockTransport::always(MockResponse::new(404));
    let client = start(ClientConfig::default(), &transport);

    let err = client
        .get("http://api.local/missing", RequestOptions::new().retries(0))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(err.attempts(), Some(1));

    let response = client
        .get(
            "http://api.local/missing",
            RequestOptions::new().validate_status(|status| status.as_u16() < 500),
        )
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test(start_paused = true)]
async fn test_slow_attempt_times_out() {
    let transport = MockTransport::always(MockResponse::ok()).with_latency(Duration::from_secs(30));
    let client = start(ClientConfig::default(), &transport);

    let err = client
        .get(
            "http://api.local/slow",
            RequestOptions::new()
                .retries(0)
                .timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();

    match err {
        FetchError::ExhaustedRetries { last, .. } => {
            assert!(matches!(*last, FetchError::Transport(TransportError::Timeout(_))));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// == Cancellation Tests ==

#[tokio::test]
async fn test_pre_cancelled_request_touches_nothing() {
    let transport = MockTransport::always(MockResponse::ok());
    let client = start(cached_config(), &transport);
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .get("/users", RequestOptions::new().signal(token))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled { attempts: 0 }));
    assert_eq!(transport.call_count(), 0);
    assert_eq!(client.cache_stats().await.misses, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_attempt() {
    let transport = MockTransport::always(MockResponse::ok()).with_latency(Duration::from_secs(5));
    let client = start(ClientConfig::default(), &transport);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = client
        .get("http://api.local/x", RequestOptions::new().signal(token))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled { attempts: 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let transport = MockTransport::failing(TransportError::Connection("refused".to_string()));
    let client = start(ClientConfig::default(), &transport);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let err = client
        .get(
            "http://api.local/x",
            RequestOptions::new()
                .retries(5)
                .retry_delay(Duration::from_secs(1))
                .signal(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled { attempts: 1 }));
    assert_eq!(transport.call_count(), 1);
}

// == Failover Tests ==

#[tokio::test]
async fn test_round_robin_spreads_requests() {
    let transport = MockTransport::always(MockResponse::ok());
    let config = ClientConfig::builder()
        .endpoints(["http://a", "http://b", "http://c"])
        .build();
    let client = start(config, &transport);

    for _ in 0..9 {
        client
            .request_with_failover("/ping", RequestOptions::new())
            .await
            .unwrap();
    }

    let urls: Vec<String> = transport.calls().into_iter().map(|c| c.url).collect();
    assert_eq!(&urls[..3], ["http://a/ping", "http://b/ping", "http://c/ping"]);
    for endpoint in ["http://a", "http://b", "http://c"] {
        assert_eq!(transport.calls_to(endpoint), 3);
    }
}

#[tokio::test]
async fn test_failing_endpoint_is_quarantined() {
    let transport = MockTransport::from_fn(|request| {
        if request.url.starts_with("http://a") {
            Err(TransportError::Connection("refused".to_string()))
        } else {
            Ok(MockResponse::ok())
        }
    });
    let config = ClientConfig::builder()
        .endpoints(["http://a", "http://b"])
        .retries(0)
        .failure_threshold(3)
        .build();
    let client = start(config, &transport);

    for _ in 0..6 {
        let _ = client.request_with_failover("/x", RequestOptions::new()).await;
    }
    assert_eq!(transport.calls_to("http://a"), 3);

    let stats = client.failover_stats().await;
    assert_eq!(stats.quarantined_endpoints, vec!["http://a".to_string()]);
    assert_eq!(stats.healthy_endpoints, 1);
    assert_eq!(stats.endpoints[0].status, EndpointStatus::Unhealthy);

    for _ in 0..4 {
        assert_ok!(client.request_with_failover("/x", RequestOptions::new()).await);
    }
    assert_eq!(transport.calls_to("http://a"), 3, "quarantined endpoint is skipped");
}

#[tokio::test]
async fn test_full_quarantine_clears_and_success_recovers() {
    let up = Arc::new(AtomicBool::new(false));
    let flag = up.clone();
    let transport = MockTransport::from_fn(move |_| {
        if flag.load(Ordering::SeqCst) {
            Ok(MockResponse::ok())
        } else {
            Err(TransportError::Connection("refused".to_string()))
        }
    });
    let config = ClientConfig::builder()
        .endpoints(["http://a", "http://b"])
        .retries(0)
        .failure_threshold(1)
        .build();
    let client = start(config, &transport);

    for _ in 0..2 {
        assert_err!(client.request_with_failover("/x", RequestOptions::new()).await);
    }
    assert_eq!(client.failover_stats().await.quarantined_endpoints.len(), 2);

    up.store(true, Ordering::SeqCst);
    assert_ok!(client.request_with_failover("/x", RequestOptions::new()).await);

    let stats = client.failover_stats().await;
    assert!(stats.quarantined_endpoints.is_empty());
    assert_eq!(stats.endpoints[0].status, EndpointStatus::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_health_ranked_follows_probes() {
    let transport = MockTransport::from_fn(|request| {
        if request.url == "http://a/health" {
            Ok(MockResponse::new(503))
        } else {
            Ok(MockResponse::ok())
        }
    });
    let config = ClientConfig::builder()
        .endpoints(["http://a", "http://b"])
        .strategy(SelectionStrategy::HealthRanked)
        .health_check(HealthCheckConfig {
            interval: Duration::from_secs(1),
            ..HealthCheckConfig::default()
        })
        .build();
    let client = start(config, &transport);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    client
        .request_with_failover("/x", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(transport.calls_to("http://b/x"), 1);
    assert_eq!(transport.calls_to("http://a/x"), 0);

    let stats = client.failover_stats().await;
    assert_eq!(stats.strategy, SelectionStrategy::HealthRanked);
    assert_eq!(stats.endpoints[0].status, EndpointStatus::Unhealthy);
    assert_eq!(stats.endpoints[1].status, EndpointStatus::Healthy);
}

// == Lifecycle Tests ==

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let transport = MockTransport::always(MockResponse::ok());
    let client = start(cached_config(), &transport);

    client.destroy();
    client.destroy();
    assert!(client.is_destroyed());
    client.shutdown().await;

    for _ in 0..2 {
        client.get("/users", RequestOptions::new()).await.unwrap();
    }
    assert_eq!(transport.call_count(), 2, "destroyed client bypasses the cache");
}

#[tokio::test(start_paused = true)]
async fn test_destroy_stops_health_checks() {
    let transport = MockTransport::always(MockResponse::ok());
    let config = ClientConfig::builder()
        .endpoints(["http://a", "http://b"])
        .health_check(HealthCheckConfig {
            enabled: true,
            interval: Duration::from_secs(1),
            ..HealthCheckConfig::default()
        })
        .build();
    let client = start(config, &transport);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(transport.calls_to("http://a/health"), 1);
    assert_eq!(transport.calls_to("http://b/health"), 1);

    client.destroy();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(transport.call_count(), 2, "no checks after destroy");
    client.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let transport = MockTransport::always(MockResponse::ok());
    let config = ClientConfig::builder().cache_capacity(0).build();

    let result = FetchClient::with_transport(config, Arc::new(transport));
    assert!(matches!(result, Err(FetchError::Configuration(_))));
}

#[test]
fn test_tracing_init_is_idempotent() {
    let _ = init_tracing();
    assert!(!init_tracing());
}
