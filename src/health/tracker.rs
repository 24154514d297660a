//! Health Tracker Module
//!
//! Per-endpoint health derived from probes and live request outcomes.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

// == Endpoint Status ==
/// `Unknown → Healthy ⇄ Unhealthy`. Unknown counts as healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

// == Health Record ==
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub status: EndpointStatus,
    /// Monotonic instant of the last observation
    pub last_checked_at: Instant,
    /// Wall-clock time of the last observation, for reporting
    pub last_checked_wall: DateTime<Utc>,
    pub last_observed_latency: Option<Duration>,
    pub consecutive_failures: u32,
}

impl HealthRecord {
    fn new() -> Self {
        Self {
            status: EndpointStatus::Unknown,
            last_checked_at: Instant::now(),
            last_checked_wall: Utc::now(),
            last_observed_latency: None,
            consecutive_failures: 0,
        }
    }

    fn stamp(&mut self) {
        self.last_checked_at = Instant::now();
        self.last_checked_wall = Utc::now();
    }
}

// == Endpoint Health ==
/// Serializable view of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointHealth {
    pub endpoint: String,
    pub status: EndpointStatus,
    pub consecutive_failures: u32,
    pub latency_ms: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub quarantined: bool,
}

// == Health Tracker ==
#[derive(Debug)]
pub struct HealthTracker {
    records: HashMap<String, HealthRecord>,
    /// Consecutive request failures that mark an endpoint unhealthy
    failure_threshold: u32,
}

impl HealthTracker {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            records: HashMap::new(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn status(&self, endpoint: &str) -> EndpointStatus {
        self.records
            .get(endpoint)
            .map(|r| r.status)
            .unwrap_or(EndpointStatus::Unknown)
    }

    /// Absent and unknown endpoints are healthy.
    pub fn is_healthy(&self, endpoint: &str) -> bool {
        self.status(endpoint) != EndpointStatus::Unhealthy
    }

    pub fn latency(&self, endpoint: &str) -> Option<Duration> {
        self.records
            .get(endpoint)
            .and_then(|r| r.last_observed_latency)
    }

    pub fn record(&self, endpoint: &str) -> Option<&HealthRecord> {
        self.records.get(endpoint)
    }

    fn entry(&mut self, endpoint: &str) -> &mut HealthRecord {
        self.records
            .entry(endpoint.to_string())
            .or_insert_with(HealthRecord::new)
    }

    // == Record Probe ==
    /// Applies a probe result. A failed probe marks the endpoint unhealthy
    /// at once; a passing one marks it healthy and clears the failure streak.
    pub fn record_probe(&mut self, endpoint: &str, healthy: bool, latency: Option<Duration>) {
        let record = self.entry(endpoint);
        let previous = record.status;
        record.stamp();

        if healthy {
            record.status = EndpointStatus::Healthy;
            record.consecutive_failures = 0;
            if latency.is_some() {
                record.last_observed_latency = latency;
            }
        } else {
            record.status = EndpointStatus::Unhealthy;
        }

        log_transition(endpoint, previous, record.status);
    }

    // == Record Success ==
    /// A live request succeeded.
    pub fn record_success(&mut self, endpoint: &str, latency: Duration) {
        let record = self.entry(endpoint);
        let previous = record.status;
        record.stamp();
        record.status = EndpointStatus::Healthy;
        record.consecutive_failures = 0;
        record.last_observed_latency = Some(latency);

        log_transition(endpoint, previous, record.status);
    }

    // == Record Failure ==
    /// A live request failed. Returns the new consecutive failure count.
    pub fn record_failure(&mut self, endpoint: &str) -> u32 {
        let threshold = self.failure_threshold;
        let record = self.entry(endpoint);
        let previous = record.status;
        record.stamp();
        record.consecutive_failures += 1;
        if record.consecutive_failures >= threshold {
            record.status = EndpointStatus::Unhealthy;
        }

        let failures = record.consecutive_failures;
        log_transition(endpoint, previous, record.status);
        failures
    }

    /// Endpoints among `endpoints` that currently count as healthy.
    pub fn healthy_count(&self, endpoints: &[String]) -> usize {
        endpoints.iter().filter(|e| self.is_healthy(e)).count()
    }

    /// Health view for `endpoints`, in the given order.
    pub fn snapshot(&self, endpoints: &[String]) -> Vec<EndpointHealth> {
        endpoints
            .iter()
            .map(|endpoint| {
                let record = self.records.get(endpoint);
                EndpointHealth {
                    endpoint: endpoint.clone(),
                    status: self.status(endpoint),
                    consecutive_failures: record.map(|r| r.consecutive_failures).unwrap_or(0),
                    latency_ms: record
                        .and_then(|r| r.last_observed_latency)
                        .map(|d| d.as_millis() as u64),
                    last_checked_at: record.map(|r| r.last_checked_wall),
                    quarantined: false,
                }
            })
            .collect()
    }
}

fn log_transition(endpoint: &str, from: EndpointStatus, to: EndpointStatus) {
    match (from, to) {
        (EndpointStatus::Unhealthy, EndpointStatus::Healthy) => {
            info!(endpoint, "endpoint recovered");
        }
        (EndpointStatus::Unknown | EndpointStatus::Healthy, EndpointStatus::Unhealthy) => {
            warn!(endpoint, "endpoint marked unhealthy");
        }
        _ => {}
    }
}
