//! Endpoint Selector Module
//!
//! Picks a target among candidate endpoints, skipping quarantined ones.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::health::HealthTracker;

// == Selection Strategy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Cycle through candidates in configured order
    RoundRobin,
    /// Uniform pick
    Random,
    /// Healthy candidate with the lowest observed latency
    HealthRanked,
}

impl FromStr for SelectionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "health-ranked" | "health_ranked" | "health-check" => Ok(Self::HealthRanked),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RoundRobin => "round-robin",
            Self::Random => "random",
            Self::HealthRanked => "health-ranked",
        };
        f.write_str(name)
    }
}

// == Endpoint Selector ==
#[derive(Debug)]
pub struct EndpointSelector {
    endpoints: Vec<String>,
    strategy: SelectionStrategy,
    /// Next round-robin position in `endpoints`
    cursor: usize,
    quarantined: HashSet<String>,
}

impl EndpointSelector {
    pub fn new(endpoints: Vec<String>, strategy: SelectionStrategy) -> Self {
        Self {
            endpoints,
            strategy,
            cursor: 0,
            quarantined: HashSet::new(),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    // == Select ==
    /// Chooses the next endpoint. None only when no endpoints are configured.
    ///
    /// When quarantine covers every candidate it is cleared first, so
    /// selection never locks out.
    pub fn select(&mut self, health: &HealthTracker) -> Option<String> {
        if self.endpoints.is_empty() {
            return None;
        }

        if self.endpoints.iter().all(|e| self.quarantined.contains(e)) {
            warn!(
                endpoints = self.endpoints.len(),
                "all endpoints quarantined, clearing quarantine"
            );
            self.quarantined.clear();
        }

        match self.strategy {
            SelectionStrategy::RoundRobin => self.next_round_robin(),
            SelectionStrategy::Random => {
                let available = self.available();
                let index = rand::thread_rng().gen_range(0..available.len());
                Some(available[index].clone())
            }
            SelectionStrategy::HealthRanked => {
                let available = self.available();
                let healthy: Vec<&String> = available
                    .iter()
                    .copied()
                    .filter(|e| health.is_healthy(e))
                    .collect();
                let pool = if healthy.is_empty() { available } else { healthy };

                // Measured endpoints rank ahead of unmeasured ones; ties keep
                // configured order.
                pool.into_iter()
                    .min_by_key(|e| {
                        let latency = health.latency(e);
                        (latency.is_none(), latency.unwrap_or_default())
                    })
                    .cloned()
            }
        }
    }

    fn next_round_robin(&mut self) -> Option<String> {
        let n = self.endpoints.len();
        (0..n)
            .map(|offset| (self.cursor + offset) % n)
            .find(|&index| !self.quarantined.contains(&self.endpoints[index]))
            .map(|index| {
                self.cursor = (index + 1) % n;
                self.endpoints[index].clone()
            })
    }

    fn available(&self) -> Vec<&String> {
        self.endpoints
            .iter()
            .filter(|e| !self.quarantined.contains(*e))
            .collect()
    }

    // == Quarantine ==
    /// Excludes an endpoint from selection. Returns true if newly quarantined.
    pub fn quarantine(&mut self, endpoint: &str) -> bool {
        if !self.endpoints.iter().any(|e| e == endpoint) {
            return false;
        }
        let added = self.quarantined.insert(endpoint.to_string());
        if added {
            warn!(endpoint, "endpoint quarantined");
        }
        added
    }

    /// Returns an endpoint to selection. Returns true if it was quarantined.
    pub fn release(&mut self, endpoint: &str) -> bool {
        let removed = self.quarantined.remove(endpoint);
        if removed {
            info!(endpoint, "endpoint released from quarantine");
        }
        removed
    }

    pub fn is_quarantined(&self, endpoint: &str) -> bool {
        self.quarantined.contains(endpoint)
    }

    /// Quarantined endpoints in configured order.
    pub fn quarantined(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .filter(|e| self.quarantined.contains(*e))
            .cloned()
            .collect()
    }
}
