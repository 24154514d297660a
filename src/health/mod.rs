//! Health Module
//!
//! Endpoint health tracking and failover selection.

mod selector;
mod tracker;

use serde::Serialize;

pub use selector::{EndpointSelector, SelectionStrategy};
pub use tracker::{EndpointHealth, EndpointStatus, HealthRecord, HealthTracker};

// == Failover Stats ==
/// Point-in-time view of endpoint health and quarantine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailoverStats {
    pub total_endpoints: usize,
    /// Endpoints that are neither unhealthy nor quarantined
    pub healthy_endpoints: usize,
    pub quarantined_endpoints: Vec<String>,
    pub strategy: SelectionStrategy,
    pub endpoints: Vec<EndpointHealth>,
}

impl FailoverStats {
    pub fn collect(selector: &EndpointSelector, health: &HealthTracker) -> Self {
        let endpoints: Vec<EndpointHealth> = health
            .snapshot(selector.endpoints())
            .into_iter()
            .map(|mut view| {
                view.quarantined = selector.is_quarantined(&view.endpoint);
                view
            })
            .collect();

        let healthy_endpoints = endpoints
            .iter()
            .filter(|view| !view.quarantined && view.status != EndpointStatus::Unhealthy)
            .count();

        Self {
            total_endpoints: endpoints.len(),
            healthy_endpoints,
            quarantined_endpoints: selector.quarantined(),
            strategy: selector.strategy(),
            endpoints,
        }
    }
}
