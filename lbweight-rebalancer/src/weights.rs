//! Weight computation
//!
//! Turns the loads sampled from a cluster's healthy endpoints into new
//! traffic weights. An endpoint below the cluster's average load gains
//! weight, one above it loses weight.

use lbweight_core::{MAX_WEIGHT, MIN_WEIGHT};
use std::collections::HashMap;

/// Multiplier applied to the distance from the average load
pub const SENSITIVITY: f64 = 1.3;

/// Healthy endpoints needed before a cluster is rebalanced
pub const MIN_HEALTHY_ENDPOINTS: usize = 2;

/// One endpoint as observed during a pass
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub address: String,
    /// Weight currently in the document
    pub weight: i64,
    pub healthy: bool,
    /// Hardware load (CPU percent)
    pub load: i64,
    /// Weight to write back; equals `weight` until computed
    pub new_weight: i64,
}

impl Endpoint {
    pub fn healthy(address: impl Into<String>, weight: i64, load: i64) -> Self {
        Self {
            address: address.into(),
            weight,
            healthy: true,
            load,
            new_weight: weight,
        }
    }
}

/// Healthy endpoints sampled from one cluster, with running totals
#[derive(Debug, Default, Clone)]
pub struct ClusterSample {
    endpoints: HashMap<String, Endpoint>,
    /// Sum of the load of every healthy probe
    total_load: i64,
    /// Number of healthy probes
    healthy_count: usize,
}

impl ClusterSample {
    /// Record a healthy endpoint. A repeated address replaces the earlier
    /// entry while its load stays counted in the total.
    pub fn record(&mut self, endpoint: Endpoint) {
        self.total_load = self.total_load.saturating_add(endpoint.load);
        self.healthy_count += 1;
        self.endpoints.insert(endpoint.address.clone(), endpoint);
    }

    pub fn get(&self, address: &str) -> Option<&Endpoint> {
        self.endpoints.get(address)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Number of distinct endpoints recorded
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn total_load(&self) -> i64 {
        self.total_load
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy_count
    }

    /// Whether enough endpoints were recorded to rebalance
    pub fn is_balanceable(&self) -> bool {
        self.len() >= MIN_HEALTHY_ENDPOINTS
    }

    /// Integer average load over the recorded endpoints
    pub fn average_load(&self) -> Option<i64> {
        if self.endpoints.is_empty() {
            None
        } else {
            Some(self.total_load / self.endpoints.len() as i64)
        }
    }

    /// Compute `new_weight` for every recorded endpoint
    pub fn rebalance(&mut self) {
        let Some(average) = self.average_load() else {
            return;
        };
        for endpoint in self.endpoints.values_mut() {
            endpoint.new_weight = rebalanced_weight(endpoint.weight, endpoint.load, average);
        }
    }
}

/// New weight of an endpoint given its load and the cluster average,
/// truncated and clamped to `[MIN_WEIGHT, MAX_WEIGHT]`
pub fn rebalanced_weight(weight: i64, load: i64, average: i64) -> i64 {
    let delta = (average as f64 - load as f64) * SENSITIVITY;
    let weight = (weight as f64 + delta) as i64;
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}
