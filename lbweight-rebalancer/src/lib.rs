//! lbweight Rebalancer Library
//!
//! Recomputes Envoy endpoint weights from live health and hardware load:
//! - Endpoint probing against the sidecar agents (health, then CPU load)
//! - Weight computation from each endpoint's distance to the cluster average
//! - In-place rewrite of `load_balancing_weight` in each cluster's EDS document

pub mod cluster;
pub mod config;
pub mod driver;
pub mod prober;
pub mod weights;

// Re-export main types
pub use cluster::{ClusterOutcome, ClusterRebalancer};
pub use config::{ConfigError, Settings};
pub use driver::{cluster_paths, Driver, PassReport};
pub use prober::{EndpointProber, HttpProber};
pub use weights::{rebalanced_weight, ClusterSample, Endpoint};
