//! lbweight Core Library
//!
//! Shared pieces of the lbweight load-balancer weight rebalancer:
//! - Schema-agnostic document tree with name search over routing-proxy documents
//! - Hardware utilization payload reported by the sidecar agent
//! - Common error handling

pub mod document;
pub mod error;
pub mod hardware;

pub use document::{Document, DocumentNode, Scalar, ScalarStyle};
pub use error::{LbWeightError, Result};
pub use hardware::{HardwareReport, MAX_LOAD};

/// Lowest weight an endpoint can be assigned
pub const MIN_WEIGHT: i64 = 1;
/// Highest weight an endpoint can be assigned
pub const MAX_WEIGHT: i64 = 100;

/// Default port of the sidecar status agent
pub const DEFAULT_AGENT_PORT: u16 = 8888;
/// Default health path exposed by the agent
pub const DEFAULT_HEALTH_PATH: &str = "/";
/// Default hardware path exposed by the agent
pub const DEFAULT_HARDWARE_PATH: &str = "/hardware";
