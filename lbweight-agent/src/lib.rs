//! lbweight Status Agent Library
//!
//! Sidecar run next to every cluster endpoint. Exposes over HTTP:
//! - A health check the operator can toggle with `/up` and `/down`
//! - A hardware report (CPU, disk, memory, swap utilization)

pub mod config;
pub mod hardware;
pub mod server;
pub mod state;

pub use config::{AgentConfig, ConfigError};
pub use hardware::HardwareSampler;
pub use server::{router, serve, AgentState};
pub use state::{HealthState, SharedHealth};
