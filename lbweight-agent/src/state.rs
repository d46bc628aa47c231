//! Health state of the endpoint the agent runs next to

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Health state shared between the toggle handlers (writers) and the
/// health responder (reader)
pub type SharedHealth = Arc<RwLock<HealthState>>;

/// Whether the endpoint should receive traffic
#[derive(Debug, Clone)]
pub struct HealthState {
    pub is_healthy: bool,
    pub changed_at: Instant,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            is_healthy: true,
            changed_at: Instant::now(),
        }
    }
}

impl HealthState {
    /// Shared state, initialized healthy
    pub fn shared() -> SharedHealth {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Put the endpoint back into rotation.
    ///
    /// Returns how long it was out of rotation, `None` if it already was in.
    pub fn mark_up(&mut self) -> Option<Duration> {
        self.set(true)
    }

    /// Take the endpoint out of rotation.
    ///
    /// Returns how long it was in rotation, `None` if it already was out.
    pub fn mark_down(&mut self) -> Option<Duration> {
        self.set(false)
    }

    /// Time since the last change of state
    pub fn since(&self) -> Duration {
        self.changed_at.elapsed()
    }

    fn set(&mut self, healthy: bool) -> Option<Duration> {
        if self.is_healthy == healthy {
            return None;
        }
        let held = self.since();
        self.is_healthy = healthy;
        self.changed_at = Instant::now();
        Some(held)
    }
}
