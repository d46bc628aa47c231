//! Hardware utilization payload exchanged between agent and rebalancer

use serde::{Deserialize, Serialize};

/// Highest load a report can carry
pub const MAX_LOAD: i64 = 100;

/// Resource utilization of one endpoint, all values in percent.
///
/// Field names on the wire are `CPU`, `Disk`, `Mem` and `Swap`; missing
/// fields read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareReport {
    #[serde(rename = "CPU", default)]
    pub cpu: f64,
    #[serde(rename = "Disk", default)]
    pub disk: f64,
    #[serde(rename = "Mem", default)]
    pub mem: f64,
    #[serde(rename = "Swap", default)]
    pub swap: f64,
}

impl HardwareReport {
    /// The rebalancing signal: CPU percent truncated to an integer in
    /// `0..=MAX_LOAD`
    pub fn load(&self) -> i64 {
        if self.cpu.is_finite() && self.cpu > 0.0 {
            (self.cpu as i64).min(MAX_LOAD)
        } else {
            0
        }
    }
}
