//! Hardware utilization sampling

use lbweight_core::HardwareReport;
use std::path::Path;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use tokio::sync::Mutex;
use tracing::debug;

/// Default CPU sampling window
pub const DEFAULT_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Samples CPU, memory, swap and root filesystem usage
pub struct HardwareSampler {
    system: Mutex<System>,
    window: Duration,
}

impl HardwareSampler {
    /// Create a sampler measuring CPU usage over `window`
    pub fn new(window: Duration) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        Self {
            system: Mutex::new(system),
            window,
        }
    }

    /// Take one sample. Blocks for the sampling window; concurrent callers
    /// are serialized.
    pub async fn sample(&self) -> HardwareReport {
        let mut sys = self.system.lock().await;

        sys.refresh_cpu_all();
        tokio::time::sleep(self.window).await;
        sys.refresh_cpu_all();
        sys.refresh_memory();

        // Average CPU usage across all cores
        let cpu = sys
            .cpus()
            .iter()
            .map(|cpu| cpu.cpu_usage() as f64)
            .filter(|usage| usage.is_finite())
            .sum::<f64>()
            / sys.cpus().len().max(1) as f64;

        let report = HardwareReport {
            cpu,
            disk: root_disk_usage(),
            mem: percent(sys.used_memory(), sys.total_memory()),
            swap: percent(sys.used_swap(), sys.total_swap()),
        };

        debug!(
            cpu = format!("{:.1}%", report.cpu),
            disk = format!("{:.1}%", report.disk),
            mem = format!("{:.1}%", report.mem),
            swap = format!("{:.1}%", report.swap),
            "Hardware sampled"
        );

        report
    }
}

impl Default for HardwareSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_WINDOW)
    }
}

/// Usage of the filesystem mounted at `/`, zero if it cannot be found
fn root_disk_usage() -> f64 {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map(|disk| {
            let total = disk.total_space();
            percent(total.saturating_sub(disk.available_space()), total)
        })
        .unwrap_or(0.0)
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
