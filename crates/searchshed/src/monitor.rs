//! Host resource signals consumed by the duress trackers.
//!
//! [`HostMonitor`] is the seam: trackers ask it for process CPU load, heap
//! occupancy, and the heap ceiling. [`SysinfoHostMonitor`] is the
//! batteries-included default backed by the `sysinfo` crate; hosts with their
//! own allocator or cgroup telemetry implement the trait directly.

use std::sync::Mutex;

use sysinfo::System;
use tracing::debug;

use crate::error::{ShedError, ShedResult};
use crate::sync::lock_or_recover;
use crate::trace::targets;

/// Live host signals, sampled once per control-loop iteration.
///
/// Every method is fallible: a monitor that cannot produce a reading must
/// return an error rather than a guessed value, so the iteration aborts
/// instead of recording a false "not breached" sample.
pub trait HostMonitor: Send + Sync {
    /// Process CPU load as a fraction in `[0.0, 1.0]`.
    fn process_cpu_load_fraction(&self) -> ShedResult<f64>;

    /// Heap occupancy as a whole percentage in `[0, 100]`.
    fn heap_used_percent(&self) -> ShedResult<u8>;

    /// Maximum heap the node may use, in bytes.
    fn max_heap_bytes(&self) -> ShedResult<u64>;
}

/// Default [`HostMonitor`] backed by `sysinfo`.
///
/// Approximates heap signals with system-wide memory: used-memory percentage
/// for occupancy and total memory for the ceiling. That is the right model
/// for a node that owns its box; containerized deployments with tighter
/// limits should implement [`HostMonitor`] against their cgroup telemetry.
pub struct SysinfoHostMonitor {
    system: Mutex<System>,
}

impl std::fmt::Debug for SysinfoHostMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoHostMonitor").finish_non_exhaustive()
    }
}

impl Default for SysinfoHostMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoHostMonitor {
    /// Create a monitor and take the initial refresh.
    ///
    /// CPU usage is computed between refreshes, so the first sample after
    /// construction may read as zero.
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl HostMonitor for SysinfoHostMonitor {
    fn process_cpu_load_fraction(&self) -> ShedResult<f64> {
        let mut system = lock_or_recover(&self.system);
        system.refresh_cpu_all();
        let fraction = (f64::from(system.global_cpu_usage()) / 100.0).clamp(0.0, 1.0);
        debug!(target: targets::MONITOR, fraction, "sampled cpu load");
        Ok(fraction)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn heap_used_percent(&self) -> ShedResult<u8> {
        let mut system = lock_or_recover(&self.system);
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(ShedError::MonitorUnavailable {
                detail: "total system memory reported as zero".to_owned(),
            });
        }
        let percent = (system.used_memory() as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
        Ok(percent as u8)
    }

    fn max_heap_bytes(&self) -> ShedResult<u64> {
        let mut system = lock_or_recover(&self.system);
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(ShedError::MonitorUnavailable {
                detail: "total system memory reported as zero".to_owned(),
            });
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysinfo_monitor_returns_plausible_readings() {
        let monitor = SysinfoHostMonitor::new();
        let cpu = monitor.process_cpu_load_fraction().unwrap();
        assert!((0.0..=1.0).contains(&cpu));
        let heap = monitor.heap_used_percent().unwrap();
        assert!(heap <= 100);
        assert!(monitor.max_heap_bytes().unwrap() > 0);
    }

    #[test]
    fn debug_impl_elides_system_handle() {
        let monitor = SysinfoHostMonitor::new();
        let rendered = format!("{monitor:?}");
        assert!(rendered.contains("SysinfoHostMonitor"));
    }
}
