//! CPU utilization tracker: node-level load window + per-task CPU-time
//! candidates.

use std::sync::Arc;

use tracing::debug;

use crate::config::BackpressureConfig;
use crate::error::ShedResult;
use crate::monitor::HostMonitor;
use crate::task::{ResourceStat, SharedTask};
use crate::trace::targets;
use crate::trackers::TaskResourceTracker;
use crate::window::BreachWindow;

/// Samples process CPU load into a breach window each iteration and flags
/// tasks whose cumulative CPU time exceeds the configured threshold.
pub struct CpuUtilizationTracker {
    monitor: Arc<dyn HostMonitor>,
    window: BreachWindow,
    load_threshold: f64,
    task_cpu_time_threshold_nanos: u64,
}

impl CpuUtilizationTracker {
    #[must_use]
    pub fn new(config: &BackpressureConfig, monitor: Arc<dyn HostMonitor>) -> Self {
        Self {
            monitor,
            window: BreachWindow::new(config.window_size),
            load_threshold: config.cpu_load_threshold,
            task_cpu_time_threshold_nanos: config.task_cpu_time_threshold_nanos,
        }
    }
}

impl TaskResourceTracker for CpuUtilizationTracker {
    fn start_iteration(&mut self) -> ShedResult<()> {
        // Probe before recording: a failed probe must leave the window as-is.
        let load = self.monitor.process_cpu_load_fraction()?;
        let breached = load > self.load_threshold;
        self.window.record(breached);
        debug!(
            target: targets::CPU,
            load,
            breached,
            window = ?self.window.samples().collect::<Vec<_>>(),
            "sampled process cpu load"
        );
        Ok(())
    }

    fn is_limit_consecutively_breached(&self) -> bool {
        self.window.consecutively_breached()
    }

    fn eligible_tasks(&self, tasks: &[SharedTask]) -> ShedResult<Vec<SharedTask>> {
        Ok(tasks
            .iter()
            .filter(|task| {
                task.resource_utilization(ResourceStat::Cpu) > self.task_cpu_time_threshold_nanos
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::SystemTime;

    use crate::error::ShedError;
    use crate::task::CancellableTask;

    struct ScriptedMonitor {
        loads: Mutex<Vec<f64>>,
    }

    impl ScriptedMonitor {
        fn new(loads: &[f64]) -> Arc<Self> {
            let mut reversed: Vec<f64> = loads.to_vec();
            reversed.reverse();
            Arc::new(Self {
                loads: Mutex::new(reversed),
            })
        }
    }

    impl HostMonitor for ScriptedMonitor {
        fn process_cpu_load_fraction(&self) -> ShedResult<f64> {
            self.loads
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ShedError::MonitorUnavailable {
                    detail: "script exhausted".to_owned(),
                })
        }

        fn heap_used_percent(&self) -> ShedResult<u8> {
            Ok(0)
        }

        fn max_heap_bytes(&self) -> ShedResult<u64> {
            Ok(1)
        }
    }

    struct CpuTask {
        id: u64,
        cpu_nanos: u64,
    }

    impl CancellableTask for CpuTask {
        fn id(&self) -> u64 {
            self.id
        }

        fn start_time(&self) -> SystemTime {
            SystemTime::now()
        }

        fn resource_utilization(&self, stat: ResourceStat) -> u64 {
            match stat {
                ResourceStat::Cpu => self.cpu_nanos,
                ResourceStat::Memory => 0,
            }
        }

        fn is_cancelled(&self) -> bool {
            false
        }

        fn cancel(&self, _reason: &str) {}
    }

    fn task(id: u64, cpu_nanos: u64) -> SharedTask {
        Arc::new(CpuTask { id, cpu_nanos })
    }

    #[test]
    fn duress_requires_full_window_of_breaches() {
        let monitor = ScriptedMonitor::new(&[0.95, 0.95, 0.95]);
        let mut tracker = CpuUtilizationTracker::new(&BackpressureConfig::default(), monitor);

        tracker.start_iteration().unwrap();
        assert!(!tracker.is_limit_consecutively_breached());
        tracker.start_iteration().unwrap();
        assert!(!tracker.is_limit_consecutively_breached());
        tracker.start_iteration().unwrap();
        assert!(tracker.is_limit_consecutively_breached());
    }

    #[test]
    fn one_quiet_sample_clears_duress() {
        let monitor = ScriptedMonitor::new(&[0.95, 0.95, 0.95, 0.5]);
        let mut tracker = CpuUtilizationTracker::new(&BackpressureConfig::default(), monitor);
        for _ in 0..3 {
            tracker.start_iteration().unwrap();
        }
        assert!(tracker.is_limit_consecutively_breached());
        tracker.start_iteration().unwrap();
        assert!(!tracker.is_limit_consecutively_breached());
    }

    #[test]
    fn load_exactly_at_threshold_is_not_a_breach() {
        let monitor = ScriptedMonitor::new(&[0.9, 0.9, 0.9]);
        let mut tracker = CpuUtilizationTracker::new(&BackpressureConfig::default(), monitor);
        for _ in 0..3 {
            tracker.start_iteration().unwrap();
        }
        assert!(!tracker.is_limit_consecutively_breached());
    }

    #[test]
    fn failed_probe_records_no_sample() {
        let monitor = ScriptedMonitor::new(&[0.95]);
        let mut tracker = CpuUtilizationTracker::new(&BackpressureConfig::default(), monitor);
        tracker.start_iteration().unwrap();
        assert!(tracker.start_iteration().is_err());
        // Only the successful probe left a sample behind.
        assert_eq!(tracker.window.len(), 1);
    }

    #[test]
    fn flags_tasks_over_the_cpu_time_threshold() {
        let monitor = ScriptedMonitor::new(&[]);
        let tracker = CpuUtilizationTracker::new(&BackpressureConfig::default(), monitor);
        let tasks = vec![
            task(1, 15_000_000),
            task(2, 15_000_001),
            task(3, 40_000_000),
        ];
        let eligible = tracker.eligible_tasks(&tasks).unwrap();
        let ids: Vec<u64> = eligible.iter().map(|t| t.id()).collect();
        // Strict `>`: a task exactly at the threshold stays.
        assert_eq!(ids, vec![2, 3]);
    }
}
