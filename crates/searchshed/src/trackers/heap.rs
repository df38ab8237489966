//! Heap memory tracker: node-level occupancy window + variance-from-average
//! per-task candidates.

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::debug;

use crate::config::BackpressureConfig;
use crate::error::ShedResult;
use crate::monitor::HostMonitor;
use crate::task::{ResourceStat, SharedTask, TaskRegistry};
use crate::trace::targets;
use crate::trackers::TaskResourceTracker;
use crate::window::BreachWindow;

/// Samples heap occupancy into a breach window each iteration and flags
/// memory outliers among the running tasks.
///
/// A task is a candidate only when its memory use clears an absolute floor
/// (a fraction of max heap, so trivially small tasks never get flagged) AND
/// exceeds `variance_threshold` times the larger of the running-task average
/// and the completed-task average. The variance check targets outliers
/// relative to the current workload shape, not absolute size.
pub struct HeapMemoryTracker {
    monitor: Arc<dyn HostMonitor>,
    registry: Arc<dyn TaskRegistry>,
    window: BreachWindow,
    heap_used_percent_threshold: u8,
    heap_floor_fraction: f64,
    variance_threshold: f64,
}

impl HeapMemoryTracker {
    #[must_use]
    pub fn new(
        config: &BackpressureConfig,
        monitor: Arc<dyn HostMonitor>,
        registry: Arc<dyn TaskRegistry>,
    ) -> Self {
        Self {
            monitor,
            registry,
            window: BreachWindow::new(config.window_size),
            heap_used_percent_threshold: config.heap_used_percent_threshold,
            heap_floor_fraction: config.task_heap_floor_fraction,
            variance_threshold: config.variance_threshold,
        }
    }

    fn has_task_breached(&self, memory_bytes: f64, floor_bytes: f64, reference_avg: f64) -> bool {
        if memory_bytes <= floor_bytes {
            return false;
        }
        if reference_avg <= 0.0 {
            return false;
        }
        memory_bytes > reference_avg * self.variance_threshold
    }
}

impl TaskResourceTracker for HeapMemoryTracker {
    fn start_iteration(&mut self) -> ShedResult<()> {
        let percent = self.monitor.heap_used_percent()?;
        let breached = percent > self.heap_used_percent_threshold;
        self.window.record(breached);
        debug!(
            target: targets::HEAP,
            percent,
            breached,
            window = ?self.window.samples().collect::<Vec<_>>(),
            "sampled heap occupancy"
        );
        Ok(())
    }

    fn is_limit_consecutively_breached(&self) -> bool {
        self.window.consecutively_breached()
    }

    #[allow(clippy::cast_precision_loss)]
    fn eligible_tasks(&self, tasks: &[SharedTask]) -> ShedResult<Vec<SharedTask>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let running_sum: f64 = tasks
            .iter()
            .map(|task| task.resource_utilization(ResourceStat::Memory) as f64)
            .sum();
        let running_avg = running_sum / tasks.len() as f64;
        let completed_avg = self.registry.average_completed_task_memory()?;
        let reference_avg = running_avg.max(completed_avg);
        let floor_bytes = self.heap_floor_fraction * self.monitor.max_heap_bytes()? as f64;

        debug!(
            target: targets::HEAP,
            running_sum,
            running_avg,
            completed_avg,
            floor_bytes,
            "evaluating heap cancellation candidates"
        );

        // Biggest consumers first, so the merge layer cancels in the order
        // that frees the most memory soonest.
        let mut by_memory: Vec<SharedTask> = tasks.to_vec();
        by_memory.sort_by_key(|task| Reverse(task.resource_utilization(ResourceStat::Memory)));

        Ok(by_memory
            .into_iter()
            .filter(|task| {
                let memory = task.resource_utilization(ResourceStat::Memory) as f64;
                self.has_task_breached(memory, floor_bytes, reference_avg)
            })
            .collect())
    }
}
