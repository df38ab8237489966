//! Elapsed-time tracker: long-running-task candidates only.

use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::config::BackpressureConfig;
use crate::error::ShedResult;
use crate::task::SharedTask;
use crate::trace::targets;
use crate::trackers::TaskResourceTracker;

/// Flags tasks whose wall-clock running time exceeds the threshold.
///
/// Stateless: elapsed time alone never declares node-wide duress, so this
/// tracker keeps no window and always answers `false` to the consecutive
/// breach question. Its candidates only surface once CPU or heap duress has
/// already been established.
pub struct ElapsedTimeTracker {
    threshold: Duration,
}

impl ElapsedTimeTracker {
    #[must_use]
    pub fn new(config: &BackpressureConfig) -> Self {
        Self {
            threshold: config.task_elapsed_time_threshold(),
        }
    }
}

impl TaskResourceTracker for ElapsedTimeTracker {
    fn start_iteration(&mut self) -> ShedResult<()> {
        // No node-level signal to sample.
        Ok(())
    }

    fn is_limit_consecutively_breached(&self) -> bool {
        false
    }

    fn eligible_tasks(&self, tasks: &[SharedTask]) -> ShedResult<Vec<SharedTask>> {
        let now = SystemTime::now();
        let eligible: Vec<SharedTask> = tasks
            .iter()
            .filter(|task| {
                // A start time in the future (clock skew) reads as zero elapsed.
                now.duration_since(task.start_time()).unwrap_or_default() > self.threshold
            })
            .cloned()
            .collect();
        if !eligible.is_empty() {
            debug!(
                target: targets::ELAPSED,
                count = eligible.len(),
                threshold_ms = self.threshold.as_millis() as u64,
                "long-running tasks flagged"
            );
        }
        Ok(eligible)
    }
}
