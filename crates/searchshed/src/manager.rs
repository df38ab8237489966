//! The backpressure control loop.
//!
//! One iteration, in order: sample node signals; honor the cancellation
//! cooldown; check duress; check that aggregate search memory is material;
//! then cancel candidates in priority order under the rate ceiling. The
//! cancellation tracker is closed out exactly once per completed iteration,
//! whichever branch was taken. A dependency failure aborts the tick entirely
//! — no breach sample, no cancellation, no history entry.
//!
//! The scheduler must not overlap invocations: at most one iteration in
//! flight at a time is a precondition, not something enforced here.
//! Completion signals, by contrast, may arrive from any thread at any time.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cancellation::{CancellationStats, CancellationTracker};
use crate::config::BackpressureConfig;
use crate::error::ShedResult;
use crate::monitor::HostMonitor;
use crate::resource::ResourceTracker;
use crate::sync::lock_or_recover;
use crate::task::{ResourceStat, TaskRegistry};
use crate::trace::targets;

/// Reason string recorded on every task this loop cancels.
pub const CANCEL_REASON: &str = "resource consumption exceeded";

/// What one control-loop iteration decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Backpressure is disabled in config; nothing was evaluated.
    Disabled,
    /// Recent cancellation activity suppressed actuation for this tick.
    CoolingDown,
    /// The node is not in duress.
    Nominal,
    /// In duress, but aggregate search-task memory is not material.
    AggregateBelowLimit,
    /// Actuation ran; `cancelled` tasks were cancelled this tick.
    Actuated {
        /// Number of tasks cancelled (zero when the rate ceiling was already
        /// reached or every candidate was cancelled previously).
        cancelled: usize,
    },
}

/// Owns the resource trackers and cancellation accounting for the lifetime
/// of the control loop.
///
/// The resource tracker sits behind a mutex so `run_iteration` can take
/// `&self` and the manager can be shared (`Arc`) with the threads that
/// deliver completion signals. The lock is uncontended in practice: only the
/// scheduler thread runs iterations.
pub struct BackpressureManager {
    config: BackpressureConfig,
    monitor: Arc<dyn HostMonitor>,
    resource: Mutex<ResourceTracker>,
    cancellation: CancellationTracker,
}

impl BackpressureManager {
    /// Build the control loop, validating the config up front.
    pub fn new(
        config: BackpressureConfig,
        registry: Arc<dyn TaskRegistry>,
        monitor: Arc<dyn HostMonitor>,
    ) -> ShedResult<Self> {
        config.validate()?;
        let resource = ResourceTracker::new(&config, registry, Arc::clone(&monitor));
        let cancellation = CancellationTracker::new(&config);
        Ok(Self {
            config,
            monitor,
            resource: Mutex::new(resource),
            cancellation,
        })
    }

    /// Run one control-loop iteration.
    ///
    /// Errors indicate a dependency failure (host monitor or task registry);
    /// the tick is treated as not having happened and the next tick retries.
    #[allow(clippy::cast_precision_loss)]
    pub fn run_iteration(&self) -> ShedResult<IterationOutcome> {
        if !self.config.enabled {
            return Ok(IterationOutcome::Disabled);
        }

        let mut resource = lock_or_recover(&self.resource);
        resource.start_iteration()?;

        if self.cancellation.task_cancelled_within_window() {
            debug!(
                target: targets::MANAGER,
                still_in_duress = resource.is_node_in_duress(),
                "recent cancellation activity; observing only"
            );
            self.cancellation.reset_for_next_iteration();
            return Ok(IterationOutcome::CoolingDown);
        }

        if !resource.is_node_in_duress() {
            self.cancellation.reset_for_next_iteration();
            return Ok(IterationOutcome::Nominal);
        }

        let tasks = resource.search_tasks()?;
        let aggregate_memory: u64 = tasks
            .iter()
            .map(|task| task.resource_utilization(ResourceStat::Memory))
            .fold(0, u64::saturating_add);
        let limit_bytes = self
            .config
            .search_heap_limit_bytes(self.monitor.max_heap_bytes()?);
        info!(
            target: targets::MANAGER,
            aggregate_memory,
            limit_bytes,
            tasks = tasks.len(),
            "node in duress; checking aggregate search memory"
        );
        if aggregate_memory as f64 <= limit_bytes {
            self.cancellation.reset_for_next_iteration();
            return Ok(IterationOutcome::AggregateBelowLimit);
        }

        let candidates = resource.eligible_tasks_to_cancel(&tasks)?;
        let mut cancelled = 0_usize;
        for (kind, task) in &candidates {
            // The ceiling is re-checked before every cancellation, against
            // the candidate list computed once for this tick.
            if self.cancellation.is_cancellation_limit_reached(&candidates) {
                info!(
                    target: targets::MANAGER,
                    cancelled,
                    remaining = candidates.len() - cancelled,
                    "cancellation ceiling reached; stopping for this tick"
                );
                break;
            }
            if task.is_cancelled() {
                continue;
            }
            warn!(
                target: targets::MANAGER,
                task_id = task.id(),
                tracker = %kind,
                memory_bytes = task.resource_utilization(ResourceStat::Memory),
                "cancelling task"
            );
            task.cancel(CANCEL_REASON);
            self.cancellation.record_task_cancellation(task.as_ref());
            cancelled += 1;
        }

        self.cancellation.reset_for_next_iteration();
        Ok(IterationOutcome::Actuated { cancelled })
    }

    /// Relay a task completion into the long-window accounting. Safe from
    /// any thread.
    pub fn signal_task_completed(&self, task_id: u64) {
        self.cancellation.signal_task_completed(task_id);
    }

    /// Current cancellation accounting snapshot.
    #[must_use]
    pub fn cancellation_stats(&self) -> CancellationStats {
        self.cancellation.stats()
    }

    /// The validated config this loop runs with.
    #[must_use]
    pub const fn config(&self) -> &BackpressureConfig {
        &self.config
    }
}
