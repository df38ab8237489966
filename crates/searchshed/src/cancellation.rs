//! Cancellation accounting: per-iteration counters, the cooldown window, and
//! the long-window rate limiter.
//!
//! Completion signals arrive from arbitrary worker threads while the control
//! loop runs on the scheduler thread, so state is split across two locks:
//!
//! 1. `iteration` — per-iteration counters and the cooldown window, touched
//!    by the control loop (and by readers taking a stats snapshot).
//! 2. `long_window` — the completed/cancelled id sets, touched by worker
//!    threads and the control loop.
//!
//! Lock order is `iteration` before `long_window` wherever both are needed;
//! critical sections stay tight around each read-modify-write and are never
//! held across a full iteration.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::BackpressureConfig;
use crate::resource::TaggedCandidate;
use crate::sync::lock_or_recover;
use crate::task::{CancellableTask, ResourceStat};
use crate::trace::targets;
use crate::window::BreachWindow;

struct IterationState {
    cancelled_count: u32,
    cancelled_cpu_nanos: u64,
    cancelled_memory_bytes: u64,
    cancelled_this_iteration: bool,
    history: BreachWindow,
}

struct LongWindow {
    completed: HashSet<u64>,
    cancelled: HashSet<u64>,
    /// `None` until the first reset arms the timer.
    last_reset: Option<Instant>,
}

/// Serializable snapshot of cancellation accounting, for logs and status
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CancellationStats {
    /// Tasks cancelled in the iteration currently being accumulated.
    pub cancelled_this_iteration: u32,
    /// CPU nanoseconds reclaimed by this iteration's cancellations.
    pub cancelled_cpu_nanos: u64,
    /// Memory bytes reclaimed by this iteration's cancellations.
    pub cancelled_memory_bytes: u64,
    /// Distinct tasks seen completed in the current long window.
    pub long_window_completed: usize,
    /// Distinct tasks cancelled in the current long window.
    pub long_window_cancelled: usize,
    /// Tasks cancelled over the tracker's lifetime.
    pub total_cancelled: u64,
}

/// Records cancellations and completions, suppresses actuation while recent
/// iterations already cancelled, and enforces the cancellation-rate ceiling.
pub struct CancellationTracker {
    iteration: Mutex<IterationState>,
    long_window: Mutex<LongWindow>,
    reset_period: Duration,
    ratio_ceiling: f64,
    total_cancelled: AtomicU64,
}

impl CancellationTracker {
    #[must_use]
    pub fn new(config: &BackpressureConfig) -> Self {
        Self {
            iteration: Mutex::new(IterationState {
                cancelled_count: 0,
                cancelled_cpu_nanos: 0,
                cancelled_memory_bytes: 0,
                cancelled_this_iteration: false,
                history: BreachWindow::new(config.window_size),
            }),
            long_window: Mutex::new(LongWindow {
                completed: HashSet::new(),
                cancelled: HashSet::new(),
                last_reset: None,
            }),
            reset_period: config.long_window_reset_period(),
            ratio_ceiling: config.cancellation_ratio_ceiling,
            total_cancelled: AtomicU64::new(0),
        }
    }

    /// Record one cancellation. Invoked after the task's cancelled flag is
    /// set.
    pub fn record_task_cancellation(&self, task: &dyn CancellableTask) {
        let cpu_nanos = task.resource_utilization(ResourceStat::Cpu);
        let memory_bytes = task.resource_utilization(ResourceStat::Memory);
        {
            let mut iteration = lock_or_recover(&self.iteration);
            iteration.cancelled_this_iteration = true;
            iteration.cancelled_count += 1;
            iteration.cancelled_cpu_nanos = iteration.cancelled_cpu_nanos.saturating_add(cpu_nanos);
            iteration.cancelled_memory_bytes =
                iteration.cancelled_memory_bytes.saturating_add(memory_bytes);
        }
        lock_or_recover(&self.long_window).cancelled.insert(task.id());
        self.total_cancelled.fetch_add(1, Ordering::Relaxed);
        info!(
            target: targets::CANCELLATION,
            task_id = task.id(),
            cpu_nanos,
            memory_bytes,
            "recorded task cancellation"
        );
    }

    /// Close out the current iteration: push the cancel flag into the
    /// cooldown window, clear per-iteration counters, and reset the long
    /// window when its period has elapsed.
    pub fn reset_for_next_iteration(&self) {
        {
            let mut iteration = lock_or_recover(&self.iteration);
            let flag = iteration.cancelled_this_iteration;
            iteration.history.record(flag);
            iteration.cancelled_count = 0;
            iteration.cancelled_cpu_nanos = 0;
            iteration.cancelled_memory_bytes = 0;
            iteration.cancelled_this_iteration = false;
        }
        self.reset_long_window_if_expired();
    }

    /// Whether any of the last few closed iterations cancelled at least one
    /// task. While true, the manager observes without actuating.
    #[must_use]
    pub fn task_cancelled_within_window(&self) -> bool {
        lock_or_recover(&self.iteration)
            .history
            .samples()
            .any(|cancelled| cancelled)
    }

    /// Whether the long-window cancelled/completed ratio strictly exceeds
    /// the configured ceiling.
    ///
    /// With no completions on record, any recorded cancellation counts as
    /// over the ceiling; a fully empty window does not.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_cancellation_limit_reached(&self, candidates: &[TaggedCandidate]) -> bool {
        let (completed, cancelled) = {
            let long_window = lock_or_recover(&self.long_window);
            (long_window.completed.len(), long_window.cancelled.len())
        };
        debug!(
            target: targets::CANCELLATION,
            completed,
            cancelled,
            candidates = candidates.len(),
            "checking cancellation ceiling"
        );
        if completed == 0 {
            return cancelled > 0;
        }
        cancelled as f64 / completed as f64 > self.ratio_ceiling
    }

    /// Record a task completion. Safe to call from any thread, for any task
    /// that finishes on the node.
    pub fn signal_task_completed(&self, task_id: u64) {
        lock_or_recover(&self.long_window).completed.insert(task_id);
    }

    /// Current accounting snapshot.
    #[must_use]
    pub fn stats(&self) -> CancellationStats {
        let (cancelled_this_iteration, cancelled_cpu_nanos, cancelled_memory_bytes) = {
            let iteration = lock_or_recover(&self.iteration);
            (
                iteration.cancelled_count,
                iteration.cancelled_cpu_nanos,
                iteration.cancelled_memory_bytes,
            )
        };
        let (long_window_completed, long_window_cancelled) = {
            let long_window = lock_or_recover(&self.long_window);
            (long_window.completed.len(), long_window.cancelled.len())
        };
        CancellationStats {
            cancelled_this_iteration,
            cancelled_cpu_nanos,
            cancelled_memory_bytes,
            long_window_completed,
            long_window_cancelled,
            total_cancelled: self.total_cancelled.load(Ordering::Relaxed),
        }
    }

    fn reset_long_window_if_expired(&self) {
        let mut long_window = lock_or_recover(&self.long_window);
        let expired = long_window
            .last_reset
            .map_or(true, |at| at.elapsed() >= self.reset_period);
        if expired {
            info!(
                target: targets::CANCELLATION,
                completed = long_window.completed.len(),
                cancelled = long_window.cancelled.len(),
                "resetting long-window task counters"
            );
            long_window.completed.clear();
            long_window.cancelled.clear();
            long_window.last_reset = Some(Instant::now());
        }
    }
}
