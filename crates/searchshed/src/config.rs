//! Backpressure policy configuration.
//!
//! Every threshold the control loop consults is a named field here rather
//! than a buried constant. The struct deserializes from whatever format the
//! host uses (TOML, JSON) and validates once at manager construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ShedError, ShedResult};

const DEFAULT_WINDOW_SIZE: usize = 3;
const DEFAULT_CPU_LOAD_THRESHOLD: f64 = 0.9;
const DEFAULT_HEAP_USED_PERCENT_THRESHOLD: u8 = 70;
const DEFAULT_TASK_CPU_TIME_THRESHOLD_NANOS: u64 = 15_000_000;
const DEFAULT_TASK_ELAPSED_TIME_THRESHOLD_MS: u64 = 30_000;
const DEFAULT_TASK_HEAP_FLOOR_FRACTION: f64 = 0.005;
const DEFAULT_VARIANCE_THRESHOLD: f64 = 2.0;
const DEFAULT_SEARCH_HEAP_FRACTION: f64 = 0.05;
const DEFAULT_CANCELLATION_RATIO_CEILING: f64 = 0.01;
const DEFAULT_LONG_WINDOW_RESET_PERIOD_MS: u64 = 60_000;

/// Policy values for the backpressure control loop.
///
/// Heap-relative values (`task_heap_floor_fraction`, `search_heap_fraction`)
/// are stored as fractions and resolved against the monitor-reported maximum
/// heap at decision time, so a resized heap needs no config change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BackpressureConfig {
    /// Master switch. When false, `run_iteration` is a no-op.
    pub enabled: bool,

    /// Sliding-window size for breach tracking and the cancellation cooldown.
    pub window_size: usize,

    /// Process CPU load fraction above which an iteration counts as a CPU
    /// breach. Range (0, 1].
    pub cpu_load_threshold: f64,

    /// Heap occupancy percentage above which an iteration counts as a heap
    /// breach.
    pub heap_used_percent_threshold: u8,

    /// Cumulative per-task CPU time (nanoseconds) above which a task becomes
    /// a CPU cancellation candidate.
    ///
    /// The default of 15 ms is deliberately aggressive and flags nearly any
    /// non-trivial query; raise it to match the workload before relying on
    /// CPU-based cancellation in production.
    pub task_cpu_time_threshold_nanos: u64,

    /// Per-task wall-clock running time (milliseconds) above which a task
    /// becomes an elapsed-time cancellation candidate.
    pub task_elapsed_time_threshold_ms: u64,

    /// Fraction of max heap a task must exceed before it can be a heap
    /// cancellation candidate at all. Filters out trivially small tasks.
    pub task_heap_floor_fraction: f64,

    /// A task is a heap candidate only when its memory use exceeds
    /// `max(running average, completed average) * variance_threshold`.
    pub variance_threshold: f64,

    /// Fraction of max heap that aggregate search-task memory must exceed
    /// before any cancellation happens; OS-level duress alone is not enough.
    pub search_heap_fraction: f64,

    /// Ceiling on `cancelled tasks / completed tasks` over the long
    /// accounting window. Once the ratio strictly exceeds this, the loop
    /// stops cancelling until the window resets. The default of 1 % is the
    /// conservative end of the useful range; operators comfortable with more
    /// aggressive shedding typically run 0.10.
    pub cancellation_ratio_ceiling: f64,

    /// How often (milliseconds) the long-window completed/cancelled task
    /// sets are wholesale reset.
    pub long_window_reset_period_ms: u64,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: DEFAULT_WINDOW_SIZE,
            cpu_load_threshold: DEFAULT_CPU_LOAD_THRESHOLD,
            heap_used_percent_threshold: DEFAULT_HEAP_USED_PERCENT_THRESHOLD,
            task_cpu_time_threshold_nanos: DEFAULT_TASK_CPU_TIME_THRESHOLD_NANOS,
            task_elapsed_time_threshold_ms: DEFAULT_TASK_ELAPSED_TIME_THRESHOLD_MS,
            task_heap_floor_fraction: DEFAULT_TASK_HEAP_FLOOR_FRACTION,
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
            search_heap_fraction: DEFAULT_SEARCH_HEAP_FRACTION,
            cancellation_ratio_ceiling: DEFAULT_CANCELLATION_RATIO_CEILING,
            long_window_reset_period_ms: DEFAULT_LONG_WINDOW_RESET_PERIOD_MS,
        }
    }
}

impl BackpressureConfig {
    /// Validate all fields, returning the first violation found.
    pub fn validate(&self) -> ShedResult<()> {
        if self.window_size == 0 {
            return Err(invalid("window_size", "must be at least 1"));
        }
        if !(self.cpu_load_threshold > 0.0 && self.cpu_load_threshold <= 1.0) {
            return Err(invalid("cpu_load_threshold", "must be in (0, 1]"));
        }
        if self.heap_used_percent_threshold > 100 {
            return Err(invalid("heap_used_percent_threshold", "must be at most 100"));
        }
        if !(self.task_heap_floor_fraction > 0.0 && self.task_heap_floor_fraction < 1.0) {
            return Err(invalid("task_heap_floor_fraction", "must be in (0, 1)"));
        }
        if !(self.variance_threshold > 0.0) {
            return Err(invalid("variance_threshold", "must be positive"));
        }
        if !(self.search_heap_fraction > 0.0 && self.search_heap_fraction < 1.0) {
            return Err(invalid("search_heap_fraction", "must be in (0, 1)"));
        }
        if !(self.cancellation_ratio_ceiling >= 0.0 && self.cancellation_ratio_ceiling < 1.0) {
            return Err(invalid("cancellation_ratio_ceiling", "must be in [0, 1)"));
        }
        if self.long_window_reset_period_ms == 0 {
            return Err(invalid("long_window_reset_period_ms", "must be positive"));
        }
        Ok(())
    }

    /// Elapsed-time cancellation threshold as a `Duration`.
    #[must_use]
    pub const fn task_elapsed_time_threshold(&self) -> Duration {
        Duration::from_millis(self.task_elapsed_time_threshold_ms)
    }

    /// Long-window reset period as a `Duration`.
    #[must_use]
    pub const fn long_window_reset_period(&self) -> Duration {
        Duration::from_millis(self.long_window_reset_period_ms)
    }

    /// Per-task heap floor in bytes, given the current max heap.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn task_heap_floor_bytes(&self, max_heap_bytes: u64) -> f64 {
        self.task_heap_floor_fraction * max_heap_bytes as f64
    }

    /// Aggregate search-heap ceiling in bytes, given the current max heap.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn search_heap_limit_bytes(&self, max_heap_bytes: u64) -> f64 {
        self.search_heap_fraction * max_heap_bytes as f64
    }
}

fn invalid(field: &'static str, reason: &str) -> ShedError {
    ShedError::InvalidConfig {
        field,
        reason: reason.to_owned(),
    }
}
