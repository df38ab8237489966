//! Per-resource trackers feeding the duress and cancellation decisions.
//!
//! Each tracker owns one resource dimension: it samples the node-level signal
//! into its breach window each iteration (if it has one) and nominates
//! cancellation candidates by its own per-task criterion. The set of trackers
//! is fixed and their relative priority is part of the contract, so the merge
//! layer holds named instances rather than a dynamic list.

mod cpu;
mod elapsed;
mod heap;

pub use cpu::CpuUtilizationTracker;
pub use elapsed::ElapsedTimeTracker;
pub use heap::HeapMemoryTracker;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShedResult;
use crate::task::SharedTask;

/// Identifies which tracker nominated a cancellation candidate.
///
/// Doubles as the merge priority: heap-memory candidates outrank CPU-cycle
/// candidates, which outrank elapsed-time candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    ElapsedTime,
    CpuCycle,
    HeapMemory,
}

impl TrackerKind {
    /// Merge priority; higher values are cancelled first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::ElapsedTime => 0,
            Self::CpuCycle => 1,
            Self::HeapMemory => 2,
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElapsedTime => f.write_str("elapsed_time"),
            Self::CpuCycle => f.write_str("cpu_cycle"),
            Self::HeapMemory => f.write_str("heap_memory"),
        }
    }
}

/// One resource dimension's view of the node and its tasks.
pub trait TaskResourceTracker {
    /// Sample the node-level signal for this iteration, if the tracker has
    /// one. A failed probe records nothing and aborts the iteration.
    fn start_iteration(&mut self) -> ShedResult<()>;

    /// Whether the node-level signal breached in every window slot.
    fn is_limit_consecutively_breached(&self) -> bool;

    /// Tasks this tracker nominates for cancellation, by its own criterion.
    fn eligible_tasks(&self, tasks: &[SharedTask]) -> ShedResult<Vec<SharedTask>>;
}
