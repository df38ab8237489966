//! The task-world interfaces this crate consumes.
//!
//! The control loop never executes tasks and never retains them across
//! iterations; it observes their counters through [`CancellableTask`] and
//! enumerates them through [`TaskRegistry`]. Both traits are dyn-compatible
//! so hosts plug in their own task system behind `Arc<dyn …>`.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::ShedResult;

/// The two cumulative resource counters every tracked task reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStat {
    /// CPU time, in nanoseconds.
    Cpu,
    /// Heap memory, in bytes.
    Memory,
}

impl fmt::Display for ResourceStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// A live, in-flight task the control loop may observe and cancel.
///
/// `cancel` must be idempotent: cancelling an already-cancelled task is a
/// no-op. Implementations set a flag and interrupt execution however their
/// runtime requires; that machinery is outside this crate.
pub trait CancellableTask: Send + Sync {
    /// Stable task identity.
    fn id(&self) -> u64;

    /// When the task started running.
    fn start_time(&self) -> SystemTime;

    /// Cumulative resource utilization: CPU in nanoseconds, memory in bytes.
    fn resource_utilization(&self, stat: ResourceStat) -> u64;

    /// Whether the task has already been cancelled.
    fn is_cancelled(&self) -> bool;

    /// Cancel the task, recording the given reason.
    fn cancel(&self, reason: &str);
}

/// Shared handle to a task; the registry and the control loop both hold these.
pub type SharedTask = Arc<dyn CancellableTask>;

/// Registry of resource-tracked in-flight tasks.
///
/// `refresh_resource_stats` must update counters synchronously so eligibility
/// decisions in the same iteration see current values, not a previous tick's.
pub trait TaskRegistry: Send + Sync {
    /// Snapshot of the currently tracked tasks.
    fn resource_tracked_tasks(&self) -> ShedResult<Vec<SharedTask>>;

    /// Synchronously refresh the cumulative counters of the given tasks.
    fn refresh_resource_stats(&self, tasks: &[SharedTask]) -> ShedResult<()>;

    /// Historical average memory consumption of completed tasks, in bytes.
    fn average_completed_task_memory(&self) -> ShedResult<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_stat_display() {
        assert_eq!(ResourceStat::Cpu.to_string(), "cpu");
        assert_eq!(ResourceStat::Memory.to_string(), "memory");
    }

    #[test]
    fn resource_stat_serde_round_trip() {
        let json = serde_json::to_string(&ResourceStat::Memory).unwrap();
        assert_eq!(json, "\"memory\"");
        let parsed: ResourceStat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ResourceStat::Memory);
    }
}
