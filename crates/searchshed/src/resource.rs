//! Merge layer over the per-resource trackers.
//!
//! Answers the node-level duress question (OR across the CPU and heap
//! windows), snapshots the task registry with a synchronous counter refresh,
//! and merges the trackers' candidate lists into one priority-ordered,
//! deduplicated cancellation sequence.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::BackpressureConfig;
use crate::error::ShedResult;
use crate::monitor::HostMonitor;
use crate::task::{SharedTask, TaskRegistry};
use crate::trace::targets;
use crate::trackers::{
    CpuUtilizationTracker, ElapsedTimeTracker, HeapMemoryTracker, TaskResourceTracker, TrackerKind,
};

/// A cancellation candidate tagged with the tracker that nominated it.
pub type TaggedCandidate = (TrackerKind, SharedTask);

/// Orchestrates the three trackers and produces the merged candidate list.
///
/// The tracker set is fixed and its priority order is part of the contract,
/// so the fields are named instances rather than a collection.
pub struct ResourceTracker {
    registry: Arc<dyn TaskRegistry>,
    heap: HeapMemoryTracker,
    cpu: CpuUtilizationTracker,
    elapsed: ElapsedTimeTracker,
}

impl ResourceTracker {
    #[must_use]
    pub fn new(
        config: &BackpressureConfig,
        registry: Arc<dyn TaskRegistry>,
        monitor: Arc<dyn HostMonitor>,
    ) -> Self {
        Self {
            registry: Arc::clone(&registry),
            heap: HeapMemoryTracker::new(config, Arc::clone(&monitor), registry),
            cpu: CpuUtilizationTracker::new(config, monitor),
            elapsed: ElapsedTimeTracker::new(config),
        }
    }

    /// Sample every node-level signal for this iteration.
    ///
    /// CPU probes before heap; a failure leaves the not-yet-probed windows
    /// untouched and aborts the iteration. Each window only ever holds
    /// genuine observations.
    pub fn start_iteration(&mut self) -> ShedResult<()> {
        self.cpu.start_iteration()?;
        self.heap.start_iteration()?;
        self.elapsed.start_iteration()?;
        Ok(())
    }

    /// Whether any windowed signal has breached across its whole window.
    #[must_use]
    pub fn is_node_in_duress(&self) -> bool {
        self.heap.is_limit_consecutively_breached() || self.cpu.is_limit_consecutively_breached()
    }

    /// Snapshot the registry's tracked tasks with freshly refreshed counters.
    pub fn search_tasks(&self) -> ShedResult<Vec<SharedTask>> {
        let tasks = self.registry.resource_tracked_tasks()?;
        self.registry.refresh_resource_stats(&tasks)?;
        Ok(tasks)
    }

    /// Merge the trackers' candidate lists into one cancellation sequence.
    ///
    /// Candidates are ordered by tracker priority (heap, then CPU, then
    /// elapsed time) with each tracker's own internal ordering preserved. A
    /// task nominated by more than one tracker appears once, under its
    /// highest-priority tag.
    pub fn eligible_tasks_to_cancel(&self, tasks: &[SharedTask]) -> ShedResult<Vec<TaggedCandidate>> {
        let sources: [(TrackerKind, &dyn TaskResourceTracker); 3] = [
            (TrackerKind::HeapMemory, &self.heap),
            (TrackerKind::CpuCycle, &self.cpu),
            (TrackerKind::ElapsedTime, &self.elapsed),
        ];

        let mut tagged: Vec<TaggedCandidate> = Vec::new();
        for (kind, tracker) in sources {
            for task in tracker.eligible_tasks(tasks)? {
                tagged.push((kind, task));
            }
        }

        // Stable sort keeps each tracker's own ordering within a priority
        // class; dedup by task id keeps only the highest-priority tag.
        tagged.sort_by_key(|(kind, _)| Reverse(kind.priority()));
        let mut seen: HashSet<u64> = HashSet::with_capacity(tagged.len());
        tagged.retain(|(_, task)| seen.insert(task.id()));

        debug!(
            target: targets::RESOURCE,
            candidates = tagged.len(),
            "merged cancellation candidates"
        );
        Ok(tagged)
    }
}
