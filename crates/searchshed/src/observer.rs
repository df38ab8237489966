//! Scheduler-facing adapter around the control loop.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::manager::BackpressureManager;
use crate::trace::targets;

/// Periodic entry point the host scheduler drives.
///
/// The observer never panics and never propagates errors: a dependency
/// failure is logged and the cadence continues, so one bad probe cannot
/// stall the loop. It also relays task-completion signals — for any task on
/// the node, from any thread — into the manager's accounting.
///
/// The observer does not schedule itself; wire `run_once` into whatever
/// periodic executor the host already has.
pub struct ConsumptionObserver {
    manager: Arc<BackpressureManager>,
}

impl ConsumptionObserver {
    #[must_use]
    pub fn new(manager: Arc<BackpressureManager>) -> Self {
        Self { manager }
    }

    /// One scheduler tick.
    pub fn run_once(&self) {
        match self.manager.run_iteration() {
            Ok(outcome) => {
                debug!(
                    target: targets::OBSERVER,
                    outcome = ?outcome,
                    "backpressure iteration complete"
                );
            }
            Err(err) => {
                warn!(
                    target: targets::OBSERVER,
                    error = %err,
                    "backpressure iteration aborted; retrying next tick"
                );
            }
        }
    }

    /// Relay a task completion. Safe from any thread.
    pub fn signal_task_completed(&self, task_id: u64) {
        self.manager.signal_task_completed(task_id);
    }

    /// The manager this observer drives.
    #[must_use]
    pub fn manager(&self) -> &Arc<BackpressureManager> {
        &self.manager
    }
}
