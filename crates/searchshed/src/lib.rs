//! Backpressure control loop for a query-serving node.
//!
//! searchshed protects a node from resource exhaustion by watching in-flight
//! search work and forcibly cancelling tasks when the node is under
//! sustained duress. It decides **when** the node is in duress (sliding
//! windows of threshold breaches over independent CPU and heap signals),
//! **which** tasks to cancel (per-tracker eligibility merged into one
//! priority-ordered candidate list), and **how many** to cancel (a cooldown
//! window plus a rate ceiling relative to completed work).
//!
//! The crate runs as a guest inside a larger serving engine: the host's
//! scheduler drives [`ConsumptionObserver::run_once`] on a fixed period, the
//! host's task system is plugged in behind the [`TaskRegistry`] and
//! [`CancellableTask`] traits, and host signals come from a [`HostMonitor`]
//! ([`SysinfoHostMonitor`] is the batteries-included default). Task
//! execution, counter measurement, and scheduling stay on the host's side of
//! those seams.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod manager;
pub mod monitor;
pub mod observer;
pub mod resource;
mod sync;
pub mod task;
pub mod trace;
pub mod trackers;
pub mod window;

pub use cancellation::{CancellationStats, CancellationTracker};
pub use config::BackpressureConfig;
pub use error::{ShedError, ShedResult};
pub use manager::{BackpressureManager, IterationOutcome, CANCEL_REASON};
pub use monitor::{HostMonitor, SysinfoHostMonitor};
pub use observer::ConsumptionObserver;
pub use resource::{ResourceTracker, TaggedCandidate};
pub use task::{CancellableTask, ResourceStat, SharedTask, TaskRegistry};
pub use trackers::{
    CpuUtilizationTracker, ElapsedTimeTracker, HeapMemoryTracker, TaskResourceTracker, TrackerKind,
};
pub use window::BreachWindow;
