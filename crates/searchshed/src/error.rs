/// Unified error type for the searchshed control loop.
///
/// Every variant carries an actionable message. Dependency failures abort the
/// current iteration without recording a breach sample or cancelling anything;
/// the next scheduler tick retries from a clean slate.
#[derive(Debug, thiserror::Error)]
pub enum ShedError {
    /// The host resource monitor failed to produce a reading.
    #[error(
        "host monitor unavailable: {detail}. Iteration aborted; no breach sample was recorded."
    )]
    MonitorUnavailable {
        /// Why the reading could not be taken.
        detail: String,
    },

    /// The task registry failed to enumerate or refresh in-flight tasks.
    #[error("task registry unavailable: {detail}. Iteration aborted without cancelling anything.")]
    RegistryUnavailable {
        /// Why the registry call failed.
        detail: String,
    },

    /// A configuration value failed validation at construction time.
    #[error("invalid backpressure config: {field} — {reason}")]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Convenience alias used throughout the crate.
pub type ShedResult<T> = Result<T, ShedError>;
