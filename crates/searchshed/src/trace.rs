//! Tracing conventions for searchshed.
//!
//! The crate emits `tracing` events under the targets listed here and never
//! installs a subscriber of its own; consumers bring their own. Filter with:
//!
//! ```text
//! RUST_LOG=searchshed=debug
//! ```

use tracing::Level;

/// Target prefix used by all searchshed tracing events.
pub const TARGET_PREFIX: &str = "searchshed";

/// Standard event targets, one per component.
///
/// Keeping these as named constants lets subscribers, dashboards, and tests
/// match on them without stringly-typed drift.
pub mod targets {
    /// CPU utilization tracker sampling and candidate selection.
    pub const CPU: &str = "searchshed.cpu";
    /// Heap memory tracker sampling and candidate selection.
    pub const HEAP: &str = "searchshed.heap";
    /// Elapsed-time tracker candidate selection.
    pub const ELAPSED: &str = "searchshed.elapsed";
    /// Merge layer: duress checks and candidate ordering.
    pub const RESOURCE: &str = "searchshed.resource";
    /// Cancellation accounting and rate limiting.
    pub const CANCELLATION: &str = "searchshed.cancellation";
    /// Control-loop decisions and actuation.
    pub const MANAGER: &str = "searchshed.manager";
    /// Scheduler-facing adapter.
    pub const OBSERVER: &str = "searchshed.observer";
    /// Host signal sampling.
    pub const MONITOR: &str = "searchshed.monitor";
}

/// Parse a log level string (case-insensitive).
///
/// Recognized values: `trace`, `debug`, `info`, `warn`, `error`.
/// Returns `None` for unrecognized strings.
#[must_use]
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Returns the log level for the current environment.
///
/// Checks `SEARCHSHED_LOG_LEVEL` first, then falls back to the provided
/// default.
#[must_use]
pub fn level_from_env(default: Level) -> Level {
    std::env::var("SEARCHSHED_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_targets_start_with_prefix() {
        let all = [
            targets::CPU,
            targets::HEAP,
            targets::ELAPSED,
            targets::RESOURCE,
            targets::CANCELLATION,
            targets::MANAGER,
            targets::OBSERVER,
            targets::MONITOR,
        ];
        for target in all {
            assert!(
                target.starts_with(&format!("{TARGET_PREFIX}.")),
                "target {target:?} must start with \"{TARGET_PREFIX}.\"",
            );
        }
    }

    #[test]
    fn parse_level_recognizes_valid_levels() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("info"), Some(Level::INFO));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("error"), Some(Level::ERROR));
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("WARN"), Some(Level::WARN));
        assert_eq!(parse_level("Info"), Some(Level::INFO));
    }

    #[test]
    fn parse_level_rejects_unknown_and_padded() {
        assert_eq!(parse_level("verbose"), None);
        assert_eq!(parse_level(""), None);
        assert_eq!(parse_level(" info"), None);
    }

    #[test]
    fn level_from_env_uses_default_when_unset() {
        // The variable is never set in the test environment with this key.
        std::env::remove_var("SEARCHSHED_LOG_LEVEL");
        assert_eq!(level_from_env(Level::WARN), Level::WARN);
    }
}
