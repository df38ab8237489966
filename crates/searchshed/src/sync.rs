//! Small lock helpers shared across the crate.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock a mutex, recovering the inner state if a previous holder panicked.
///
/// All state guarded in this crate stays internally consistent across a
/// poisoned lock: every critical section either completes a whole update or
/// performs independent single-field writes.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                target: crate::trace::TARGET_PREFIX,
                "poisoned mutex encountered; recovering inner state"
            );
            poisoned.into_inner()
        }
    }
}
