//! Non-critical side effects.
//!
//! Cache writes, cache invalidation and transcript persistence must never turn
//! a successful request (or a live relay) into a failure. Every such call site
//! routes its result through [`non_critical`] so the suppression is visible in
//! the code and always leaves a log line behind.

use std::fmt;
use tracing::warn;

/// Log and discard the error of a best-effort side effect.
///
/// Returns the success value, if any, so callers can still branch on it.
pub fn non_critical<T, E: fmt::Display>(effect: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(effect = effect, error = %err, "Non-critical effect failed");
            None
        }
    }
}
