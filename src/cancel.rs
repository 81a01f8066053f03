//! Cancellation tokens for search operations.
//!
//! A `CancelToken` is a shared atomic flag owned by exactly one logical
//! search session. Every long-running stage (directory scanning, cache
//! population, content search) polls the same token, so one `cancel()` call
//! stops the whole session cooperatively. Reuse across sessions requires an
//! explicit `reset()` first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag shared across one search session.
///
/// Cloning is cheap and every clone observes the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the flag. Called at most once per session; repeat calls are
    /// harmless no-ops.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Rearms the token for the next session.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Checks if this token is still active.
    ///
    /// Returns `Some(())` if still active, `None` if cancelled.
    /// This enables use with the `?` operator for early returns.
    #[inline]
    pub fn is_cancelled(&self) -> Option<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            None
        } else {
            Some(())
        }
    }

    /// Returns true once the flag has been tripped.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
