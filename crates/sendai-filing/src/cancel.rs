//! Cooperative cancellation for long-running extraction work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FilingError, Result};

/// A cheaply clonable cancellation flag.
///
/// The batch layer trips the token when a request times out; extraction
/// loops check it at stage boundaries and every few hundred records so an
/// abandoned request releases its buffers promptly instead of running to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with [`FilingError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FilingError::Cancelled)
        } else {
            Ok(())
        }
    }
}
