//! Cooperative cancellation
//!
//! A shared atomic flag checked between plan entries and between shape
//! evaluations. Cancellation unwinds cleanly: no baseline or attestation
//! mutation for entries that had not committed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation token handed to every long-running operation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; checked cooperatively
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Hot-path check, lock-free
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// The raw flag, for components that only need a primitive handle
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}
