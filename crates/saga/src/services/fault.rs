//! Failure injection for the in-memory collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counts calls to one collaborator operation and fails a chosen number of
/// them.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    remaining: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
}

impl FaultPlan {
    /// Fails the next `count` calls.
    pub fn fail_next(&self, count: u32) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    /// Fails every call until reset with `fail_next(0)`.
    pub fn fail_always(&self) {
        self.fail_next(u32::MAX);
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Records a call and reports whether it should fail.
    pub(crate) fn trip(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                u32::MAX => Some(u32::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }
}
