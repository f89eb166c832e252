//! Execution counters shared by the built-in contexts.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated as a context runs jobs.
#[derive(Debug, Default)]
pub struct ContextStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    resumes: AtomicU64,
}

impl ContextStats {
    pub(crate) fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_finish(&self, panicked: bool) {
        if panicked {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_resumes(&self, count: u64) {
        self.resumes.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`ContextStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Jobs handed to the context.
    pub submitted: u64,
    /// Jobs that finished, including panicked ones.
    pub completed: u64,
    /// Jobs that panicked.
    pub panicked: u64,
    /// Times a cooperative coroutine was resumed.
    pub resumes: u64,
}

impl StatsSnapshot {
    /// Jobs submitted but not yet finished.
    #[must_use]
    pub const fn in_flight(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}
