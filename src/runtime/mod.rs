//! Execution contexts: strategies for running thunks.
//!
//! - [`ExecutionContext`]: the object-safe strategy trait
//! - [`CooperativeContext`]: single-threaded coroutine driver
//! - [`ParallelContext`]: one OS thread per submitted job
//! - [`AsyncHandle`] / [`Ticket`]: handles for non-blocking execution
//!
//! Contexts are chosen by the code that builds an effect, never by the effect
//! itself. They hold no per-call state, so one context can be shared by any
//! number of tasks.

use core::fmt;

pub mod cooperative;
pub mod handle;
pub mod parallel;
pub mod stats;

pub use cooperative::{CooperativeContext, YieldNow, yield_now};
pub use handle::{AsyncHandle, Completer, Job, Step, Ticket};
pub use parallel::ParallelContext;
pub use stats::{ContextStats, StatsSnapshot};

use crate::error::Result;
use handle::Slot;

/// How a context runs its jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Jobs run on the calling thread and interleave only at yield points.
    Cooperative,
    /// Jobs run concurrently on separate OS threads.
    Parallel,
}

impl ContextKind {
    /// Returns `true` for contexts that provide true parallelism.
    #[must_use]
    pub const fn is_parallel(self) -> bool {
        matches!(self, Self::Parallel)
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cooperative => f.write_str("cooperative"),
            Self::Parallel => f.write_str("parallel"),
        }
    }
}

/// Strategy for running jobs to completion.
///
/// Implementations must run each submitted job exactly once. A job that
/// panics should surface as an [`ErrorKind::Panicked`](crate::ErrorKind)
/// failure rather than unwinding into the caller.
pub trait ExecutionContext: Send + Sync + fmt::Debug {
    /// Reports the scheduling model, used by parallel composition to
    /// validate participants.
    fn kind(&self) -> ContextKind;

    /// Runs `job` and blocks until it has finished.
    fn execute(&self, job: Job) -> Result<()>;

    /// Submits `job` and returns without waiting for it.
    fn execute_async(&self, job: Job) -> Result<Ticket>;
}

/// Typed helpers over [`ExecutionContext`].
pub trait ExecutionContextExt: ExecutionContext {
    /// Runs `thunk` to completion and returns its result.
    fn run_blocking<A, F>(&self, thunk: F) -> Result<A>
    where
        A: Send + 'static,
        F: FnOnce() -> Result<A> + Send + 'static,
    {
        let (job, slot) = Slot::bind(thunk);
        self.execute(job)?;
        slot.take()
    }

    /// Starts `thunk` and returns a handle to its eventual result.
    fn spawn<A, F>(&self, thunk: F) -> Result<AsyncHandle<A>>
    where
        A: Send + 'static,
        F: FnOnce() -> Result<A> + Send + 'static,
    {
        let (job, slot) = Slot::bind(thunk);
        let ticket = self.execute_async(job)?;
        Ok(AsyncHandle::new(ticket, slot))
    }
}

impl<C: ExecutionContext + ?Sized> ExecutionContextExt for C {}
