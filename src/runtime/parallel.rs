//! Thread-parallel execution.
//!
//! Every submitted job runs on its own freshly spawned OS thread. Waiting on
//! a handle blocks the waiter, never the worker. An optional in-flight limit
//! from [`RuntimeConfig`] makes submission block while too many workers run.
//! Work submitted from one of the context's own workers skips the limit, so
//! nested blocking effects cannot starve the workers that wait on them.

use std::cell::Cell;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use parking_lot::{Condvar, Mutex};

use super::handle::{Job, Ticket};
use super::stats::{ContextStats, StatsSnapshot};
use super::{ContextKind, ExecutionContext};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace, warn};

/// Counting gate bounding the number of running workers.
#[derive(Debug)]
struct Gate {
    limit: usize,
    running: Mutex<usize>,
    released: Condvar,
}

impl Gate {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            running: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let mut running = self.running.lock();
        while *running >= self.limit {
            self.released.wait(&mut running);
        }
        *running += 1;
    }

    fn release(&self) {
        let mut running = self.running.lock();
        *running = running.saturating_sub(1);
        self.released.notify_one();
    }
}

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Id of the context whose worker is running on this thread.
    static WORKER_OF: Cell<Option<u64>> = const { Cell::new(None) };
}

#[derive(Debug)]
struct Inner {
    id: u64,
    config: RuntimeConfig,
    parallelism: NonZeroUsize,
    next_worker: AtomicU64,
    gate: Option<Gate>,
    stats: ContextStats,
}

impl Inner {
    fn on_own_worker(&self) -> bool {
        WORKER_OF.with(Cell::get) == Some(self.id)
    }
}

/// Slot in the in-flight gate, released when the worker finishes.
///
/// Nested submissions hold no slot.
struct Permit {
    inner: Arc<Inner>,
    held: bool,
}

impl Permit {
    fn acquire(inner: &Arc<Inner>) -> Self {
        let mut held = false;
        if let Some(gate) = &inner.gate {
            if inner.on_own_worker() {
                trace!(context = inner.id, "nested submission bypasses in-flight limit");
            } else {
                gate.acquire();
                held = true;
            }
        }
        Self {
            inner: Arc::clone(inner),
            held,
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        if let Some(gate) = &self.inner.gate {
            gate.release();
        }
    }
}

/// Execution context running each job on a dedicated OS thread.
///
/// Construction fails with [`ErrorKind::CapabilityUnavailable`](crate::ErrorKind)
/// when the platform cannot provide parallelism or the configuration
/// disables it; once built, submission never checks the capability again.
///
/// ```
/// use ioeffect::runtime::{ExecutionContextExt, ParallelContext};
///
/// let ctx = ParallelContext::new()?;
/// let handle = ctx.spawn(|| Ok(6 * 7))?;
/// assert_eq!(handle.join()?, 42);
/// # Ok::<(), ioeffect::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ParallelContext {
    inner: Arc<Inner>,
}

impl ParallelContext {
    /// Creates a context with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a context configured from `IOEFFECT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::with_config(RuntimeConfig::from_env()?)
    }

    /// Creates a context with an explicit configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        if !config.parallel {
            warn!("parallel execution requested but disabled by configuration");
            return Err(Error::capability_unavailable(
                "parallel execution is disabled by configuration",
            ));
        }
        let parallelism = thread::available_parallelism().map_err(|err| {
            warn!(error = %err, "cannot determine available parallelism");
            Error::capability_unavailable("platform does not report available parallelism")
                .with_source(err)
        })?;

        debug!(
            parallelism = parallelism.get(),
            prefix = %config.worker_name_prefix,
            max_in_flight = ?config.max_in_flight,
            "parallel context ready"
        );

        let gate = config.max_in_flight.map(Gate::new);
        Ok(Self {
            inner: Arc::new(Inner {
                id: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
                config,
                parallelism,
                next_worker: AtomicU64::new(0),
                gate,
                stats: ContextStats::default(),
            }),
        })
    }

    /// Returns the configuration this context was built with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Returns the parallelism the platform reported at construction.
    #[must_use]
    pub fn available_parallelism(&self) -> NonZeroUsize {
        self.inner.parallelism
    }

    /// Returns the execution counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    fn spawn_worker(&self, job: Job) -> Result<Ticket> {
        let permit = Permit::acquire(&self.inner);
        let id = self.inner.next_worker.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{id}", self.inner.config.worker_name_prefix);
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = self.inner.config.worker_stack_size {
            builder = builder.stack_size(size);
        }

        let (ticket, completer) = Ticket::pending();
        let context = self.inner.id;
        self.inner.stats.record_submit();
        let spawned = builder.spawn(move || {
            WORKER_OF.with(|worker_of| worker_of.set(Some(context)));
            let outcome = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| Error::panicked(payload.as_ref()));
            permit.inner.stats.record_finish(outcome.is_err());
            trace!(ok = outcome.is_ok(), "worker finished");
            drop(permit);
            completer.complete(outcome);
        });

        match spawned {
            Ok(_detached) => {
                trace!(worker = %name, "worker spawned");
                Ok(ticket)
            }
            Err(err) => {
                self.inner.stats.record_finish(false);
                warn!(worker = %name, error = %err, "failed to spawn worker thread");
                Err(
                    Error::capability_unavailable(format!("failed to spawn worker `{name}`"))
                        .with_source(err),
                )
            }
        }
    }
}

impl ExecutionContext for ParallelContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Parallel
    }

    fn execute(&self, job: Job) -> Result<()> {
        self.spawn_worker(job)?.wait()
    }

    fn execute_async(&self, job: Job) -> Result<Ticket> {
        self.spawn_worker(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ExecutionContextExt;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[test]
    fn execute_runs_on_a_named_worker_thread() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("execute_runs_on_a_named_worker_thread");

        let ctx = ParallelContext::with_config(RuntimeConfig::default().worker_name_prefix("exec"))
            .unwrap();
        let caller = thread::current().id();
        let (id, name) = ctx
            .run_blocking(|| {
                let current = thread::current();
                Ok((current.id(), current.name().map(str::to_string)))
            })
            .unwrap();

        assert_ne!(id, caller);
        assert_eq!(name.as_deref(), Some("exec-0"));
    }

    #[test]
    fn disabled_capability_fails_construction() {
        let err = ParallelContext::with_config(RuntimeConfig::default().parallel(false)).unwrap_err();
        assert!(err.is_capability_unavailable());
    }

    #[test]
    fn invalid_config_fails_construction() {
        let err = ParallelContext::with_config(RuntimeConfig::default().max_in_flight(0)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn worker_failures_are_reraised() {
        let ctx = ParallelContext::new().unwrap();
        let err = ctx
            .run_blocking(|| -> Result<()> { Err(Error::computation("worker refused")) })
            .unwrap_err();
        assert!(err.is_computation());
        assert_eq!(err.message(), "worker refused");
    }

    #[test]
    fn worker_panics_are_reported() {
        let ctx = ParallelContext::new().unwrap();
        let handle = ctx.spawn(|| -> Result<u32> { panic!("worker blew up") }).unwrap();
        let err = handle.wait().unwrap_err();
        assert!(err.is_panic());
        assert_eq!(handle.wait().unwrap_err().message(), "worker blew up");
        assert_eq!(ctx.stats().panicked, 1);
    }

    #[test]
    fn async_jobs_run_concurrently() {
        let ctx = ParallelContext::new().unwrap();
        let start = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|i| {
                ctx.spawn(move || {
                    thread::sleep(Duration::from_millis(100));
                    Ok(i)
                })
                .unwrap()
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results, vec![0, 1, 2]);
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn in_flight_limit_serializes_workers() {
        let ctx = ParallelContext::with_config(RuntimeConfig::default().max_in_flight(1)).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                ctx.spawn(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap()
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.stats().completed, 3);
    }

    #[test]
    fn nested_submission_ignores_in_flight_limit() {
        let ctx = ParallelContext::with_config(RuntimeConfig::default().max_in_flight(1)).unwrap();
        let inner = ctx.clone();
        let handle = ctx
            .spawn(move || {
                let depth = inner.run_blocking(|| Ok(1))?;
                Ok(depth + inner.run_blocking(|| Ok(1))?)
            })
            .unwrap();

        assert_eq!(handle.join().unwrap(), 2);
        assert_eq!(ctx.stats().completed, 3);
        // The top-level slot is free again.
        assert_eq!(ctx.run_blocking(|| Ok("after")).unwrap(), "after");
    }

    #[test]
    fn worker_marker_is_per_context() {
        let outer = ParallelContext::new().unwrap();
        let limited = ParallelContext::with_config(RuntimeConfig::default().max_in_flight(1)).unwrap();
        assert!(!limited.inner.on_own_worker());

        let target = limited.clone();
        let foreign = outer
            .run_blocking(move || Ok(target.inner.on_own_worker()))
            .unwrap();
        assert!(!foreign);

        let target = limited.clone();
        let own = limited
            .run_blocking(move || Ok(target.inner.on_own_worker()))
            .unwrap();
        assert!(own);
    }

    #[test]
    fn reports_available_parallelism() {
        let ctx = ParallelContext::new().unwrap();
        assert!(ctx.available_parallelism().get() >= 1);
    }
}
