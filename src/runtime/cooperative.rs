//! Single-threaded cooperative execution.
//!
//! Every job becomes a coroutine (a future) driven on the calling thread.
//! Driving means polling until the coroutine reports completion; between
//! polls the thread parks unless the coroutine already asked to be resumed.
//! Coroutines only interleave where they explicitly suspend, for example at
//! [`yield_now`].
//!
//! Closure jobs, such as a [`BlockingTask`](crate::BlockingTask) thunk, run
//! to completion in a single resume. Only futures handed to
//! [`CooperativeContext::drive`] or [`CooperativeContext::drive_all`] can
//! suspend and interleave.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

use super::handle::{Job, Ticket};
use super::stats::{ContextStats, StatsSnapshot};
use super::{ContextKind, ExecutionContext};
use crate::error::{Error, Result};
use crate::tracing_compat::trace;

/// Future that suspends the current coroutine once.
#[derive(Debug)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Suspends the current coroutine, letting others on the same thread run.
#[must_use]
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Waker that unparks the driving thread.
struct Parker {
    thread: Thread,
    notified: AtomicBool,
}

impl Parker {
    fn current() -> Arc<Self> {
        Arc::new(Self {
            thread: thread::current(),
            notified: AtomicBool::new(false),
        })
    }

    fn park(&self) {
        while !self.notified.swap(false, Ordering::Acquire) {
            thread::park();
        }
    }
}

impl Wake for Parker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

/// Execution context that runs every job on the calling thread.
///
/// `execute` drives the job immediately. `execute_async` returns a ticket
/// whose first wait drives the job, so nothing runs until someone waits.
#[derive(Debug, Clone, Default)]
pub struct CooperativeContext {
    stats: Arc<ContextStats>,
}

impl CooperativeContext {
    /// Creates a cooperative context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the execution counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Drives `future` to completion on the current thread.
    pub fn drive<F: Future>(&self, future: F) -> F::Output {
        let mut future = std::pin::pin!(future);
        let parker = Parker::current();
        let waker = Waker::from(Arc::clone(&parker));
        let mut cx = Context::from_waker(&waker);
        let mut resumes = 0_u64;

        loop {
            resumes += 1;
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                self.stats.record_resumes(resumes);
                trace!(resumes, "cooperative coroutine finished");
                return output;
            }
            parker.park();
        }
    }

    /// Drives several futures on the current thread, round-robin.
    ///
    /// Each pass resumes every unfinished future once. Results are returned in
    /// input order regardless of which future finished first.
    pub fn drive_all<'a, T>(&self, futures: Vec<Pin<Box<dyn Future<Output = T> + 'a>>>) -> Vec<T> {
        let parker = Parker::current();
        let waker = Waker::from(Arc::clone(&parker));
        let mut cx = Context::from_waker(&waker);
        let mut results: Vec<Option<T>> = futures.iter().map(|_| None).collect();
        let mut queue: VecDeque<_> = futures.into_iter().enumerate().collect();
        let mut resumes = 0_u64;

        while !queue.is_empty() {
            let mut progressed = false;
            for _ in 0..queue.len() {
                let Some((index, mut future)) = queue.pop_front() else {
                    break;
                };
                resumes += 1;
                match future.as_mut().poll(&mut cx) {
                    Poll::Ready(output) => {
                        results[index] = Some(output);
                        progressed = true;
                    }
                    Poll::Pending => queue.push_back((index, future)),
                }
            }
            if !progressed && !queue.is_empty() {
                parker.park();
            }
        }

        self.stats.record_resumes(resumes);
        trace!(resumes, count = results.len(), "cooperative round-robin finished");
        results.into_iter().flatten().collect()
    }

    fn run_job(&self, job: Job) -> Result<()> {
        self.stats.record_submit();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.drive(async move { job() })))
            .map_err(|payload| Error::panicked(payload.as_ref()));
        self.stats.record_finish(outcome.is_err());
        outcome
    }
}

impl ExecutionContext for CooperativeContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Cooperative
    }

    fn execute(&self, job: Job) -> Result<()> {
        self.run_job(job)
    }

    fn execute_async(&self, job: Job) -> Result<Ticket> {
        let context = self.clone();
        Ok(Ticket::deferred(move || context.run_job(job)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ExecutionContextExt;
    use std::cell::RefCell;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn execute_runs_on_calling_thread() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("execute_runs_on_calling_thread");

        let ctx = CooperativeContext::new();
        let caller = thread::current().id();
        let ran_on = ctx.run_blocking(move || Ok(thread::current().id())).unwrap();
        assert_eq!(ran_on, caller);
        assert_eq!(ctx.stats().completed, 1);
    }

    #[test]
    fn async_execution_is_lazy_until_waited() {
        let ctx = CooperativeContext::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let handle = ctx
            .spawn(move || Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!handle.is_finished());
        assert_eq!(handle.wait().unwrap(), 1);
        assert_eq!(handle.wait().unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_execution_reruns_the_thunk() {
        let ctx = CooperativeContext::new();
        let count = Arc::new(AtomicUsize::new(0));
        for expected in 1..=2 {
            let count = Arc::clone(&count);
            let got = ctx
                .run_blocking(move || Ok(count.fetch_add(1, Ordering::SeqCst) + 1))
                .unwrap();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn panics_become_failures() {
        let ctx = CooperativeContext::new();
        let err = ctx
            .run_blocking(|| -> Result<u8> { panic!("coroutine exploded") })
            .unwrap_err();
        assert!(err.is_panic());
        assert_eq!(err.message(), "coroutine exploded");
        assert_eq!(ctx.stats().panicked, 1);
    }

    #[test]
    fn drive_resumes_across_yields() {
        let ctx = CooperativeContext::new();
        let value = ctx.drive(async {
            yield_now().await;
            yield_now().await;
            7
        });
        assert_eq!(value, 7);
        assert_eq!(ctx.stats().resumes, 3);
    }

    #[test]
    fn drive_all_interleaves_at_yield_points() {
        let ctx = CooperativeContext::new();
        let log = RefCell::new(Vec::new());
        let step = |name: &'static str| {
            let log = &log;
            async move {
                for i in 0..2 {
                    log.borrow_mut().push(format!("{name}{i}"));
                    yield_now().await;
                }
                name
            }
        };

        let futures: Vec<Pin<Box<dyn Future<Output = &str> + '_>>> =
            vec![Box::pin(step("a")), Box::pin(step("b"))];
        let results = ctx.drive_all(futures);

        assert_eq!(results, vec!["a", "b"]);
        assert_eq!(*log.borrow(), vec!["a0", "b0", "a1", "b1"]);
    }

    #[test]
    fn closure_job_finishes_in_one_resume() {
        let ctx = CooperativeContext::new();
        ctx.run_blocking(|| Ok(())).unwrap();
        assert_eq!(ctx.stats().resumes, 1);
    }

    #[test]
    fn yield_now_completes_under_external_executor() {
        futures_lite::future::block_on(yield_now());
    }
}
