//! Thunks bound to an execution context.
//!
//! A [`BlockingTask`] pairs a thunk with the [`ExecutionContext`] that will
//! run it. Running it synchronously goes through the context's blocking
//! operation; starting it goes through the non-blocking one and yields an
//! [`AsyncHandle`]. The context is fixed at construction.

use core::fmt;
use std::sync::Arc;

use crate::effect::{Effect, Thunk};
use crate::error::{Error, Result};
use crate::runtime::{AsyncHandle, CooperativeContext, ExecutionContext, ExecutionContextExt};

/// A thunk bound to a specific execution context.
pub struct BlockingTask<A> {
    thunk: Thunk<A>,
    context: Arc<dyn ExecutionContext>,
}

impl<A> Clone for BlockingTask<A> {
    fn clone(&self) -> Self {
        Self {
            thunk: Arc::clone(&self.thunk),
            context: Arc::clone(&self.context),
        }
    }
}

impl<A> fmt::Debug for BlockingTask<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingTask")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<A> BlockingTask<A> {
    /// Returns the bound context.
    #[must_use]
    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    /// Returns `true` if the bound context runs jobs in parallel.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.context.kind().is_parallel()
    }
}

impl<A: Send + 'static> BlockingTask<A> {
    /// Binds `thunk` to a fresh [`CooperativeContext`].
    pub fn new<F>(thunk: F) -> Self
    where
        F: Fn() -> Result<A> + Send + Sync + 'static,
    {
        Self::with_context(Arc::new(CooperativeContext::new()), thunk)
    }

    /// Binds `thunk` to `context`.
    pub fn with_context<F>(context: Arc<dyn ExecutionContext>, thunk: F) -> Self
    where
        F: Fn() -> Result<A> + Send + Sync + 'static,
    {
        Self {
            thunk: Arc::new(thunk),
            context,
        }
    }

    /// Submits the thunk without waiting and returns its handle.
    pub fn start(&self) -> Result<AsyncHandle<A>> {
        let thunk = Arc::clone(&self.thunk);
        self.context.spawn(move || thunk())
    }

    /// Runs the thunk through the context's blocking operation.
    pub fn run_sync(&self) -> Result<A> {
        let thunk = Arc::clone(&self.thunk);
        self.context.run_blocking(move || thunk())
    }

    /// An effect that starts the task on every run and yields its handle.
    #[must_use]
    pub fn run_async(&self) -> Effect<AsyncHandle<A>> {
        let task = self.clone();
        Effect::from_thunk(Arc::new(move || task.start()))
    }

    /// Wraps the task as an effect.
    #[must_use]
    pub fn into_effect(self) -> Effect<A> {
        Effect::from_task(self)
    }
}

impl<A: Send + 'static> From<BlockingTask<A>> for Effect<A> {
    fn from(task: BlockingTask<A>) -> Self {
        task.into_effect()
    }
}

impl<A: Send + 'static> Effect<A> {
    /// An effect running `thunk` on a fresh cooperative context.
    pub fn blocking<F>(thunk: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        BlockingTask::new(move || Ok(thunk())).into_effect()
    }

    /// An effect running `thunk` on `context`.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use ioeffect::Effect;
    /// use ioeffect::runtime::ParallelContext;
    ///
    /// let ctx = Arc::new(ParallelContext::new()?);
    /// let left = Effect::blocking_on(ctx.clone(), || 1);
    /// let right = Effect::blocking_on(ctx, || 2);
    /// assert_eq!(left.par_map2(&right, |a, b| a + b).run()?, 3);
    /// # Ok::<(), ioeffect::Error>(())
    /// ```
    pub fn blocking_on<F>(context: Arc<dyn ExecutionContext>, thunk: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        BlockingTask::with_context(context, move || Ok(thunk())).into_effect()
    }

    /// An effect running a fallible `thunk` on `context`.
    pub fn try_blocking_on<F, E>(context: Arc<dyn ExecutionContext>, thunk: F) -> Self
    where
        F: Fn() -> std::result::Result<A, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        BlockingTask::with_context(context, move || thunk().map_err(Into::into)).into_effect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContextKind, Job, ParallelContext, Ticket};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Context that runs jobs inline and counts calls.
    #[derive(Debug, Default)]
    struct CountingContext {
        blocking: AtomicUsize,
        non_blocking: AtomicUsize,
    }

    impl ExecutionContext for CountingContext {
        fn kind(&self) -> ContextKind {
            ContextKind::Cooperative
        }

        fn execute(&self, job: Job) -> Result<()> {
            self.blocking.fetch_add(1, Ordering::SeqCst);
            job();
            Ok(())
        }

        fn execute_async(&self, job: Job) -> Result<Ticket> {
            self.non_blocking.fetch_add(1, Ordering::SeqCst);
            job();
            Ok(Ticket::settled(Ok(())))
        }
    }

    #[test]
    fn run_uses_blocking_operation() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("run_uses_blocking_operation");

        let ctx = Arc::new(CountingContext::default());
        let effect = Effect::blocking_on(ctx.clone(), || "ran");

        assert_eq!(ctx.blocking.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run().unwrap(), "ran");
        assert_eq!(ctx.blocking.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.non_blocking.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_sync_uses_non_blocking_operation() {
        let ctx = Arc::new(CountingContext::default());
        let effect = Effect::blocking_on(ctx.clone(), || 3);

        let step = effect.start().unwrap();
        assert!(step.is_pending());
        assert_eq!(step.resolve().unwrap(), 3);
        assert_eq!(effect.run_sync().unwrap(), 3);
        assert_eq!(ctx.non_blocking.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.blocking.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_context_is_cooperative() {
        let task = BlockingTask::new(|| Ok(thread::current().id()));
        assert_eq!(task.context().kind(), ContextKind::Cooperative);
        assert!(!task.is_parallel());
        assert_eq!(task.run_sync().unwrap(), thread::current().id());
    }

    #[test]
    fn parallel_task_runs_off_thread() {
        let ctx = Arc::new(ParallelContext::new().unwrap());
        let task = BlockingTask::with_context(ctx, || Ok(thread::current().id()));
        assert!(task.is_parallel());
        assert_ne!(task.start().unwrap().join().unwrap(), thread::current().id());
    }

    #[test]
    fn run_async_starts_on_each_run() {
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&starts);
        let task = BlockingTask::new(move || Ok(counter.fetch_add(1, Ordering::SeqCst)));
        let effect = task.run_async();

        assert_eq!(effect.run().unwrap().join().unwrap(), 0);
        assert_eq!(effect.run().unwrap().join().unwrap(), 1);
    }

    #[test]
    fn failures_pass_through_context() {
        let ctx = Arc::new(ParallelContext::new().unwrap());
        let effect: Effect<u8> = Effect::try_blocking_on(ctx, || Err("remote closed"));
        let err = effect.run().unwrap_err();
        assert!(err.is_computation());
        assert_eq!(err.message(), "remote closed");
        assert_eq!(effect.run_sync().unwrap_err().message(), "remote closed");
    }

    #[test]
    fn map_over_blocking_effect_keeps_context_behaviour() {
        let effect = Effect::blocking(|| 20).map(|x| x + 1);
        assert!(effect.blocking_task().is_none());
        assert_eq!(effect.run().unwrap(), 21);
    }
}
