//! The deferred-computation value.
//!
//! An [`Effect<A>`] wraps a zero-argument thunk producing `A` or an
//! [`Error`]. Building or combining effects never runs anything; only
//! [`run`](Effect::run), [`run_sync`](Effect::run_sync) and
//! [`start`](Effect::start) execute the thunk chain, and every call executes
//! it again from scratch.
//!
//! A panic inside any thunk surfaces as a
//! [`Panicked`](crate::ErrorKind::Panicked) failure, whether the effect is a
//! plain thunk or bound to an execution context.
//!
//! ```
//! use ioeffect::Effect;
//!
//! let program = Effect::of(|| 21).flat_map(|x| Effect::of(move || x * 2));
//! assert_eq!(program.run().unwrap(), 42);
//! ```

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::blocking::BlockingTask;
use crate::error::{Error, Result};
use crate::runtime::Step;

mod dynamic;
mod ops;

pub use dynamic::{DynFn, Dynamic, erase_fn};

pub(crate) type Thunk<A> = Arc<dyn Fn() -> Result<A> + Send + Sync + 'static>;

/// Calls `thunk`, turning a panic into a `Panicked` failure.
fn call<A>(thunk: &Thunk<A>) -> Result<A> {
    panic::catch_unwind(AssertUnwindSafe(thunk.as_ref()))
        .unwrap_or_else(|payload| Err(Error::panicked(payload.as_ref())))
}

/// How an effect produces its value.
enum Repr<A> {
    /// A plain thunk run on the calling thread.
    Thunk(Thunk<A>),
    /// A thunk bound to an execution context.
    Blocking(BlockingTask<A>),
}

/// An immutable, lazily executed computation.
///
/// Effects are cheap to clone (clones share the thunk) and are `Send + Sync`,
/// so they can be handed across the cooperative/parallel boundary freely.
pub struct Effect<A> {
    repr: Repr<A>,
}

impl<A> Clone for Effect<A> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Thunk(thunk) => Repr::Thunk(Arc::clone(thunk)),
            Repr::Blocking(task) => Repr::Blocking(task.clone()),
        };
        Self { repr }
    }
}

impl<A> fmt::Debug for Effect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Effect");
        match &self.repr {
            Repr::Thunk(_) => dbg.field("backing", &"thunk"),
            Repr::Blocking(task) => dbg.field("backing", &task.context().kind()),
        };
        dbg.finish_non_exhaustive()
    }
}

impl<A: Send + 'static> Effect<A> {
    /// Wraps an infallible thunk.
    pub fn of<F>(thunk: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::from_thunk(Arc::new(move || Ok(thunk())))
    }

    /// Wraps a fallible thunk. Its failure becomes the effect's failure.
    pub fn try_of<F, E>(thunk: F) -> Self
    where
        F: Fn() -> std::result::Result<A, E> + Send + Sync + 'static,
        E: Into<Error>,
    {
        Self::from_thunk(Arc::new(move || thunk().map_err(Into::into)))
    }

    /// Lifts a plain value. Every run yields a clone of it.
    pub fn pure(value: A) -> Self
    where
        A: Clone + Sync,
    {
        Self::of(move || value.clone())
    }

    /// An effect that always fails with `error`.
    #[must_use]
    pub fn raise(error: Error) -> Self {
        Self::from_thunk(Arc::new(move || Err(error.clone())))
    }

    pub(crate) fn from_thunk(thunk: Thunk<A>) -> Self {
        Self {
            repr: Repr::Thunk(thunk),
        }
    }

    pub(crate) fn from_task(task: BlockingTask<A>) -> Self {
        Self {
            repr: Repr::Blocking(task),
        }
    }

    /// Returns the blocking task backing this effect, if any.
    #[must_use]
    pub fn blocking_task(&self) -> Option<&BlockingTask<A>> {
        match &self.repr {
            Repr::Thunk(_) => None,
            Repr::Blocking(task) => Some(task),
        }
    }

    /// Executes the thunk chain and returns its value or first failure.
    ///
    /// A blocking-task-backed effect runs through its context's blocking
    /// operation.
    pub fn run(&self) -> Result<A> {
        match &self.repr {
            Repr::Thunk(thunk) => call(thunk),
            Repr::Blocking(task) => task.run_sync(),
        }
    }

    /// Starts the effect without waiting for context-bound work.
    ///
    /// Plain thunks run to completion and yield [`Step::Value`]; blocking
    /// tasks are submitted asynchronously and yield [`Step::Pending`].
    pub fn start(&self) -> Result<Step<A>> {
        match &self.repr {
            Repr::Thunk(thunk) => call(thunk).map(Step::Value),
            Repr::Blocking(task) => task.start().map(Step::Pending),
        }
    }

    /// Starts the effect and blocks on the handle if one was produced.
    pub fn run_sync(&self) -> Result<A> {
        self.start()?.resolve()
    }

    /// Defers [`start`](Self::start) into a new effect.
    #[must_use]
    pub fn start_async(&self) -> Effect<Step<A>> {
        let this = self.clone();
        Effect::from_thunk(Arc::new(move || this.start()))
    }

    /// Recovers from a failure by mapping the error to a value.
    #[must_use]
    pub fn handle_error<F>(&self, handler: F) -> Self
    where
        F: Fn(Error) -> A + Send + Sync + 'static,
    {
        let this = self.clone();
        Self::from_thunk(Arc::new(move || this.run().or_else(|err| Ok(handler(err)))))
    }

    /// Recovers from a failure by running the effect `handler` returns.
    #[must_use]
    pub fn handle_error_with<F>(&self, handler: F) -> Self
    where
        F: Fn(Error) -> Self + Send + Sync + 'static,
    {
        let this = self.clone();
        Self::from_thunk(Arc::new(move || this.run().or_else(|err| handler(err).run())))
    }

    /// Surfaces the outcome as a value. The returned effect never fails,
    /// even when a thunk panics.
    #[must_use]
    pub fn attempt(&self) -> Effect<Result<A>> {
        let this = self.clone();
        Effect::from_thunk(Arc::new(move || Ok(this.run())))
    }
}

impl<A: Send + 'static> Effect<Result<A>> {
    /// Re-raises a failure carried as a value. Inverse of [`Effect::attempt`].
    #[must_use]
    pub fn absolve(&self) -> Effect<A> {
        let this = self.clone();
        Effect::from_thunk(Arc::new(move || this.run()?))
    }
}

impl<A: Send + 'static> Effect<Step<A>> {
    /// Resolves the produced step, blocking on the handle when pending.
    #[must_use]
    pub fn settle(&self) -> Effect<A> {
        let this = self.clone();
        Effect::from_thunk(Arc::new(move || this.run()?.resolve()))
    }
}
