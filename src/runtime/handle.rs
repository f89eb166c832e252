//! Completion signals and async handles.
//!
//! An [`ExecutionContext`](super::ExecutionContext) only sees type-erased
//! [`Job`]s. When a job is submitted asynchronously the context returns a
//! [`Ticket`] that settles once the job has finished. The typed layer pairs
//! that ticket with a result slot to form an [`AsyncHandle`].
//!
//! Handles cache their outcome: waiting on a settled handle again returns a
//! clone of the cached value or re-raises the cached failure. The task itself
//! runs exactly once.

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{Error, Result};

/// A type-erased unit of work handed to an execution context.
///
/// The job stores its own typed result; the context only needs to run it and
/// report whether it finished or panicked.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

type DeferredRun = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

enum TicketState {
    /// Not started. The first waiter runs it on its own thread.
    Deferred(DeferredRun),
    /// Started on a worker or by another waiter.
    Running,
    /// Finished. `Err` means the job panicked or was abandoned.
    Settled(Result<()>),
}

struct Signal {
    state: Mutex<TicketState>,
    settled: Condvar,
}

impl Signal {
    fn new(state: TicketState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            settled: Condvar::new(),
        })
    }

    fn settle(&self, result: Result<()>) {
        let mut state = self.state.lock();
        *state = TicketState::Settled(result);
        self.settled.notify_all();
    }
}

/// Completion signal for an asynchronously submitted job.
pub struct Ticket {
    signal: Arc<Signal>,
}

impl Ticket {
    /// Creates a ticket settled by the returned [`Completer`].
    ///
    /// Contexts that hand the job to another thread use this form.
    #[must_use]
    pub fn pending() -> (Self, Completer) {
        let signal = Signal::new(TicketState::Running);
        let completer = Completer {
            signal: Some(Arc::clone(&signal)),
        };
        (Self { signal }, completer)
    }

    /// Creates a ticket whose work runs lazily on the first [`wait`](Self::wait).
    #[must_use]
    pub fn deferred<F>(run: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            signal: Signal::new(TicketState::Deferred(Box::new(run))),
        }
    }

    /// Creates an already settled ticket.
    #[must_use]
    pub fn settled(result: Result<()>) -> Self {
        Self {
            signal: Signal::new(TicketState::Settled(result)),
        }
    }

    /// Returns `true` once the job has finished.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(*self.signal.state.lock(), TicketState::Settled(_))
    }

    /// Blocks until the job has finished, running deferred work if needed.
    ///
    /// Returns the cached outcome on every call after the first. Deferred
    /// work that panics settles the ticket with a `Panicked` failure.
    pub fn wait(&self) -> Result<()> {
        let mut state = self.signal.state.lock();
        loop {
            match std::mem::replace(&mut *state, TicketState::Running) {
                TicketState::Settled(result) => {
                    *state = TicketState::Settled(result.clone());
                    return result;
                }
                TicketState::Running => self.signal.settled.wait(&mut state),
                TicketState::Deferred(run) => {
                    let result = MutexGuard::unlocked(&mut state, || {
                        panic::catch_unwind(AssertUnwindSafe(run))
                            .unwrap_or_else(|payload| Err(Error::panicked(payload.as_ref())))
                    });
                    *state = TicketState::Settled(result.clone());
                    self.signal.settled.notify_all();
                    return result;
                }
            }
        }
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.signal.state.lock() {
            TicketState::Deferred(_) => "deferred",
            TicketState::Running => "running",
            TicketState::Settled(Ok(())) => "settled",
            TicketState::Settled(Err(_)) => "failed",
        };
        f.debug_struct("Ticket").field("state", &state).finish()
    }
}

/// Settles a [`Ticket`] created by [`Ticket::pending`].
///
/// Dropping a completer without calling [`complete`](Self::complete) settles
/// the ticket with an abandoned error, so waiters never hang on a lost worker.
pub struct Completer {
    signal: Option<Arc<Signal>>,
}

impl Completer {
    /// Settles the ticket with `result`.
    pub fn complete(mut self, result: Result<()>) {
        if let Some(signal) = self.signal.take() {
            signal.settle(result);
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.settle(Err(Error::abandoned()));
        }
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}

enum SlotState<A> {
    Empty,
    Filled(Result<A>),
    Taken,
}

/// Shared cell receiving the typed result of a job.
pub(crate) struct Slot<A> {
    cell: Arc<Mutex<SlotState<A>>>,
}

impl<A> Clone for Slot<A> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<A: Send + 'static> Slot<A> {
    fn new() -> Self {
        Self {
            cell: Arc::new(Mutex::new(SlotState::Empty)),
        }
    }

    /// Wraps `thunk` into a [`Job`] that stores its result in a fresh slot.
    pub(crate) fn bind<F>(thunk: F) -> (Job, Self)
    where
        F: FnOnce() -> Result<A> + Send + 'static,
    {
        let slot = Self::new();
        let sink = slot.clone();
        let job: Job = Box::new(move || sink.fill(thunk()));
        (job, slot)
    }

    fn fill(&self, result: Result<A>) {
        *self.cell.lock() = SlotState::Filled(result);
    }

    /// Moves the result out.
    pub(crate) fn take(&self) -> Result<A> {
        let mut cell = self.cell.lock();
        match std::mem::replace(&mut *cell, SlotState::Taken) {
            SlotState::Filled(result) => result,
            SlotState::Empty | SlotState::Taken => Err(Error::abandoned()),
        }
    }

    /// Clones the result, leaving it in place.
    pub(crate) fn peek(&self) -> Result<A>
    where
        A: Clone,
    {
        match &*self.cell.lock() {
            SlotState::Filled(result) => result.clone(),
            SlotState::Empty | SlotState::Taken => Err(Error::abandoned()),
        }
    }
}

/// Handle to a task started with non-blocking execution.
///
/// [`wait`](Self::wait) blocks the calling thread (never the worker) until
/// the task finishes. Waiting again replays the cached outcome without
/// re-running the task. [`join`](Self::join) consumes the handle and moves the
/// result out, which does not require `A: Clone`.
///
/// Dropping a handle does not cancel the task.
pub struct AsyncHandle<A> {
    ticket: Ticket,
    slot: Slot<A>,
}

impl<A: Send + 'static> AsyncHandle<A> {
    pub(crate) fn new(ticket: Ticket, slot: Slot<A>) -> Self {
        Self { ticket, slot }
    }

    /// Creates a handle that is already settled with `result`.
    #[must_use]
    pub fn ready(result: Result<A>) -> Self {
        let slot = Slot::new();
        slot.fill(result);
        Self::new(Ticket::settled(Ok(())), slot)
    }

    /// Returns `true` once the task has finished.
    ///
    /// A cooperative task is only driven by the first wait, so this stays
    /// `false` until then.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ticket.is_settled()
    }

    /// Waits for the task and returns a clone of its result.
    pub fn wait(&self) -> Result<A>
    where
        A: Clone,
    {
        self.ticket.wait()?;
        self.slot.peek()
    }

    /// Waits for the task and moves its result out.
    pub fn join(self) -> Result<A> {
        self.ticket.wait()?;
        self.slot.take()
    }
}

impl<A> fmt::Debug for AsyncHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

/// Outcome of starting an effect: either an immediate value or a pending handle.
pub enum Step<A> {
    /// The effect ran to completion on the calling thread.
    Value(A),
    /// The effect was handed to an execution context.
    Pending(AsyncHandle<A>),
}

impl<A: Send + 'static> Step<A> {
    /// Returns the value, blocking on the handle when pending.
    pub fn resolve(self) -> Result<A> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Pending(handle) => handle.join(),
        }
    }

    /// Returns `true` if the step holds a handle.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl<A> From<AsyncHandle<A>> for Step<A> {
    fn from(handle: AsyncHandle<A>) -> Self {
        Self::Pending(handle)
    }
}

impl<A: fmt::Debug> fmt::Debug for Step<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Pending(handle) => f.debug_tuple("Pending").field(handle).finish(),
        }
    }
}
