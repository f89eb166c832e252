//! Acquire/use/release resource safety.
//!
//! [`bracket`] guarantees that once `acquire` succeeds, `release` runs
//! exactly once, whether `use` succeeds, fails or panics. Failure
//! precedence:
//!
//! | use        | release | result                                      |
//! |------------|---------|---------------------------------------------|
//! | `Ok(b)`    | `Ok`    | `Ok(b)`                                     |
//! | `Ok(b)`    | `Err(r)`| `Err(r)`                                    |
//! | `Err(u)`   | `Ok`    | `Err(u)`                                    |
//! | `Err(u)`   | `Err(r)`| `Err(u)` with `r` attached as suppressed    |
//! | panic      | `Ok`    | `Err(p)` with kind `Panicked`               |
//! | panic      | `Err(r)`| `Err(p)` with `r` attached as suppressed    |

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::effect::Effect;
use crate::error::Error;
use crate::tracing_compat::warn;

/// Acquires a resource, uses it, and releases it on every path.
///
/// The resource is cloned into `use_`, so `R` is usually a cheap handle such
/// as an `Arc`. If `acquire` fails, neither `use_` nor `release` runs.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use ioeffect::{Effect, bracket};
///
/// let closed = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&closed);
/// let program = bracket(
///     &Effect::pure(Arc::new(String::from("conn"))),
///     |conn| Effect::of(move || conn.len()),
///     move |_conn| {
///         let flag = Arc::clone(&flag);
///         Effect::of(move || flag.store(true, Ordering::SeqCst))
///     },
/// );
///
/// assert_eq!(program.run().unwrap(), 4);
/// assert!(closed.load(Ordering::SeqCst));
/// ```
#[must_use]
pub fn bracket<R, B, U, L>(acquire: &Effect<R>, use_: U, release: L) -> Effect<B>
where
    R: Clone + Send + 'static,
    B: Send + 'static,
    U: Fn(R) -> Effect<B> + Send + Sync + 'static,
    L: Fn(R) -> Effect<()> + Send + Sync + 'static,
{
    let acquire = acquire.clone();
    Effect::from_thunk(Arc::new(move || {
        let resource = acquire.run()?;
        let used = panic::catch_unwind(AssertUnwindSafe(|| use_(resource.clone()).run()))
            .unwrap_or_else(|payload| Err(Error::panicked(payload.as_ref())));
        let released = release(resource).run();

        match (used, released) {
            (Ok(value), released) => released.map(|()| value),
            (Err(use_err), Ok(())) => Err(use_err),
            (Err(use_err), Err(release_err)) => {
                warn!(
                    error = %use_err,
                    release_error = %release_err,
                    "release failed after use failed; keeping use failure"
                );
                Err(use_err.with_suppressed(release_err))
            }
        }
    }))
}

impl<A: Send + 'static> Effect<A> {
    /// Runs `finalizer` after this effect on every path.
    ///
    /// Equivalent to a [`bracket`] over a unit resource.
    #[must_use]
    pub fn ensuring(&self, finalizer: &Effect<()>) -> Self {
        let this = self.clone();
        let finalizer = finalizer.clone();
        bracket(
            &Effect::pure(()),
            move |()| this.clone(),
            move |()| finalizer.clone(),
        )
    }
}
