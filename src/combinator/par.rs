//! Parallel join combinators.
//!
//! Each participant must be a [`BlockingTask`]-backed effect bound to a
//! parallel context. The check covers every participant before any of them
//! is started, so a rejected composition has no side effects. After the
//! check all participants start left to right, their handles are joined in
//! the same order, and the combining function receives the values in
//! declared position regardless of which task finished first.
//!
//! Once started, tasks are never cancelled: if an earlier handle fails, the
//! later tasks keep running detached.

use std::sync::Arc;

use crate::blocking::BlockingTask;
use crate::effect::Effect;
use crate::error::{Error, Result};
use crate::tracing_compat::debug;

/// Returns the participant's task if it may take part in parallel composition.
fn parallel_task<A>(effect: &Effect<A>, position: usize) -> Result<&BlockingTask<A>>
where
    A: Send + 'static,
{
    let task = effect
        .blocking_task()
        .ok_or_else(|| Error::not_parallel_safe(position, "is not backed by a blocking task"))?;
    if task.is_parallel() {
        Ok(task)
    } else {
        Err(Error::not_parallel_safe(
            position,
            "is bound to a cooperative context",
        ))
    }
}

impl<A: Send + 'static> Effect<A> {
    /// Runs this effect and `other` concurrently and combines their values.
    ///
    /// Fails with [`ErrorKind::NotParallelSafe`](crate::ErrorKind) before
    /// starting anything if either side is not bound to a parallel context.
    #[must_use]
    pub fn par_map2<B, C, F>(&self, other: &Effect<B>, f: F) -> Effect<C>
    where
        B: Send + 'static,
        C: Send + 'static,
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let first = self.clone();
        let second = other.clone();
        Effect::from_thunk(Arc::new(move || {
            let t1 = parallel_task(&first, 0)?;
            let t2 = parallel_task(&second, 1)?;
            debug!(participants = 2, "starting parallel composition");

            let h1 = t1.start()?;
            let h2 = t2.start()?;
            let a = h1.join()?;
            let b = h2.join()?;
            Ok(f(a, b))
        }))
    }

    /// Three-way form of [`par_map2`](Self::par_map2).
    #[must_use]
    pub fn par_map3<B, C, D, F>(&self, second: &Effect<B>, third: &Effect<C>, f: F) -> Effect<D>
    where
        B: Send + 'static,
        C: Send + 'static,
        D: Send + 'static,
        F: Fn(A, B, C) -> D + Send + Sync + 'static,
    {
        let first = self.clone();
        let second = second.clone();
        let third = third.clone();
        Effect::from_thunk(Arc::new(move || {
            let t1 = parallel_task(&first, 0)?;
            let t2 = parallel_task(&second, 1)?;
            let t3 = parallel_task(&third, 2)?;
            debug!(participants = 3, "starting parallel composition");

            let h1 = t1.start()?;
            let h2 = t2.start()?;
            let h3 = t3.start()?;
            let a = h1.join()?;
            let b = h2.join()?;
            let c = h3.join()?;
            Ok(f(a, b, c))
        }))
    }

    /// Runs this effect and every effect in `others` concurrently.
    ///
    /// `f` receives the receiver's value first, followed by the values of
    /// `others` in slice order.
    #[must_use]
    pub fn par_map_n<C, F>(&self, others: &[Self], f: F) -> Effect<C>
    where
        C: Send + 'static,
        F: Fn(Vec<A>) -> C + Send + Sync + 'static,
    {
        let mut effects = Vec::with_capacity(others.len() + 1);
        effects.push(self.clone());
        effects.extend_from_slice(others);
        par_map_n(&effects, f)
    }
}

/// Runs every effect in `effects` concurrently and combines the values.
///
/// ```
/// use std::sync::Arc;
/// use ioeffect::{Effect, par_map_n};
/// use ioeffect::runtime::ParallelContext;
///
/// let ctx = Arc::new(ParallelContext::new()?);
/// let effects: Vec<_> = (1..=4)
///     .map(|i| Effect::blocking_on(ctx.clone(), move || i * 10))
///     .collect();
/// let total = par_map_n(&effects, |values| values.into_iter().sum::<i32>());
/// assert_eq!(total.run()?, 100);
/// # Ok::<(), ioeffect::Error>(())
/// ```
#[must_use]
pub fn par_map_n<A, C, F>(effects: &[Effect<A>], f: F) -> Effect<C>
where
    A: Send + 'static,
    C: Send + 'static,
    F: Fn(Vec<A>) -> C + Send + Sync + 'static,
{
    let effects = effects.to_vec();
    Effect::from_thunk(Arc::new(move || {
        let tasks = effects
            .iter()
            .enumerate()
            .map(|(position, effect)| parallel_task(effect, position))
            .collect::<Result<Vec<_>>>()?;
        debug!(participants = tasks.len(), "starting parallel composition");

        let handles = tasks
            .into_iter()
            .map(BlockingTask::start)
            .collect::<Result<Vec<_>>>()?;
        let values = handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Result<Vec<_>>>()?;
        Ok(f(values))
    }))
}
