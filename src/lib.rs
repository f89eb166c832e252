//! ioeffect: a deferred-computation effect runtime.
//!
//! # Overview
//!
//! An [`Effect<A>`] is a value describing a not-yet-executed unit of work.
//! Effects compose through functor, applicative and monad combinators
//! without running anything; the program runs its effect once, at the edge,
//! with [`Effect::run`]. Work that should run on a particular execution
//! strategy is bound to an [`ExecutionContext`] through a [`BlockingTask`].
//!
//! # Core Guarantees
//!
//! - **Laziness**: building or combining effects never executes a thunk
//! - **Re-runnable**: every run re-executes the thunk chain; nothing is memoized
//! - **Deterministic joins**: parallel combinators combine values in declared
//!   order regardless of completion order
//! - **Checked parallelism**: composing a cooperative participant in parallel
//!   fails before any task starts
//! - **Guaranteed release**: [`bracket`] releases an acquired resource exactly once
//!
//! # Module Structure
//!
//! - [`effect`]: the effect value and its combinators
//! - [`runtime`]: execution contexts, tickets and async handles
//! - [`blocking`]: thunks bound to an execution context
//! - [`combinator`]: bracket and parallel joins
//! - [`app`]: effect-based program entry point and exit codes
//! - [`config`]: parallel-context configuration
//! - [`error`](mod@error): the single failure type
//! - [`tracing_compat`]: optional tracing integration (requires `tracing-integration`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ioeffect::Effect;
//! use ioeffect::runtime::ParallelContext;
//!
//! let ctx = Arc::new(ParallelContext::new()?);
//! let fetch_a = Effect::blocking_on(ctx.clone(), || 20);
//! let fetch_b = Effect::blocking_on(ctx, || 22);
//! let total = fetch_a.par_map2(&fetch_b, |a, b| a + b).map(|sum| sum.to_string());
//!
//! assert_eq!(total.run()?, "42");
//! # Ok::<(), ioeffect::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod app;
pub mod blocking;
pub mod combinator;
pub mod config;
pub mod effect;
pub mod error;
pub mod runtime;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;

pub use blocking::BlockingTask;
pub use combinator::{bracket, par_map_n};
pub use config::{ConfigError, RuntimeConfig};
pub use effect::{DynFn, Dynamic, Effect};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use runtime::{
    AsyncHandle, ContextKind, CooperativeContext, ExecutionContext, ExecutionContextExt,
    ParallelContext, Step, yield_now,
};
