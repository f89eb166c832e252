//! Shared helpers for integration tests.
#![allow(dead_code, unused_macros)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ioeffect::runtime::{CooperativeContext, ParallelContext};
use ioeffect::{Effect, ExecutionContext};

pub use ioeffect::test_utils::init_test_logging;

macro_rules! test_phase {
    ($name:expr) => {
        ioeffect::test_phase!($name)
    };
}

macro_rules! test_complete {
    ($name:expr) => {
        ioeffect::test_complete!($name)
    };
}

/// Starts a test: installs logging and logs the phase.
pub fn init_test(name: &str) {
    init_test_logging();
    ioeffect::test_phase!(name);
}

/// A fresh parallel context, shared as a trait object.
pub fn parallel_context() -> Arc<dyn ExecutionContext> {
    Arc::new(ParallelContext::new().expect("parallel capability"))
}

/// A fresh cooperative context, shared as a trait object.
pub fn cooperative_context() -> Arc<dyn ExecutionContext> {
    Arc::new(CooperativeContext::new())
}

/// An effect on `ctx` that sleeps for `millis` and then yields `value`.
pub fn sleeper<A>(ctx: &Arc<dyn ExecutionContext>, millis: u64, value: A) -> Effect<A>
where
    A: Clone + Send + Sync + 'static,
{
    Effect::blocking_on(Arc::clone(ctx), move || {
        std::thread::sleep(Duration::from_millis(millis));
        value.clone()
    })
}

/// Shared counter for observing side effects.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
