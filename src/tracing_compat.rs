//! Optional tracing integration.
//!
//! With the `tracing-integration` feature the macros below are re-exports of
//! the `tracing` crate. Without it they expand to nothing, so call sites can
//! log unconditionally.

#[cfg(feature = "tracing-integration")]
pub(crate) use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    macro_rules! trace {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! debug {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! info {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! warn {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! error {
        ($($arg:tt)*) => {{}};
    }

    pub(crate) use {debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub(crate) use noop::{debug, error, info, trace, warn};
