//! Test helpers: logging setup and phase markers.
//!
//! Available in unit tests and, with the `test-internals` feature, to
//! integration tests.
//!
//! ```ignore
//! ioeffect::test_utils::init_test_logging();
//! ioeffect::test_phase!("bracket_release");
//! ioeffect::assert_with_log!(closed, "resource closed", true, closed);
//! ioeffect::test_complete!("bracket_release");
//! ```

use std::sync::Once;

use tracing_subscriber::EnvFilter;

#[doc(hidden)]
pub use tracing as __tracing;

static INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_TEST_FILTER: &str = "ioeffect=debug";

/// Installs a test-writer `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; otherwise logs this crate at debug level.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Logs the start of a test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(phase = %$name, "======== test phase ========");
    };
}

/// Logs a named section inside a test.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        $crate::test_utils::__tracing::debug!(section = %$name, "-------- section --------");
    };
}

/// Logs successful completion of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(test = %$name, "test complete");
    };
}

/// Asserts `cond`, logging expected and actual values first.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {{
        let ok = $cond;
        $crate::test_utils::__tracing::debug!(
            check = %$msg,
            expected = ?$expected,
            actual = ?$actual,
            ok,
            "assertion"
        );
        assert!(ok, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    }};
}
