//! Program entry point built on effects.
//!
//! An application describes its whole run as one [`Effect<i32>`]; the value
//! becomes the process exit code. The effect is run exactly once, at the
//! edge of the program.
//!
//! ```no_run
//! use ioeffect::Effect;
//! use ioeffect::app::{self, IoApp, exit};
//!
//! struct Hello;
//!
//! impl IoApp for Hello {
//!     fn run(&self, args: Vec<String>) -> Effect<i32> {
//!         Effect::of(move || {
//!             println!("hello from {}", args.first().map_or("?", String::as_str));
//!             exit::SUCCESS
//!         })
//!     }
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     app::main(&Hello)
//! }
//! ```

use std::process::ExitCode;

use crate::effect::Effect;
use crate::tracing_compat::{error, info, warn};

/// Conventional process exit codes.
pub mod exit {
    /// Success.
    pub const SUCCESS: i32 = 0;
    /// General failure. Also used for uncaught effect failures.
    pub const FAILURE: i32 = 1;
    /// Misuse of a shell builtin or bad arguments.
    pub const MISUSE: i32 = 2;
    /// Command found but cannot execute.
    pub const CANNOT_EXEC: i32 = 126;
    /// Command not found.
    pub const NOT_FOUND: i32 = 127;
    /// Invalid exit argument.
    pub const INVALID: i32 = 128;
    /// Terminated by Ctrl-C.
    pub const INTERRUPTED: i32 = 130;
}

/// An application whose run is a single effect producing an exit code.
pub trait IoApp {
    /// Describes the program. `args` excludes the executable name.
    fn run(&self, args: Vec<String>) -> Effect<i32>;
}

/// Runs `app` once with `args` and returns its exit code.
///
/// An uncaught failure is logged and mapped to [`exit::FAILURE`].
pub fn run_app<A: IoApp + ?Sized>(app: &A, args: Vec<String>) -> i32 {
    match app.run(args).run() {
        Ok(code) => {
            info!(code, "application finished");
            code
        }
        Err(err) => {
            error!(error = %err, "application failed");
            exit::FAILURE
        }
    }
}

/// Runs `app` with the process arguments and converts the result into an
/// [`ExitCode`].
///
/// Codes outside `0..=255` are reported as [`exit::FAILURE`].
pub fn main<A: IoApp + ?Sized>(app: &A) -> ExitCode {
    let code = run_app(app, std::env::args().skip(1).collect());
    ExitCode::from(exit_status(code))
}

/// [`exit::FAILURE`] as a process status byte.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const FAILURE_STATUS: u8 = exit::FAILURE as u8;

fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or_else(|_| {
        warn!(code, "exit code out of range");
        FAILURE_STATUS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Echo;

    impl IoApp for Echo {
        fn run(&self, args: Vec<String>) -> Effect<i32> {
            let code = args.first().and_then(|a| a.parse().ok());
            match code {
                Some(code) => Effect::pure(code),
                None => Effect::raise(Error::computation("expected an exit code")),
            }
        }
    }

    #[test]
    fn value_becomes_exit_code() {
        assert_eq!(run_app(&Echo, vec!["127".into()]), exit::NOT_FOUND);
        assert_eq!(run_app(&Echo, vec!["0".into()]), exit::SUCCESS);
    }

    #[test]
    fn uncaught_failure_maps_to_failure_code() {
        assert_eq!(run_app(&Echo, Vec::new()), exit::FAILURE);
    }

    #[test]
    fn out_of_range_codes_fail() {
        assert_eq!(i32::from(exit_status(300)), exit::FAILURE);
        assert_eq!(i32::from(exit_status(-1)), exit::FAILURE);
        assert_eq!(exit_status(exit::INTERRUPTED), 130);
    }
}
