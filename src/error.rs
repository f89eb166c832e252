//! Error types for effect construction and execution.
//!
//! Every failure in the runtime is represented by a single [`Error`] value.
//! [`Effect::run`](crate::Effect::run) returns it as `Err`, while
//! [`Effect::attempt`](crate::Effect::attempt) surfaces the same value as data,
//! so the exception-style and value-style entry points never diverge.
//!
//! `Error` is `Clone`: an [`AsyncHandle`](crate::AsyncHandle) that has already
//! settled replays its cached failure on every subsequent wait.

use core::fmt;
use std::any::Any;
use std::sync::Arc;

use thiserror::Error as ThisError;

use crate::config::ConfigError;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type DynSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The category of an effect failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A thunk reported a failure. Propagated unchanged.
    Computation,
    /// A dynamically typed value did not have the expected type.
    TypeMismatch,
    /// A parallel-composition participant is not bound to a parallel context.
    NotParallelSafe,
    /// The parallel execution capability is unavailable.
    CapabilityUnavailable,
    /// A thunk panicked while running.
    Panicked,
    /// A context settled a task without the task producing a result.
    Abandoned,
    /// Runtime configuration could not be loaded.
    Config,
}

impl ErrorKind {
    /// Returns the kind name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Computation => "computation failure",
            Self::TypeMismatch => "type mismatch",
            Self::NotParallelSafe => "not parallel safe",
            Self::CapabilityUnavailable => "capability unavailable",
            Self::Panicked => "panicked",
            Self::Abandoned => "abandoned",
            Self::Config => "configuration error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised while building or running an effect.
///
/// # Example
///
/// ```
/// use ioeffect::{Error, ErrorKind};
///
/// let err = Error::computation("disk full").with_context("writing snapshot");
///
/// assert_eq!(err.kind(), ErrorKind::Computation);
/// assert!(err.to_string().contains("disk full"));
/// ```
#[derive(Debug, Clone, ThisError)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<DynSource>,
    suppressed: Vec<Error>,
}

impl Error {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            suppressed: Vec::new(),
        }
    }

    /// Creates a computation failure, the kind raised by user thunks.
    #[must_use]
    pub fn computation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Computation, message)
    }

    /// Wraps an arbitrary error as a computation failure, keeping it as the source.
    #[must_use]
    pub fn from_source<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::computation(source.to_string()).with_source(source)
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: &str) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("value did not have the expected type `{expected}`"),
        )
    }

    /// Creates a not-parallel-safe error for the participant at `position`.
    #[must_use]
    pub fn not_parallel_safe(position: usize, reason: &str) -> Self {
        Self::new(
            ErrorKind::NotParallelSafe,
            format!("participant {position} {reason}"),
        )
    }

    /// Creates a capability-unavailable error.
    #[must_use]
    pub fn capability_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityUnavailable, message)
    }

    /// Converts a caught panic payload into an error.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        Self::new(ErrorKind::Panicked, panic_message(payload))
    }

    /// Creates an error for a task that settled without a result.
    #[must_use]
    pub fn abandoned() -> Self {
        Self::new(
            ErrorKind::Abandoned,
            "task settled without producing a result",
        )
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Prefixes the message with additional context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.message = format!("{}: {}", context.into(), self.message);
        self
    }

    /// Records a secondary failure that occurred while handling this one.
    #[must_use]
    pub fn with_suppressed(mut self, other: Self) -> Self {
        self.suppressed.push(other);
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns failures that were suppressed in favour of this one.
    #[must_use]
    pub fn suppressed(&self) -> &[Self] {
        &self.suppressed
    }

    /// Returns `true` if a thunk reported this failure.
    #[must_use]
    pub const fn is_computation(&self) -> bool {
        matches!(self.kind, ErrorKind::Computation)
    }

    /// Returns `true` if this is a parallel-safety violation.
    #[must_use]
    pub const fn is_not_parallel_safe(&self) -> bool {
        matches!(self.kind, ErrorKind::NotParallelSafe)
    }

    /// Returns `true` if the parallel capability was unavailable.
    #[must_use]
    pub const fn is_capability_unavailable(&self) -> bool {
        matches!(self.kind, ErrorKind::CapabilityUnavailable)
    }

    /// Returns `true` if the failure came from a panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::from_source(err)
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::computation(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Self::computation(message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, err.to_string()).with_source(err)
    }
}

/// Extension trait for adding context to fallible results.
pub trait ResultExt<T> {
    /// Converts the failure into an [`Error`] and prefixes it with `context`.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.into().with_context(context))
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
