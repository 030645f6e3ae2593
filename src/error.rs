//! Error types used by the dispatcher, its producers and its handlers.
//!
//! This module defines:
//!
//! - [`ConfigError`]: invalid [`Config`](crate::Config); raised by `build()`, the dispatcher never starts.
//! - [`ClosedError`]: `submit` on a dispatcher that is closing or terminated; hands the payload back.
//! - [`TrySubmitError`]: `try_submit` outcome when the buffer is full or closed; hands the payload back.
//! - [`HandlerError`]: a handler failed to consume an event; contained inside the worker.
//! - [`RuntimeError`]: a bounded shutdown had to abandon buffered events.
//!
//! The `thiserror` enums provide helper methods (`as_label`, `as_message`) for logging.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// # Invalid dispatcher configuration.
///
/// Reported synchronously by [`DispatcherBuilder::build`](crate::DispatcherBuilder::build)
/// before any worker is spawned.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The buffer must hold at least one event.
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,

    /// The buffer capacity does not fit the slot semaphore.
    #[error("buffer capacity {capacity} exceeds the maximum of {max}")]
    CapacityTooLarge {
        /// The requested capacity.
        capacity: usize,
        /// The largest supported capacity.
        max: usize,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::ConfigError;
    ///
    /// assert_eq!(ConfigError::ZeroCapacity.as_label(), "config_zero_capacity");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::ZeroCapacity => "config_zero_capacity",
            ConfigError::CapacityTooLarge { .. } => "config_capacity_too_large",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ConfigError::ZeroCapacity => "capacity=0".to_string(),
            ConfigError::CapacityTooLarge { capacity, max } => {
                format!("capacity={capacity} max={max}")
            }
        }
    }
}

/// # Errors returned by a handler while consuming an event.
///
/// A failing handler never affects other handlers or the worker: the error is
/// logged, published as a [`DiagnosticKind::HandlerFailed`](crate::DiagnosticKind::HandlerFailed)
/// record and delivery continues with the next handler.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler could not process the event.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The handler hit an I/O error while writing the event out.
    #[error("handler i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use eventvisor::HandlerError;
    ///
    /// let err = HandlerError::fail("disk full");
    /// assert_eq!(err.to_string(), "handler failed: disk full");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        HandlerError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Io(_) => "handler_io",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Io(err) => format!("io: {err}"),
        }
    }
}

/// # Errors produced by the dispatcher runtime itself.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The shutdown grace period elapsed before the buffer was drained; the
    /// in-flight event was finished but `dropped` buffered events were discarded.
    #[error("shutdown grace {grace:?} exceeded; {dropped} buffered events discarded")]
    Interrupted {
        /// The configured grace duration.
        grace: Duration,
        /// Number of buffered events that were never delivered.
        dropped: u64,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::Interrupted { grace: Duration::from_secs(5), dropped: 3 };
    /// assert_eq!(err.as_label(), "runtime_interrupted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Interrupted { .. } => "runtime_interrupted",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Interrupted { grace, dropped } => {
                format!("interrupted after {grace:?}; dropped={dropped}")
            }
        }
    }
}

/// Returned by `submit` when the dispatcher no longer accepts events.
///
/// The rejected payload is handed back to the caller.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct ClosedError<E>(pub E);

impl<E> ClosedError<E> {
    /// Consumes the error, returning the rejected payload.
    pub fn into_inner(self) -> E {
        self.0
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(E) -> U) -> ClosedError<U> {
        ClosedError(f(self.0))
    }
}

impl<E> fmt::Debug for ClosedError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosedError").finish_non_exhaustive()
    }
}

impl<E> fmt::Display for ClosedError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatcher is closed")
    }
}

impl<E> std::error::Error for ClosedError<E> {}

/// Returned by `try_submit` when the event could not be admitted immediately.
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum TrySubmitError<E> {
    /// Every buffer slot is taken; retry later or use the awaiting `submit`.
    Full(E),
    /// The dispatcher is closing or terminated.
    Closed(E),
}

impl<E> TrySubmitError<E> {
    /// Consumes the error, returning the rejected payload.
    pub fn into_inner(self) -> E {
        match self {
            TrySubmitError::Full(e) | TrySubmitError::Closed(e) => e,
        }
    }

    /// Returns `true` for [`TrySubmitError::Full`].
    pub fn is_full(&self) -> bool {
        matches!(self, TrySubmitError::Full(_))
    }

    /// Returns `true` for [`TrySubmitError::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, TrySubmitError::Closed(_))
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(E) -> U) -> TrySubmitError<U> {
        match self {
            TrySubmitError::Full(e) => TrySubmitError::Full(f(e)),
            TrySubmitError::Closed(e) => TrySubmitError::Closed(f(e)),
        }
    }
}

impl<E> fmt::Debug for TrySubmitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySubmitError::Full(_) => f.write_str("Full(..)"),
            TrySubmitError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<E> fmt::Display for TrySubmitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySubmitError::Full(_) => write!(f, "buffer is full"),
            TrySubmitError::Closed(_) => write!(f, "dispatcher is closed"),
        }
    }
}

impl<E> std::error::Error for TrySubmitError<E> {}
