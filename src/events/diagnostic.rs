//! # Diagnostic records emitted by the dispatcher.
//!
//! Handler failures never reach producers: they are contained inside the worker and
//! surface here instead, next to lifecycle milestones. The [`DiagnosticKind`] enum
//! classifies records into two groups:
//! - **Handler events**: registry changes and per-handler delivery failures
//! - **Lifecycle events**: close requested, interrupted, terminated
//!
//! ## Ordering guarantees
//! Each record has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Diagnostic, DiagnosticKind};
//!
//! let d = Diagnostic::new(DiagnosticKind::HandlerFailed)
//!     .with_handler("audit")
//!     .with_event_seq(42)
//!     .with_reason("disk full");
//!
//! assert_eq!(d.kind, DiagnosticKind::HandlerFailed);
//! assert_eq!(d.handler.as_deref(), Some("audit"));
//! assert_eq!(d.event_seq, Some(42));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for diagnostic ordering.
static DIAGNOSTIC_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostic records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    // === Handler events ===
    /// Handler added to the registry.
    ///
    /// Sets:
    /// - `handler`: handler name
    HandlerAttached,

    /// Handler removed from the registry.
    ///
    /// Sets:
    /// - `handler`: handler name
    HandlerDetached,

    /// Handler returned an error while consuming an event.
    ///
    /// Sets:
    /// - `handler`: handler name
    /// - `event_seq`: `seq` of the envelope being delivered
    /// - `reason`: error message
    HandlerFailed,

    /// Handler panicked while consuming an event.
    ///
    /// Sets:
    /// - `handler`: handler name
    /// - `event_seq`: `seq` of the envelope being delivered
    /// - `reason`: panic message
    HandlerPanicked,

    // === Lifecycle events ===
    /// First close/shutdown call observed; the buffer no longer admits events.
    CloseRequested,

    /// Shutdown grace exceeded; remaining buffered events were discarded.
    ///
    /// Sets:
    /// - `dropped`: number of discarded events
    Interrupted,

    /// Worker exited; no handler will be invoked again.
    ///
    /// Sets:
    /// - `dropped`: number of discarded events (0 after an orderly close)
    Terminated,
}

/// Diagnostic record with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`DiagnosticKind`]
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Record classification.
    pub kind: DiagnosticKind,
    /// Handler name, if applicable.
    pub handler: Option<Arc<str>>,
    /// Sequence number of the envelope involved, if any.
    pub event_seq: Option<u64>,
    /// Human-readable reason (errors, panic messages).
    pub reason: Option<Arc<str>>,
    /// Number of events discarded by an interrupted shutdown.
    pub dropped: Option<u64>,
}

impl Diagnostic {
    /// Creates a new record of the given kind with current timestamp and next sequence number.
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            seq: DIAGNOSTIC_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            handler: None,
            event_seq: None,
            reason: None,
            dropped: None,
        }
    }

    /// Attaches a handler name.
    #[inline]
    pub fn with_handler(mut self, handler: impl Into<Arc<str>>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Attaches the sequence number of the envelope involved.
    #[inline]
    pub fn with_event_seq(mut self, seq: u64) -> Self {
        self.event_seq = Some(seq);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a count of discarded events.
    #[inline]
    pub fn with_dropped(mut self, dropped: u64) -> Self {
        self.dropped = Some(dropped);
        self
    }

    /// Creates a handler failure record.
    #[inline]
    pub fn handler_failed(handler: &'static str, event_seq: u64, reason: String) -> Self {
        Diagnostic::new(DiagnosticKind::HandlerFailed)
            .with_handler(handler)
            .with_event_seq(event_seq)
            .with_reason(reason)
    }

    /// Creates a handler panic record.
    #[inline]
    pub fn handler_panicked(handler: &'static str, event_seq: u64, info: String) -> Self {
        Diagnostic::new(DiagnosticKind::HandlerPanicked)
            .with_handler(handler)
            .with_event_seq(event_seq)
            .with_reason(info)
    }

    /// Returns `true` for handler errors and handler panics.
    #[inline]
    pub fn is_handler_failure(&self) -> bool {
        matches!(
            self.kind,
            DiagnosticKind::HandlerFailed | DiagnosticKind::HandlerPanicked
        )
    }
}
