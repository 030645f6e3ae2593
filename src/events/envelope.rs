//! # Submitted events and the context captured with them.
//!
//! An [`Envelope`] is built synchronously inside `Dispatcher::submit`, before the
//! producer ever waits for a buffer slot. Everything that depends on the calling
//! context (thread, call site, wall clock) is read at that moment and frozen into
//! the envelope; the worker that delivers it later runs on a different task and
//! must not look at caller-local state.
//!
//! ## Example
//! ```rust
//! use eventvisor::{Envelope, HandlerFn, HandlerError};
//!
//! let audit = HandlerFn::arc("audit", |ev: &Envelope<String>| {
//!     println!(
//!         "#{} from {} at {}: {}",
//!         ev.seq,
//!         ev.origin.thread_name().unwrap_or("<unnamed>"),
//!         ev.origin.location,
//!         ev.payload,
//!     );
//!     Ok::<_, HandlerError>(())
//! });
//! # let _ = audit;
//! ```

use std::panic::Location;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::SystemTime;

/// Identity of the call site that submitted an event.
#[derive(Clone, Debug)]
pub struct Origin {
    /// Name of the submitting thread, if it has one.
    pub thread: Option<Arc<str>>,
    /// Id of the submitting thread.
    pub thread_id: ThreadId,
    /// Source location of the `submit` call.
    pub location: &'static Location<'static>,
}

impl Origin {
    /// Captures the current thread and the given call site.
    pub(crate) fn capture(location: &'static Location<'static>) -> Self {
        let current = thread::current();
        Self {
            thread: current.name().map(Arc::from),
            thread_id: current.id(),
            location,
        }
    }

    /// Returns the thread name as a plain `&str`.
    #[inline]
    pub fn thread_name(&self) -> Option<&str> {
        self.thread.as_deref()
    }
}

/// An immutable event as seen by handlers.
///
/// - `seq`: capture order within one dispatcher (starts at 0).
///   Under contention, delivery order follows buffer admission, which may differ from `seq`.
/// - `at`: wall-clock capture time
/// - `origin`: submitting thread and call site
/// - `payload`: the user event
#[derive(Clone, Debug)]
pub struct Envelope<E> {
    /// Capture sequence number.
    pub seq: u64,
    /// Wall-clock capture timestamp.
    pub at: SystemTime,
    /// Where the event was submitted from.
    pub origin: Origin,
    /// The submitted event.
    pub payload: E,
}

impl<E> Envelope<E> {
    pub(crate) fn capture(seq: u64, payload: E, location: &'static Location<'static>) -> Self {
        Self {
            seq,
            at: SystemTime::now(),
            origin: Origin::capture(location),
            payload,
        }
    }

    /// Consumes the envelope, returning the payload.
    #[inline]
    pub fn into_payload(self) -> E {
        self.payload
    }
}
