//! # Diagnostic bus.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that carries
//! [`Diagnostic`] records from the worker and the facade to any number of observers.
//!
//! ## Architecture
//! ```text
//! Publishers:                          Receivers (many):
//!   DispatchWorker ──┐
//!   Dispatcher     ──┼──────► Bus ───────► Dispatcher::diagnostics()
//!   (close/attach)   │  (broadcast chan)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks the worker or a producer.
//! - **Bounded capacity**: a single ring buffer stores recent records for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: records are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::diagnostic::Diagnostic;

/// Broadcast channel for diagnostic records.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Diagnostic>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Diagnostic>(capacity);
        Self { tx }
    }

    /// Publishes a record to all active receivers.
    ///
    /// If there are no receivers, the record is dropped.
    pub fn publish(&self, record: Diagnostic) {
        let _ = self.tx.send(record);
    }

    /// Creates a new receiver that will observe subsequent records.
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }
}
