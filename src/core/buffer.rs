//! # Bounded, fair FIFO event buffer.
//!
//! The buffer is split into a producer half ([`BoundedBuffer`], owned by the
//! dispatcher) and a consumer half ([`BufferReader`], owned by the single worker).
//!
//! ## Architecture
//! ```text
//! enqueue(env) ──► Semaphore(N).acquire_owned() ──► mpsc::unbounded ──► dequeue() ──► Slot { env, permit }
//!                  (waits while N outstanding)      (FIFO, ordered)                    │
//!                                                                        fan-out done ─┴─► permit dropped
//! ```
//!
//! ## Rules
//! - **Bounded**: every admitted event holds one permit until its `Slot` is dropped,
//!   so buffered + in-flight never exceeds `N`.
//! - **No missed wake-ups**: waiting and waking are done by the semaphore and the
//!   channel themselves; there is no separate check-then-wait.
//! - **Fair**: blocked producers are admitted in the order they started waiting.
//! - **Closing**: `close()` rejects new and blocked producers; `BufferReader::close()`
//!   rejects producers that already hold a permit. Whatever was sent before that is
//!   still handed out by `dequeue()`.
//! - **Admission count**: `admitted()` equals the number of events ahead of the next
//!   push in FIFO order, so the worker's delivered count can be compared against it.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc};

use crate::error::{ClosedError, ConfigError, TrySubmitError};
use crate::events::Envelope;

/// An event occupying one buffer slot.
///
/// The slot is released when this value is dropped.
pub(crate) struct Slot<E> {
    pub(crate) envelope: Envelope<E>,
    _permit: OwnedSemaphorePermit,
}

/// Producer half of the buffer.
pub(crate) struct BoundedBuffer<E> {
    slots: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<Slot<E>>,
    /// Successful pushes; the lock keeps the count in channel order.
    admitted: Mutex<u64>,
    capacity: usize,
}

/// Consumer half of the buffer.
pub(crate) struct BufferReader<E> {
    rx: mpsc::UnboundedReceiver<Slot<E>>,
}

/// Creates a buffer with `capacity` slots.
pub(crate) fn bounded<E>(capacity: usize) -> Result<(BoundedBuffer<E>, BufferReader<E>), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::ZeroCapacity);
    }
    if capacity > crate::core::config::MAX_CAPACITY {
        return Err(ConfigError::CapacityTooLarge {
            capacity,
            max: crate::core::config::MAX_CAPACITY,
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let buffer = BoundedBuffer {
        slots: Arc::new(Semaphore::new(capacity)),
        tx,
        admitted: Mutex::new(0),
        capacity,
    };
    Ok((buffer, BufferReader { rx }))
}

impl<E> BoundedBuffer<E> {
    /// Appends an event at the tail, waiting while all slots are taken.
    pub(crate) async fn enqueue(&self, envelope: Envelope<E>) -> Result<(), ClosedError<Envelope<E>>> {
        let permit = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_closed) => return Err(ClosedError(envelope)),
        };
        self.push(envelope, permit)
    }

    /// Appends an event at the tail if a slot is free right now.
    pub(crate) fn try_enqueue(&self, envelope: Envelope<E>) -> Result<(), TrySubmitError<Envelope<E>>> {
        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => return Err(TrySubmitError::Full(envelope)),
            Err(TryAcquireError::Closed) => return Err(TrySubmitError::Closed(envelope)),
        };
        self.push(envelope, permit)
            .map_err(|ClosedError(env)| TrySubmitError::Closed(env))
    }

    fn push(
        &self,
        envelope: Envelope<E>,
        permit: OwnedSemaphorePermit,
    ) -> Result<(), ClosedError<Envelope<E>>> {
        let mut admitted = self.admitted.lock().unwrap_or_else(PoisonError::into_inner);
        self.tx
            .send(Slot {
                envelope,
                _permit: permit,
            })
            .map_err(|mpsc::error::SendError(slot)| ClosedError(slot.envelope))?;
        *admitted += 1;
        Ok(())
    }

    /// Number of events admitted so far.
    pub(crate) fn admitted(&self) -> u64 {
        *self.admitted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops admitting events and releases every producer waiting for a slot.
    pub(crate) fn close(&self) {
        self.slots.close();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Number of events buffered or being delivered.
    pub(crate) fn len(&self) -> usize {
        self.capacity - self.slots.available_permits().min(self.capacity)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<E> BufferReader<E> {
    /// Removes the event at the head, waiting while the buffer is empty.
    ///
    /// Returns `None` once the buffer is closed (or every producer is gone) and empty.
    pub(crate) async fn dequeue(&mut self) -> Option<Slot<E>> {
        self.rx.recv().await
    }

    /// Rejects any further push; buffered events can still be dequeued.
    pub(crate) fn close(&mut self) {
        self.rx.close();
    }

    /// Drops every buffered event without delivering it, returning how many were dropped.
    pub(crate) fn discard(&mut self) -> u64 {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
