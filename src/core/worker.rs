//! # DispatchWorker: the single delivery loop.
//!
//! Drains the buffer and fans every event out to a registry snapshot, one handler
//! at a time, in attach order.
//!
//! ## Architecture
//! ```text
//! run():
//!   mark Running
//!   loop {                                   ── phase 1: steady state
//!     select (biased) {
//!       closing.cancelled() → break
//!       dequeue()           → deliver(slot)
//!     }
//!   }
//!   reader.close()                           ── no push can succeed from here on
//!   while let Some(slot) = dequeue() {       ── phase 2: final drain
//!     if interrupt.is_cancelled() → discard rest, break
//!     deliver(slot)
//!   }
//!   mark Terminated (drop guard)
//!
//! deliver(slot):
//!   snapshot = registry.snapshot()
//!   for h in snapshot { catch_unwind(h.consume(&env)) → Ok | Err → warn! | panic → error! }
//!   drop(slot) → buffer slot released
//!   delivered += 1 → wakes flush() callers
//! ```
//!
//! ## Rules
//! - Exactly one worker per dispatcher; FIFO delivery depends on it.
//! - `closing` and `interrupt` are observed only **between** fan-outs, never mid fan-out.
//! - Handler errors and panics are contained here; producers never see them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::buffer::{BufferReader, Slot};
use crate::core::dispatcher::Shared;
use crate::events::{Diagnostic, DiagnosticKind, Envelope};
use crate::handlers::Entry;

/// Why the worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Close requested and every buffered event delivered.
    Drained,
    /// All producer handles dropped and every buffered event delivered.
    Orphaned,
    /// Interrupted during the final drain; `dropped` events were discarded.
    Interrupted { dropped: u64 },
}

/// Single consumer of the buffer.
pub(crate) struct DispatchWorker<E> {
    shared: Arc<Shared<E>>,
    reader: BufferReader<E>,
    /// Leave the steady-state loop and start the final drain.
    closing: CancellationToken,
    /// Abandon the final drain after the in-flight fan-out.
    interrupt: CancellationToken,
}

/// Marks the dispatcher `Terminated` however the worker exits.
struct TerminateOnExit<'a, E>(&'a Shared<E>);

impl<E> Drop for TerminateOnExit<'_, E> {
    fn drop(&mut self) {
        self.0.lifecycle.mark_terminated();
    }
}

impl<E: Send + Sync + 'static> DispatchWorker<E> {
    pub(crate) fn new(
        shared: Arc<Shared<E>>,
        reader: BufferReader<E>,
        closing: CancellationToken,
        interrupt: CancellationToken,
    ) -> Self {
        Self {
            shared,
            reader,
            closing,
            interrupt,
        }
    }

    /// Runs the worker until the dispatcher terminates.
    pub(crate) async fn run(mut self) -> WorkerExit {
        let shared = Arc::clone(&self.shared);
        let _guard = TerminateOnExit(&shared);

        if shared.lifecycle.mark_running() {
            debug!("dispatch worker running");
        }

        let orphaned = self.steady_state().await;
        let exit = self.final_drain(orphaned).await;

        let dropped = match exit {
            WorkerExit::Interrupted { dropped } => dropped,
            _ => 0,
        };
        shared.dropped.store(dropped, Ordering::Release);
        shared
            .bus
            .publish(Diagnostic::new(DiagnosticKind::Terminated).with_dropped(dropped));
        info!(?exit, dropped, "dispatch worker terminated");
        exit
    }

    /// Phase 1. Returns `true` if every producer handle went away instead of a close request.
    async fn steady_state(&mut self) -> bool {
        loop {
            let slot = select! {
                biased;
                _ = self.closing.cancelled() => return false,
                slot = self.reader.dequeue() => slot,
            };
            match slot {
                Some(slot) => self.deliver(slot).await,
                None => return true,
            }
        }
    }

    /// Phase 2.
    async fn final_drain(&mut self, orphaned: bool) -> WorkerExit {
        self.reader.close();
        debug!("dispatch worker draining");

        while let Some(slot) = self.reader.dequeue().await {
            if self.interrupt.is_cancelled() {
                drop(slot);
                let dropped = 1 + self.reader.discard();
                warn!(dropped, "shutdown interrupted; discarding buffered events");
                self.shared
                    .bus
                    .publish(Diagnostic::new(DiagnosticKind::Interrupted).with_dropped(dropped));
                return WorkerExit::Interrupted { dropped };
            }
            self.deliver(slot).await;
        }

        if orphaned {
            WorkerExit::Orphaned
        } else {
            WorkerExit::Drained
        }
    }

    /// Fans one event out to a registry snapshot, releases its buffer slot and
    /// advances the delivered count.
    async fn deliver(&self, slot: Slot<E>) {
        let snapshot = self.shared.registry.snapshot();
        if snapshot.is_empty() {
            debug!(seq = slot.envelope.seq, "no handlers attached");
        }
        for entry in snapshot.iter() {
            self.invoke(entry, &slot.envelope).await;
        }
        drop(slot);
        self.shared.delivered.send_modify(|n| *n += 1);
    }

    /// Invokes one handler with failure and panic isolation.
    async fn invoke(&self, entry: &Entry<E>, envelope: &Envelope<E>) {
        let name = entry.name();
        let fut = entry.handler.consume(envelope);

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    handler = name,
                    seq = envelope.seq,
                    error = %err,
                    label = err.as_label(),
                    "handler failed"
                );
                self.shared.bus.publish(Diagnostic::handler_failed(
                    name,
                    envelope.seq,
                    err.to_string(),
                ));
            }
            Err(panic_err) => {
                let info = panic_message(&*panic_err);
                error!(handler = name, seq = envelope.seq, panic = %info, "handler panicked");
                self.shared
                    .bus
                    .publish(Diagnostic::handler_panicked(name, envelope.seq, info));
            }
        }
    }
}

fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
