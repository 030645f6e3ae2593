//! # Dispatcher: the producer-facing facade.
//!
//! The [`Dispatcher`] owns the bounded buffer, the handler registry and the
//! lifecycle of its single [`DispatchWorker`](super::worker::DispatchWorker).
//!
//! ## Key responsibilities
//! - capture caller context eagerly and admit events into the buffer (`submit`)
//! - attach/detach handlers at any time, including while closing
//! - confirmed shutdown: `close()` returns only once no handler can run again
//! - bounded shutdown: `shutdown()` gives up on the drain after [`Config::grace`]
//!
//! ## High-level architecture
//! ```text
//! Producers (many):                                   Worker (one):
//!   submit(e) ──► Envelope::capture ──► BoundedBuffer ──► DispatchWorker ──► snapshot ──► h1, h2, ... hN
//!   try_submit(e)   (seq/time/thread/    (N slots,          (tokio task)
//!   blocking_submit  call site)           fair wait)
//!
//! Control:
//!   attach/detach ──► HandlerRegistry (copy-on-write)
//!   close()      ──► Closing: buffer.close() + closing.cancel() ──► wait Terminated
//!   shutdown()   ──► close() bounded by grace ──► interrupt.cancel() ──► wait Terminated
//!   diagnostics() ◄── Bus ◄── worker (handler failures, lifecycle)
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{Config, Dispatcher, Envelope, HandlerError, HandlerFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let printer = HandlerFn::arc("printer", |ev: &Envelope<String>| {
//!         println!("#{} {}", ev.seq, ev.payload);
//!         Ok::<_, HandlerError>(())
//!     });
//!
//!     let dispatcher = Dispatcher::builder(Config::with_capacity(64))
//!         .with_handler(printer)
//!         .build()?;
//!
//!     dispatcher.submit("hello".to_string()).await?;
//!     dispatcher.submit("world".to_string()).await?;
//!
//!     // Drains both events before returning.
//!     dispatcher.close().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::buffer::BoundedBuffer;
use crate::core::builder::DispatcherBuilder;
use crate::core::config::Config;
use crate::core::state::{Lifecycle, State};
use crate::error::{ClosedError, ConfigError, RuntimeError, TrySubmitError};
use crate::events::{Bus, Diagnostic, DiagnosticKind, Envelope};
use crate::handlers::{Handler, HandlerId, HandlerRegistry};

/// State shared between the facade and the worker.
pub(crate) struct Shared<E> {
    pub(crate) registry: HandlerRegistry<E>,
    pub(crate) bus: Bus,
    pub(crate) lifecycle: Lifecycle,
    /// Events whose fan-out completed, in FIFO order; `flush` waits on it.
    pub(crate) delivered: watch::Sender<u64>,
    /// Events discarded by an interrupted drain; written once by the worker before it terminates.
    pub(crate) dropped: AtomicU64,
}

/// Asynchronous bounded-buffer event dispatcher.
///
/// Producers call [`submit`](Self::submit); a single background worker delivers every
/// admitted event, in admission order, to each attached [`Handler`].
pub struct Dispatcher<E> {
    cfg: Config,
    shared: Arc<Shared<E>>,
    buffer: BoundedBuffer<E>,
    seq: AtomicU64,
    closing: CancellationToken,
    interrupt: CancellationToken,
}

impl<E: Send + Sync + 'static> Dispatcher<E> {
    /// Returns a builder for a dispatcher with the given configuration.
    pub fn builder(cfg: Config) -> DispatcherBuilder<E> {
        DispatcherBuilder::new(cfg)
    }

    /// Creates a dispatcher with no handlers attached and starts its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: Config) -> Result<Arc<Self>, ConfigError> {
        Self::builder(cfg).build()
    }

    pub(crate) fn from_parts(
        cfg: Config,
        shared: Arc<Shared<E>>,
        buffer: BoundedBuffer<E>,
        closing: CancellationToken,
        interrupt: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            shared,
            buffer,
            seq: AtomicU64::new(0),
            closing,
            interrupt,
        }
    }

    #[inline]
    fn capture(&self, payload: E, location: &'static Location<'static>) -> Envelope<E> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        Envelope::capture(seq, payload, location)
    }

    /// Submits an event, waiting while the buffer is full.
    ///
    /// The caller context (thread, call site, timestamp) is captured **when this method
    /// is called**, not when the returned future completes.
    ///
    /// ### Errors
    /// [`ClosedError`] carrying the payload if the dispatcher is closing or terminated,
    /// including when the close happens while this call is waiting for a slot.
    #[track_caller]
    pub fn submit(&self, event: E) -> impl Future<Output = Result<(), ClosedError<E>>> + Send + '_ {
        let envelope = self.capture(event, Location::caller());
        async move {
            self.buffer
                .enqueue(envelope)
                .await
                .map_err(|e| e.map(Envelope::into_payload))
        }
    }

    /// Submits an event from a thread that is not driven by an async runtime.
    ///
    /// Blocks the calling thread while the buffer is full. Do not call this from
    /// inside an async task: it would block that executor thread.
    #[track_caller]
    pub fn blocking_submit(&self, event: E) -> Result<(), ClosedError<E>> {
        futures::executor::block_on(self.submit(event))
    }

    /// Submits an event only if a buffer slot is free right now.
    ///
    /// ### Errors
    /// - [`TrySubmitError::Full`] when the buffer is saturated (backpressure)
    /// - [`TrySubmitError::Closed`] when the dispatcher no longer accepts events
    ///
    /// Both variants hand the payload back.
    #[track_caller]
    pub fn try_submit(&self, event: E) -> Result<(), TrySubmitError<E>> {
        let envelope = self.capture(event, Location::caller());
        self.buffer
            .try_enqueue(envelope)
            .map_err(|e| e.map(Envelope::into_payload))
    }

    /// Attaches a handler. It receives every event whose fan-out starts after this call.
    pub fn attach(&self, handler: Arc<dyn Handler<E>>) -> HandlerId {
        let name = handler.name();
        let id = self.shared.registry.attach(handler);
        debug!(handler = name, %id, "handler attached");
        self.shared
            .bus
            .publish(Diagnostic::new(DiagnosticKind::HandlerAttached).with_handler(name));
        id
    }

    /// Detaches a handler. Returns `false` if `id` was not attached.
    ///
    /// A fan-out already in progress still delivers its event to the handler.
    pub fn detach(&self, id: HandlerId) -> bool {
        match self.shared.registry.detach(id) {
            Some(handler) => {
                self.publish_detached(handler.name());
                true
            }
            None => false,
        }
    }

    /// Detaches every handler, returning how many were attached.
    pub fn detach_all(&self) -> usize {
        let removed = self.shared.registry.detach_all();
        for handler in &removed {
            self.publish_detached(handler.name());
        }
        removed.len()
    }

    fn publish_detached(&self, name: &'static str) {
        debug!(handler = name, "handler detached");
        self.shared
            .bus
            .publish(Diagnostic::new(DiagnosticKind::HandlerDetached).with_handler(name));
    }

    /// Waits until every event admitted before this call has been delivered.
    ///
    /// Takes no buffer slots: producers keep submitting while a flush is pending.
    /// Also resolves once the worker terminated, which covers events discarded by
    /// an interrupted [`shutdown`](Self::shutdown). Must not be called from inside a handler.
    pub async fn flush(&self) {
        let target = self.buffer.admitted();
        let mut delivered = self.shared.delivered.subscribe();
        tokio::select! {
            _ = delivered.wait_for(|n| *n >= target) => {}
            _ = self.shared.lifecycle.terminated() => {}
        }
    }

    /// Closes the dispatcher and waits for the final drain.
    ///
    /// 1. `Running → Closing`: new and blocked `submit` calls fail with [`ClosedError`]
    /// 2. the worker delivers every event admitted before that point
    /// 3. returns once the worker reached `Terminated`; no handler runs afterwards
    ///
    /// Idempotent: concurrent and repeated calls all wait for the same termination.
    pub async fn close(&self) {
        self.request_close();
        self.shared.lifecycle.terminated().await;
    }

    /// Blocking twin of [`close`](Self::close) for non-async threads.
    pub fn blocking_close(&self) {
        futures::executor::block_on(self.close());
    }

    /// Closes the dispatcher, draining for at most [`Config::grace`].
    ///
    /// If the grace period runs out, the worker finishes the fan-out in progress,
    /// discards the remaining buffered events and terminates. This is the only path
    /// on which admitted events can be lost.
    ///
    /// ### Errors
    /// [`RuntimeError::Interrupted`] if at least one buffered event was discarded.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request_close();

        let grace = self.cfg.grace;
        let drained = !grace.is_zero()
            && tokio::time::timeout(grace, self.shared.lifecycle.terminated())
                .await
                .is_ok();

        if !drained {
            if !self.interrupt.is_cancelled() {
                warn!(?grace, "shutdown grace exceeded; interrupting drain");
            }
            self.interrupt.cancel();
            self.shared.lifecycle.terminated().await;
        }

        match self.shared.dropped.load(Ordering::Acquire) {
            0 => Ok(()),
            dropped => Err(RuntimeError::Interrupted { grace, dropped }),
        }
    }

    /// Performs the `→ Closing` transition once.
    fn request_close(&self) {
        if !self.shared.lifecycle.begin_close() {
            return;
        }
        info!(outstanding = self.buffer.len(), "dispatcher closing");
        self.shared
            .bus
            .publish(Diagnostic::new(DiagnosticKind::CloseRequested));
        self.buffer.close();
        self.closing.cancel();
    }

    /// Subscribes to diagnostic records (handler failures, lifecycle milestones).
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.shared.bus.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.shared.lifecycle.current()
    }

    /// Returns `true` once no new event can be admitted.
    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    /// Number of events buffered or being delivered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing is buffered or being delivered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer capacity `N`.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Names of attached handlers in delivery order.
    pub fn handlers(&self) -> Vec<&'static str> {
        self.shared.registry.names()
    }

    /// Configuration this dispatcher was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::error::HandlerError;
    use crate::handlers::HandlerFn;

    /// Records every payload it receives.
    struct Recorder<E> {
        name: &'static str,
        seen: Mutex<Vec<E>>,
    }

    impl<E: Clone> Recorder<E> {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<E> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<E: Clone + Send + Sync + 'static> Handler<E> for Recorder<E> {
        async fn consume(&self, ev: &Envelope<E>) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(ev.payload.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    /// Records a payload, then blocks until the test opens the gate.
    struct Gate {
        entered: Notify,
        gate: Semaphore,
        seen: Mutex<Vec<&'static str>>,
    }

    impl Gate {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                entered: Notify::new(),
                gate: Semaphore::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn open(&self, n: usize) {
            self.gate.add_permits(n);
        }

        fn seen(&self) -> Vec<&'static str> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Handler<&'static str> for Gate {
        async fn consume(&self, ev: &Envelope<&'static str>) -> Result<(), HandlerError> {
            self.entered.notify_one();
            self.gate
                .acquire()
                .await
                .map_err(HandlerError::fail)?
                .forget();
            self.seen.lock().unwrap().push(ev.payload);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "gate"
        }
    }

    fn failing() -> Arc<dyn Handler<u32>> {
        HandlerFn::arc("failing", |_: &Envelope<u32>| -> Result<(), HandlerError> {
            Err(HandlerError::fail("always"))
        })
    }

    fn panicking() -> Arc<dyn Handler<u32>> {
        HandlerFn::arc("panicking", |_: &Envelope<u32>| -> Result<(), HandlerError> {
            panic!("handler blew up")
        })
    }

    fn drain(rx: &mut broadcast::Receiver<Diagnostic>) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        while let Ok(d) = rx.try_recv() {
            out.push(d);
        }
        out
    }

    #[test]
    fn test_zero_capacity_is_rejected_before_spawning() {
        let err = Dispatcher::<u32>::new(Config::with_capacity(0)).err();
        assert_eq!(err, Some(ConfigError::ZeroCapacity));
    }

    #[tokio::test]
    async fn test_fifo_order_single_producer() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(8))
            .with_handler(rec.clone())
            .build()
            .unwrap();

        for i in 0..1_000u32 {
            d.submit(i).await.unwrap();
        }
        d.close().await;

        assert_eq!(rec.seen(), (0..1_000).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_no_loss_on_orderly_close() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(16))
            .with_handler(rec.clone())
            .build()
            .unwrap();

        for i in 0..500u32 {
            d.submit(i).await.unwrap();
        }
        d.close().await;

        assert_eq!(rec.seen().len(), 500);
        assert_eq!(d.state(), State::Terminated);
        assert!(d.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_two_blocks_third_submit_until_first_drained() {
        let gate = Gate::new();
        let d = Dispatcher::<&'static str>::builder(Config::with_capacity(2))
            .with_handler(gate.clone())
            .build()
            .unwrap();

        d.submit("A").await.unwrap();
        gate.entered.notified().await;

        // A is in flight, one slot left: B is admitted without waiting.
        timeout(Duration::from_millis(200), d.submit("B"))
            .await
            .expect("B must not block")
            .unwrap();
        assert_eq!(d.len(), 2);

        let third = {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.submit("C").await })
        };
        sleep(Duration::from_millis(50)).await;
        assert!(!third.is_finished(), "C must wait for a free slot");

        gate.open(3);
        third.await.unwrap().unwrap();
        d.close().await;

        assert_eq!(gate.seen(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_failing_handler_is_isolated() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(4))
            .with_handler(failing())
            .with_handler(rec.clone())
            .build()
            .unwrap();
        let mut diag = d.diagnostics();

        for i in 0..10u32 {
            d.submit(i).await.unwrap();
        }
        d.close().await;

        assert_eq!(rec.seen(), (0..10).collect::<Vec<_>>());
        let failures: Vec<_> = drain(&mut diag)
            .into_iter()
            .filter(|r| r.kind == DiagnosticKind::HandlerFailed)
            .collect();
        assert_eq!(failures.len(), 10);
        assert_eq!(failures[0].handler.as_deref(), Some("failing"));
        assert_eq!(failures[0].event_seq, Some(0));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(4))
            .with_handler(panicking())
            .with_handler(rec.clone())
            .build()
            .unwrap();
        let mut diag = d.diagnostics();

        for i in 0..3u32 {
            d.submit(i).await.unwrap();
        }
        d.close().await;

        assert_eq!(rec.seen(), vec![0, 1, 2]);
        let panics: Vec<_> = drain(&mut diag)
            .into_iter()
            .filter(|r| r.kind == DiagnosticKind::HandlerPanicked)
            .collect();
        assert_eq!(panics.len(), 3);
        assert_eq!(panics[0].reason.as_deref(), Some("handler blew up"));
    }

    #[tokio::test]
    async fn test_idempotent_concurrent_close() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(4))
            .with_handler(rec.clone())
            .build()
            .unwrap();
        let mut diag = d.diagnostics();

        for i in 0..20u32 {
            d.submit(i).await.unwrap();
        }
        tokio::join!(d.close(), d.close());
        d.close().await;

        let records = drain(&mut diag);
        let count = |kind| records.iter().filter(|r| r.kind == kind).count();
        assert_eq!(count(DiagnosticKind::CloseRequested), 1);
        assert_eq!(count(DiagnosticKind::Terminated), 1);
        assert_eq!(rec.seen().len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_close_from_two_threads() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(4))
            .with_handler(rec.clone())
            .build()
            .unwrap();
        for i in 0..50u32 {
            d.submit(i).await.unwrap();
        }

        let closers: Vec<_> = (0..2)
            .map(|_| {
                let d = Arc::clone(&d);
                std::thread::spawn(move || d.blocking_close())
            })
            .collect();
        tokio::task::spawn_blocking(move || {
            for c in closers {
                c.join().unwrap();
            }
        })
        .await
        .unwrap();

        assert_eq!(d.state(), State::Terminated);
        assert_eq!(rec.seen().len(), 50);
    }

    #[tokio::test]
    async fn test_detach_then_attach_switches_recipient() {
        let h1 = Recorder::<&'static str>::new("h1");
        let h2 = Recorder::<&'static str>::new("h2");
        let d = Dispatcher::<&'static str>::new(Config::with_capacity(4)).unwrap();

        let id1 = d.attach(h1.clone());
        d.submit("E1").await.unwrap();
        d.flush().await;

        assert!(d.detach(id1));
        assert!(!d.detach(id1));
        d.attach(h2.clone());
        d.submit("E2").await.unwrap();
        d.close().await;

        assert_eq!(h1.seen(), vec!["E1"]);
        assert_eq!(h2.seen(), vec!["E2"]);
    }

    #[tokio::test]
    async fn test_handler_detached_mid_fanout_still_gets_current_event() {
        let gate = Gate::new();
        let rec = Recorder::<&'static str>::new("rec");
        let d = Dispatcher::<&'static str>::builder(Config::with_capacity(4))
            .with_handler(gate.clone())
            .build()
            .unwrap();
        let rec_id = d.attach(rec.clone());

        d.submit("first").await.unwrap();
        gate.entered.notified().await;
        d.detach(rec_id);
        d.submit("second").await.unwrap();

        gate.open(2);
        d.close().await;

        assert_eq!(gate.seen(), vec!["first", "second"]);
        assert_eq!(rec.seen(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_submit_after_close_fails_fast() {
        let d = Dispatcher::<u32>::new(Config::with_capacity(1)).unwrap();
        d.close().await;

        let err = d.submit(7).await.unwrap_err();
        assert_eq!(err.into_inner(), 7);
        assert!(d.try_submit(8).unwrap_err().is_closed());
        assert!(d.is_closed());
    }

    #[tokio::test]
    async fn test_blocked_producer_released_on_close() {
        let gate = Gate::new();
        let d = Dispatcher::<&'static str>::builder(Config::with_capacity(1))
            .with_handler(gate.clone())
            .build()
            .unwrap();

        d.submit("A").await.unwrap();
        gate.entered.notified().await;

        let blocked = {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.submit("B").await })
        };
        sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        let closer = {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.close().await })
        };

        let err = timeout(Duration::from_millis(500), blocked)
            .await
            .expect("blocked producer must be released")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.into_inner(), "B");
        assert_eq!(d.state(), State::Closing);

        gate.open(1);
        closer.await.unwrap();
        assert_eq!(gate.seen(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_try_submit_reports_backpressure() {
        let gate = Gate::new();
        let d = Dispatcher::<&'static str>::builder(Config::with_capacity(1))
            .with_handler(gate.clone())
            .build()
            .unwrap();

        d.try_submit("A").unwrap();
        gate.entered.notified().await;

        let err = d.try_submit("B").unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), "B");

        gate.open(2);
        d.flush().await;
        d.try_submit("B").unwrap();
        d.close().await;

        assert_eq!(gate.seen(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_pending_flush_keeps_free_slots_usable() {
        let gate = Gate::new();
        let d = Dispatcher::<&'static str>::builder(Config::with_capacity(4))
            .with_handler(gate.clone())
            .build()
            .unwrap();

        d.submit("A").await.unwrap();
        gate.entered.notified().await;
        assert_eq!(d.len(), 1);

        let flush = {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.flush().await })
        };
        sleep(Duration::from_millis(20)).await;
        assert!(!flush.is_finished(), "A is still being delivered");

        assert_eq!(d.len(), 1);
        d.try_submit("B").unwrap();
        timeout(Duration::from_millis(200), d.submit("C"))
            .await
            .expect("C must not block while slots are free")
            .unwrap();
        assert_eq!(d.len(), 3);

        gate.open(1);
        timeout(Duration::from_secs(1), flush)
            .await
            .expect("flush resolves once A is delivered")
            .unwrap();

        gate.open(2);
        d.close().await;
        assert_eq!(gate.seen(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_flush_resolves_after_close() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(2))
            .with_handler(rec.clone())
            .build()
            .unwrap();

        d.submit(1).await.unwrap();
        d.close().await;

        timeout(Duration::from_millis(200), d.flush())
            .await
            .expect("flush must not hang on a terminated dispatcher");
        assert_eq!(rec.seen(), vec![1]);
    }

    #[tokio::test]
    async fn test_flush_resolves_when_shutdown_discards_events() {
        let gate = Gate::new();
        let d = Dispatcher::<&'static str>::builder(Config {
            grace: Duration::ZERO,
            ..Config::with_capacity(3)
        })
        .with_handler(gate.clone())
        .build()
        .unwrap();

        d.submit("A").await.unwrap();
        gate.entered.notified().await;
        d.submit("B").await.unwrap();

        let flush = {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.flush().await })
        };
        let shutdown = {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.shutdown().await })
        };
        sleep(Duration::from_millis(20)).await;
        gate.open(1);

        let err = shutdown.await.unwrap().unwrap_err();
        assert!(matches!(err, RuntimeError::Interrupted { dropped: 1, .. }));
        timeout(Duration::from_secs(1), flush)
            .await
            .expect("flush resolves at termination")
            .unwrap();
        assert_eq!(gate.seen(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_shutdown_within_grace_is_ok() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config {
            grace: Duration::from_secs(5),
            ..Config::with_capacity(8)
        })
        .with_handler(rec.clone())
        .build()
        .unwrap();

        for i in 0..8u32 {
            d.submit(i).await.unwrap();
        }
        d.shutdown().await.unwrap();
        assert_eq!(rec.seen().len(), 8);
    }

    #[tokio::test]
    async fn test_shutdown_past_grace_discards_buffered_events() {
        let gate = Gate::new();
        let d = Dispatcher::<&'static str>::builder(Config {
            grace: Duration::from_millis(50),
            ..Config::with_capacity(3)
        })
        .with_handler(gate.clone())
        .build()
        .unwrap();
        let mut diag = d.diagnostics();

        d.submit("A").await.unwrap();
        gate.entered.notified().await;
        d.submit("B").await.unwrap();
        d.submit("C").await.unwrap();

        let opener = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                sleep(Duration::from_millis(150)).await;
                gate.open(3);
            })
        };

        let err = d.shutdown().await.unwrap_err();
        opener.await.unwrap();

        assert_eq!(
            err,
            RuntimeError::Interrupted {
                grace: Duration::from_millis(50),
                dropped: 2
            }
        );
        assert_eq!(gate.seen(), vec!["A"]);
        assert_eq!(d.state(), State::Terminated);

        let interrupted = drain(&mut diag)
            .into_iter()
            .find(|r| r.kind == DiagnosticKind::Interrupted)
            .expect("interrupted record");
        assert_eq!(interrupted.dropped, Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_producers_keep_per_thread_order() {
        let rec = Recorder::<(u32, u32)>::new("rec");
        let d = Dispatcher::<(u32, u32)>::builder(Config::with_capacity(4))
            .with_handler(rec.clone())
            .build()
            .unwrap();

        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let d = Arc::clone(&d);
                std::thread::spawn(move || {
                    for i in 0..100u32 {
                        d.blocking_submit((p, i)).unwrap();
                    }
                })
            })
            .collect();
        tokio::task::spawn_blocking(move || {
            for p in producers {
                p.join().unwrap();
            }
        })
        .await
        .unwrap();
        d.close().await;

        let seen = rec.seen();
        assert_eq!(seen.len(), 400);
        for p in 0..4u32 {
            let mine: Vec<u32> = seen.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
            assert_eq!(mine, (0..100).collect::<Vec<_>>());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_origin_captured_at_submit() {
        let origins = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&origins);
        let d = Dispatcher::<u32>::builder(Config::with_capacity(2))
            .with_handler(HandlerFn::arc("origin", move |ev: &Envelope<u32>| {
                sink.lock().unwrap().push(ev.origin.clone());
                Ok::<_, HandlerError>(())
            }))
            .build()
            .unwrap();

        let producer = {
            let d = Arc::clone(&d);
            std::thread::Builder::new()
                .name("producer-7".into())
                .spawn(move || {
                    let line = line!() + 1;
                    d.blocking_submit(1).unwrap();
                    line
                })
                .unwrap()
        };
        let line = tokio::task::spawn_blocking(move || producer.join().unwrap())
            .await
            .unwrap();
        d.close().await;

        let origins = origins.lock().unwrap();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].thread_name(), Some("producer-7"));
        assert_eq!(origins[0].location.line(), line);
        assert!(origins[0].location.file().ends_with("dispatcher.rs"));
    }

    #[tokio::test]
    async fn test_dropping_last_handle_drains_and_terminates() {
        let rec = Recorder::<u32>::new("rec");
        let d = Dispatcher::<u32>::builder(Config::with_capacity(4))
            .with_handler(rec.clone())
            .build()
            .unwrap();
        let mut diag = d.diagnostics();

        for i in 0..4u32 {
            d.submit(i).await.unwrap();
        }
        drop(d);

        let terminated = timeout(Duration::from_secs(1), async {
            loop {
                match diag.recv().await {
                    Ok(r) if r.kind == DiagnosticKind::Terminated => break r,
                    Ok(_) => continue,
                    Err(e) => panic!("diagnostics closed: {e}"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(terminated.dropped, Some(0));
        assert_eq!(rec.seen(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_detach_all_and_attach_during_closing() {
        let gate = Gate::new();
        let rec = Recorder::<&'static str>::new("rec");
        let d = Dispatcher::<&'static str>::builder(Config::with_capacity(4))
            .with_handler(gate.clone())
            .with_handler(rec.clone())
            .build()
            .unwrap();
        assert_eq!(d.handlers(), vec!["gate", "rec"]);

        d.submit("A").await.unwrap();
        gate.entered.notified().await;
        d.submit("B").await.unwrap();

        let closer = {
            let d = Arc::clone(&d);
            tokio::spawn(async move { d.close().await })
        };
        sleep(Duration::from_millis(20)).await;
        assert_eq!(d.state(), State::Closing);

        let late = Recorder::<&'static str>::new("late");
        assert_eq!(d.detach_all(), 2);
        d.attach(late.clone());

        gate.open(2);
        closer.await.unwrap();

        assert_eq!(gate.seen(), vec!["A"]);
        assert_eq!(rec.seen(), vec!["A"]);
        assert_eq!(late.seen(), vec!["B"]);
    }
}
