//! # Dispatcher lifecycle.
//!
//! ```text
//! Created ──(worker starts)──► Running ──(close/shutdown)──► Closing ──(worker exits)──► Terminated
//!    └────────────(close before the worker is first polled)────┘
//! ```
//!
//! The state lives in a [`tokio::sync::watch`] channel so any number of
//! `close()` callers can wait for `Terminated` without polling.

use tokio::sync::watch;

/// Lifecycle state of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Constructed; the worker task has been spawned but has not run yet.
    Created,
    /// Worker is draining the buffer and delivering events.
    Running,
    /// Close requested; no new events are admitted, the worker drains what is buffered.
    Closing,
    /// Worker exited. No handler will be invoked again; the dispatcher is not reusable.
    Terminated,
}

impl State {
    /// Returns `true` while `submit` may still admit events.
    #[inline]
    pub fn is_accepting(self) -> bool {
        matches!(self, State::Created | State::Running)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            State::Created => "created",
            State::Running => "running",
            State::Closing => "closing",
            State::Terminated => "terminated",
        }
    }
}

/// Shared, observable lifecycle cell.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    tx: watch::Sender<State>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(State::Created);
        Self { tx }
    }

    #[inline]
    pub(crate) fn current(&self) -> State {
        *self.tx.borrow()
    }

    /// `Created → Running`. Returns `false` if a close already happened.
    pub(crate) fn mark_running(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == State::Created {
                *s = State::Running;
                true
            } else {
                false
            }
        })
    }

    /// `Created | Running → Closing`. Returns `true` only for the caller that made the transition.
    pub(crate) fn begin_close(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if s.is_accepting() {
                *s = State::Closing;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn mark_terminated(&self) {
        self.tx.send_replace(State::Terminated);
    }

    /// Resolves once the state is `Terminated`.
    pub(crate) async fn terminated(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|s| *s == State::Terminated).await;
    }
}
