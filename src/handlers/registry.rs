//! # Ordered, copy-on-write handler registry.
//!
//! [`HandlerRegistry`] stores attached handlers in attach order behind an
//! [`ArcSwap`]. Readers (the worker) take a [`Snapshot`] with a single atomic load;
//! writers (`attach` / `detach`) build a new vector and swap it in.
//!
//! ## Architecture
//! ```text
//! attach(h) ─┐                     ┌─► snapshot() ─► [h1, h2, h3]  (event N)
//! detach(id) ┼─► rcu(copy+modify) ─┤
//! detach_all ┘     ArcSwap<Vec>    └─► snapshot() ─► [h1, h3]      (event N+1)
//! ```
//!
//! ## Rules
//! - **Snapshot-at-dispatch-start**: a fan-out iterates the vector it loaded when it
//!   began. A handler detached mid fan-out still receives that event; a handler
//!   attached mid fan-out first sees the next event.
//! - **No lock during fan-out**: handler invocations never hold registry state.
//! - **Order**: delivery order equals attach order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::handlers::Handler;

/// Opaque identifier returned by `attach`, used to `detach` the same handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// One attached handler.
pub(crate) struct Entry<E> {
    pub(crate) id: HandlerId,
    pub(crate) handler: Arc<dyn Handler<E>>,
}

impl<E: 'static> Entry<E> {
    #[inline]
    pub(crate) fn name(&self) -> &'static str {
        self.handler.name()
    }
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Immutable, ordered view of the registry used for one fan-out.
pub(crate) type Snapshot<E> = Arc<Vec<Entry<E>>>;

/// Thread-safe ordered set of handlers.
pub(crate) struct HandlerRegistry<E> {
    entries: ArcSwap<Vec<Entry<E>>>,
    next_id: AtomicU64,
}

impl<E: 'static> HandlerRegistry<E> {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Appends a handler; it receives every event whose fan-out starts after this call.
    pub(crate) fn attach(&self, handler: Arc<dyn Handler<E>>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Entry { id, handler };

        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });
        id
    }

    /// Removes the handler with the given id, returning it if it was attached.
    pub(crate) fn detach(&self, id: HandlerId) -> Option<Arc<dyn Handler<E>>> {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|e| e.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });

        previous
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.handler))
    }

    /// Removes every handler, returning them in attach order.
    pub(crate) fn detach_all(&self) -> Vec<Arc<dyn Handler<E>>> {
        let previous = self.entries.swap(Arc::new(Vec::new()));
        previous.iter().map(|e| Arc::clone(&e.handler)).collect()
    }

    /// Returns the current ordered view.
    #[inline]
    pub(crate) fn snapshot(&self) -> Snapshot<E> {
        self.entries.load_full()
    }

    /// Returns the names of attached handlers in delivery order.
    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.entries.load().iter().map(Entry::name).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }
}
