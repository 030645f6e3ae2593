//! # eventvisor
//!
//! **Eventvisor** is an asynchronous, bounded-buffer event dispatcher for Rust.
//!
//! Many producers submit events; a single background worker delivers each event,
//! in submission order, to every attached handler. The buffer is bounded, so fast
//! producers are slowed down to the speed of the handlers instead of growing memory.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  producer 1  │   │  producer 2  │   │  producer 3  │
//!     │  submit(e)   │   │ try_submit(e)│   │blocking_sub..│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher (facade)                                              │
//! │  - Envelope::capture (seq, timestamp, thread, call site)          │
//! │  - BoundedBuffer (N slots, fair FIFO, waits while full)           │
//! │  - HandlerRegistry (copy-on-write handler list)                   │
//! │  - Lifecycle (Created → Running → Closing → Terminated)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │     DispatchWorker     │
//!                       │   (one tokio task)     │
//!                       └───────────┬────────────┘
//!                                   │ registry snapshot per event
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     h1.consume h2.consume hN.consume
//!                         │         │         │
//!                         └── failures/panics ──► Bus (broadcast Diagnostic)
//! ```
//!
//! ### Lifecycle
//! ```text
//! submit(e) ──► capture ──► buffer slot ──► worker ──► h1 … hN ──► slot released
//!
//! close():
//!   ├─► Running → Closing (first caller only)
//!   ├─► reject new and blocked submits with ClosedError
//!   ├─► worker finishes the in-flight fan-out
//!   ├─► worker drains every buffered event
//!   └─► Terminated; every close() caller returns
//!
//! shutdown():
//!   └─► close(), but after Config::grace the worker discards what is left
//!       and RuntimeError::Interrupted reports how many events were dropped
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                       |
//! |-------------------|--------------------------------------------------------------|------------------------------------------|
//! | **Dispatch**      | Submit events, close with full drain, bounded shutdown.      | [`Dispatcher`], [`DispatcherBuilder`]    |
//! | **Handlers**      | React to events; attach and detach at any time.              | [`Handler`], [`HandlerFn`], [`HandlerId`]|
//! | **Events**        | Payload plus the context captured at submission.             | [`Envelope`], [`Origin`]                 |
//! | **Diagnostics**   | Handler failures and lifecycle milestones.                   | [`Diagnostic`], [`DiagnosticKind`]       |
//! | **Errors**        | Typed errors for configuration, submission and shutdown.     | [`ConfigError`], [`ClosedError`], [`RuntimeError`] |
//! | **Configuration** | Buffer capacity, shutdown grace, diagnostics ring size.      | [`Config`]                               |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` handler that traces every event.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{Config, Dispatcher, Envelope, Handler, HandlerError, HandlerFn};
//!
//! #[derive(Debug)]
//! enum Event {
//!     Login { user: u32 },
//!     Logout { user: u32 },
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build handlers
//!     #[cfg(feature = "logging")]
//!     let handlers: Vec<Arc<dyn Handler<Event>>> = vec![Arc::new(eventvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let handlers: Vec<Arc<dyn Handler<Event>>> = Vec::new();
//!
//!     let dispatcher = Dispatcher::builder(Config::with_capacity(128))
//!         .with_handlers(handlers)
//!         .build()?;
//!
//!     // Handlers can be attached after construction too
//!     let audit = dispatcher.attach(HandlerFn::arc("audit", |ev: &Envelope<Event>| {
//!         println!("#{} from {}: {:?}", ev.seq, ev.origin.location, ev.payload);
//!         Ok::<_, HandlerError>(())
//!     }));
//!
//!     dispatcher.submit(Event::Login { user: 7 }).await?;
//!     dispatcher.submit(Event::Logout { user: 7 }).await?;
//!
//!     // Both events are delivered before close() returns
//!     dispatcher.close().await;
//!     assert!(dispatcher.detach(audit));
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod handlers;

// ---- Public re-exports ----

pub use core::{Config, Dispatcher, DispatcherBuilder, MAX_CAPACITY, State};
pub use error::{ClosedError, ConfigError, HandlerError, RuntimeError, TrySubmitError};
pub use events::{Diagnostic, DiagnosticKind, Envelope, Origin};
pub use handlers::{Handler, HandlerFn, HandlerId};

// Optional: expose a simple built-in tracing handler.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use handlers::LogWriter;
