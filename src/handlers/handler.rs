//! # Event handler trait.
//!
//! Provides [`Handler`], the single capability the dispatcher consumes from its
//! environment: something that can `consume` an event and may fail.
//!
//! ## Architecture
//! ```text
//! DispatchWorker ──► registry.snapshot() ──► handler[0].consume(&env)
//!                                        ──► handler[1].consume(&env)
//!                                        ──► ...            (strictly sequential)
//!                                     error / panic → warn!/error! + Diagnostic
//! ```
//!
//! ## Rules
//! - Handlers are invoked **one at a time**, in attach order, for every event.
//! - A slow handler throttles the whole pipeline: the worker waits for it, the
//!   buffer fills up and producers block in `submit`.
//! - A failing or panicking handler does not stop delivery to the next handler.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use eventvisor::{Envelope, Handler, HandlerError};
//!
//! struct Stdout;
//!
//! #[async_trait]
//! impl Handler<String> for Stdout {
//!     async fn consume(&self, ev: &Envelope<String>) -> Result<(), HandlerError> {
//!         println!("[{}] {}", ev.seq, ev.payload);
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str { "stdout" }
//! }
//! ```

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::Envelope;

/// Consumer of dispatched events.
///
/// ### Implementation requirements
/// - Return errors instead of panicking; panics are caught but reported as such.
/// - Do not call `Dispatcher::flush` or `Dispatcher::close` from inside `consume`:
///   both wait for the worker that is running the handler.
#[async_trait]
pub trait Handler<E>: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the dispatch worker, never in the producer context.
    async fn consume(&self, event: &Envelope<E>) -> Result<(), HandlerError>;

    /// Returns the handler name used in logs and diagnostics.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
