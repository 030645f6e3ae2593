//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a synchronous closure `F: Fn(&Envelope<E>) -> Result<(), HandlerError>`.
//! Shared state lives in whatever the closure captures (`Arc<Mutex<..>>`, channels, ...).
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use eventvisor::{Envelope, HandlerError, HandlerFn};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let h = HandlerFn::arc("collect", move |ev: &Envelope<u32>| {
//!     sink.lock().unwrap().push(ev.payload);
//!     Ok::<_, HandlerError>(())
//! });
//! # let _ = h;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::Envelope;
use crate::handlers::Handler;

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: &'static str,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately attach it.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: &'static str, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<E, F> Handler<E> for HandlerFn<F>
where
    E: Send + Sync + 'static,
    F: Fn(&Envelope<E>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    async fn consume(&self, event: &Envelope<E>) -> Result<(), HandlerError> {
        (self.f)(event)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
