//! # LogWriter: event tracer
//!
//! A minimal handler that writes every dispatched [`Envelope`] to `tracing` at `INFO`.
//! Use it for tests, demos, or as a tap while debugging a pipeline.
//!
//! ## Example output
//! ```text
//! INFO eventvisor: dispatched seq=0 thread="producer-1" at=src/main.rs:14:7 payload=Login { user: 7 }
//! INFO eventvisor: dispatched seq=1 thread="producer-2" at=src/main.rs:21:7 payload=Logout { user: 7 }
//! ```

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::info;

use crate::error::HandlerError;
use crate::events::Envelope;
use crate::handlers::Handler;

/// Tracing handler.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<E> Handler<E> for LogWriter
where
    E: Debug + Send + Sync + 'static,
{
    async fn consume(&self, ev: &Envelope<E>) -> Result<(), HandlerError> {
        info!(
            target: "eventvisor",
            seq = ev.seq,
            thread = ev.origin.thread_name().unwrap_or("<unnamed>"),
            at = %ev.origin.location,
            payload = ?ev.payload,
            "dispatched"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
