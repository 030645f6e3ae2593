use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    buffer, config::Config, dispatcher::Dispatcher, dispatcher::Shared, state::Lifecycle,
    worker::DispatchWorker,
};
use crate::{error::ConfigError, events::Bus, handlers::Handler, handlers::HandlerRegistry};

/// Builder for constructing a [`Dispatcher`] with an initial set of handlers.
pub struct DispatcherBuilder<E> {
    cfg: Config,
    handlers: Vec<Arc<dyn Handler<E>>>,
}

impl<E: Send + Sync + 'static> DispatcherBuilder<E> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            handlers: Vec::new(),
        }
    }

    /// Adds one handler. Handlers receive events in the order they were added.
    pub fn with_handler(mut self, handler: Arc<dyn Handler<E>>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Adds several handlers, after any added earlier.
    pub fn with_handlers(mut self, handlers: impl IntoIterator<Item = Arc<dyn Handler<E>>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Builds the dispatcher and spawns its worker on the current tokio runtime.
    ///
    /// Initial handlers are attached before the worker starts, so they see every event.
    ///
    /// ### Errors
    /// [`ConfigError`] if `cfg.capacity` is `0` or above [`MAX_CAPACITY`](crate::MAX_CAPACITY).
    ///
    /// ### Panics
    /// If called outside a tokio runtime.
    pub fn build(self) -> Result<Arc<Dispatcher<E>>, ConfigError> {
        self.cfg.validate()?;

        let (writer, reader) = buffer::bounded(self.cfg.capacity)?;
        let registry = HandlerRegistry::new();
        for handler in self.handlers {
            registry.attach(handler);
        }

        let shared = Arc::new(Shared {
            registry,
            bus: Bus::new(self.cfg.diagnostics_capacity_clamped()),
            lifecycle: Lifecycle::new(),
            delivered: watch::channel(0).0,
            dropped: AtomicU64::new(0),
        });
        let closing = CancellationToken::new();
        let interrupt = CancellationToken::new();

        let worker = DispatchWorker::new(
            Arc::clone(&shared),
            reader,
            closing.clone(),
            interrupt.clone(),
        );
        debug!(
            capacity = self.cfg.capacity,
            handlers = shared.registry.len(),
            "spawning dispatch worker"
        );
        tokio::spawn(worker.run());

        Ok(Arc::new(Dispatcher::from_parts(
            self.cfg, shared, writer, closing, interrupt,
        )))
    }
}
