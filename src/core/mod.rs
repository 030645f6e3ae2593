//! Runtime core: buffering, delivery and lifecycle.
//!
//! The only public API from this module is [`Dispatcher`] (with its builder,
//! [`Config`] and [`State`]).
//!
//! Internal modules:
//! - [`buffer`]: bounded FIFO of pending events with slot-based backpressure;
//! - [`worker`]: the single task that drains the buffer and fans events out;
//! - [`state`]: lifecycle cell shared by the facade and the worker;
//! - [`dispatcher`]: producer-facing facade (submit, attach/detach, close).

mod buffer;
mod builder;
mod config;
mod dispatcher;
mod state;
mod worker;

pub use builder::DispatcherBuilder;
pub use config::{Config, MAX_CAPACITY};
pub use dispatcher::Dispatcher;
pub use state::State;
