//! # Event handlers.
//!
//! This module provides the [`Handler`] trait, the registry the worker fans out
//! over, and built-in implementations.
//!
//! ## Architecture
//! ```text
//! Dispatcher::attach(h) ──► HandlerRegistry (ArcSwap<Vec>, attach order)
//!                                   │ snapshot() per event
//!                                   ▼
//! DispatchWorker ──► h1.consume(&env) ──► h2.consume(&env) ──► ... ──► hN.consume(&env)
//! ```
//!
//! ## Handler types
//! - **Function handlers** - [`HandlerFn`] wraps a closure
//! - **Built-in** - `LogWriter` traces every event (`logging` feature)
//! - **Custom** - implement [`Handler`] with `#[async_trait]`

mod handler;
mod handler_fn;
#[cfg(any(feature = "logging", test))]
mod log;
mod registry;

pub use handler::Handler;
pub use handler_fn::HandlerFn;
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use registry::HandlerId;
pub(crate) use registry::{Entry, HandlerRegistry};
