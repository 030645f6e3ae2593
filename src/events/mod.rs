//! Events flowing through the dispatcher.
//!
//! - [`Envelope`]: a submitted event with its eagerly captured [`Origin`].
//! - [`Diagnostic`] / [`DiagnosticKind`]: records about handler failures and lifecycle.
//! - [`Bus`]: broadcast channel carrying diagnostics.

mod bus;
mod diagnostic;
mod envelope;

pub use bus::Bus;
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use envelope::{Envelope, Origin};
