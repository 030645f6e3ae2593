//! # Dispatcher configuration.
//!
//! Provides [`Config`] centralized settings for one dispatcher instance.
//!
//! ## Sentinel values
//! - `grace = 0s` → `shutdown()` interrupts immediately (only the in-flight event completes)
//! - `diagnostics_capacity = 0` → clamped to 1

use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::ConfigError;

/// Largest supported buffer capacity (slot permits are counted in `u32`).
pub const MAX_CAPACITY: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// ## Field semantics
/// - `capacity`: Number of buffer slots `N` (`1..=MAX_CAPACITY`; fixed for the dispatcher's lifetime)
/// - `grace`: Maximum drain time for `shutdown()` (`0s` = interrupt immediately)
/// - `diagnostics_capacity`: Diagnostic bus ring buffer size (min 1; clamped)
///
/// ## Notes
/// All fields are public for flexibility. `build()` calls [`Config::validate`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of events that may be outstanding (buffered or being delivered).
    ///
    /// A producer submitting the `capacity + 1`-th outstanding event waits until
    /// the worker has finished delivering one.
    pub capacity: usize,

    /// Maximum time `shutdown()` waits for the final drain before interrupting it.
    ///
    /// `close()` ignores this value and always drains completely.
    pub grace: Duration,

    /// Capacity of the diagnostic broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `diagnostics_capacity` records
    /// receive `Lagged` and skip older items.
    pub diagnostics_capacity: usize,
}

impl Config {
    /// Creates the default configuration with the given buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Checks that the buffer capacity is usable.
    ///
    /// # Example
    /// ```
    /// use eventvisor::{Config, ConfigError};
    ///
    /// assert_eq!(Config::with_capacity(0).validate(), Err(ConfigError::ZeroCapacity));
    /// assert!(Config::with_capacity(1).validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.capacity {
            0 => Err(ConfigError::ZeroCapacity),
            n if n > MAX_CAPACITY => Err(ConfigError::CapacityTooLarge {
                capacity: n,
                max: MAX_CAPACITY,
            }),
            _ => Ok(()),
        }
    }

    /// Returns the diagnostic bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn diagnostics_capacity_clamped(&self) -> usize {
        self.diagnostics_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `capacity = 1024`
    /// - `grace = 60s`
    /// - `diagnostics_capacity = 256`
    fn default() -> Self {
        Self {
            capacity: 1024,
            grace: Duration::from_secs(60),
            diagnostics_capacity: 256,
        }
    }
}
