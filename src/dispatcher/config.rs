// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dispatcher configuration.

use crate::error::Error;
use crate::event::DEFAULT_LIFECYCLE_CAPACITY;
use crate::pool::DEFAULT_MAX_WORKERS;

/// Configuration for an [`EventDispatcher`](crate::EventDispatcher).
///
/// # Examples
///
/// ```
/// use evdispatch::DispatcherConfig;
///
/// let config = DispatcherConfig::builder().max_workers(4).build()?;
/// assert_eq!(config.max_workers(), 4);
/// # Ok::<(), evdispatch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    max_workers: usize,
    lifecycle_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            lifecycle_capacity: DEFAULT_LIFECYCLE_CAPACITY,
        }
    }
}

impl DispatcherConfig {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    /// Total worker slots, the poller's included.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of lifecycle notifications buffered per subscriber.
    #[must_use]
    pub fn lifecycle_capacity(&self) -> usize {
        self.lifecycle_capacity
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Default)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    /// Sets the worker pool size (default: 15).
    ///
    /// The poller holds one slot for as long as the dispatcher runs, so at
    /// most `max_workers - 1` handlers execute concurrently.
    #[must_use]
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    /// Sets the lifecycle channel capacity (default: 64).
    #[must_use]
    pub fn lifecycle_capacity(mut self, capacity: usize) -> Self {
        self.config.lifecycle_capacity = capacity;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - `max_workers` is below 2 (the poller alone needs one slot)
    /// - `lifecycle_capacity` is zero
    pub fn build(self) -> Result<DispatcherConfig, Error> {
        if self.config.max_workers < 2 {
            return Err(Error::InvalidConfig(format!(
                "max_workers must be at least 2, got {}",
                self.config.max_workers
            )));
        }
        if self.config.lifecycle_capacity == 0 {
            return Err(Error::InvalidConfig(
                "lifecycle_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_workers(), 15);
        assert_eq!(config.lifecycle_capacity(), 64);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = DispatcherConfig::builder()
            .max_workers(3)
            .lifecycle_capacity(8)
            .build()
            .unwrap();
        assert_eq!(config.max_workers(), 3);
        assert_eq!(config.lifecycle_capacity(), 8);
    }

    #[test]
    fn single_worker_is_rejected() {
        let err = DispatcherConfig::builder().max_workers(1).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("max_workers")));
    }

    #[test]
    fn zero_lifecycle_capacity_is_rejected() {
        let err = DispatcherConfig::builder()
            .lifecycle_capacity(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
