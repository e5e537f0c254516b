//! Store configuration
//!
//! Lock timing knobs. Transitions are cheap, so the defaults favour failing
//! fast over queueing callers behind a stuck lock holder.

use std::time::Duration;

use crate::error::{Result, StoreError};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Longest wait for the global lock before a lifecycle operation gives up
    pub lock_timeout: Duration,

    /// Lock wait used by `stats`; monitoring must never stall
    pub stats_lock_timeout: Duration,

    /// Pause between two lock attempts (random jitter is added on top)
    pub lock_poll_interval: Duration,
}

impl StoreConfig {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_stats_lock_timeout(mut self, timeout: Duration) -> Self {
        self.stats_lock_timeout = timeout;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout.is_zero() {
            return Err(StoreError::InvalidConfig(
                "lock_timeout must be greater than 0".to_string(),
            ));
        }

        if self.stats_lock_timeout.is_zero() {
            return Err(StoreError::InvalidConfig(
                "stats_lock_timeout must be greater than 0".to_string(),
            ));
        }

        if self.lock_poll_interval.is_zero() {
            return Err(StoreError::InvalidConfig(
                "lock_poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.lock_poll_interval > self.lock_timeout {
            return Err(StoreError::InvalidConfig(
                "lock_poll_interval cannot exceed lock_timeout".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            stats_lock_timeout: Duration::from_millis(250),
            lock_poll_interval: Duration::from_millis(10),
        }
    }
}
