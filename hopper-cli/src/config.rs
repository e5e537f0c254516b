//! Configuration module
//!
//! Handles CLI configuration: where the queue lives and how long to wait for
//! its lock.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use hopper_store::{JobStore, StoreConfig};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the partition files
    pub queue_dir: PathBuf,

    /// Longest wait for the queue lock
    pub lock_timeout: Duration,
}

impl Config {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default().with_lock_timeout(self.lock_timeout)
    }

    /// Opens the queue, creating and repairing it as needed
    pub fn open_store(&self) -> Result<JobStore> {
        JobStore::open(self.queue_dir.clone(), self.store_config())
            .with_context(|| format!("Failed to open queue at {}", self.queue_dir.display()))
    }

    /// Opens the queue without repairing it
    ///
    /// Read-only commands use this; the lock is only taken by the operation
    /// they run.
    pub fn open_store_unrepaired(&self) -> Result<JobStore> {
        JobStore::open_without_recovery(self.queue_dir.clone(), self.store_config())
            .with_context(|| format!("Failed to open queue at {}", self.queue_dir.display()))
    }
}
