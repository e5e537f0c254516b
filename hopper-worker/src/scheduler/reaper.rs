//! Stale job reaper
//!
//! A worker that dies mid-job leaves its record in processing forever. The
//! reaper periodically finds jobs claimed longer ago than the stale threshold
//! and fails them with `retry` set, which requeues them while their retry
//! budget lasts.

use std::time::Duration;

use anyhow::Result;
use hopper_core::domain::job::ResultDetails;
use hopper_store::JobStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{pause, run_blocking};
use crate::config::Config;

/// Reason recorded on jobs released by the reaper
pub const STALE_REASON: &str = "stale";

/// Periodic scanner for abandoned jobs
pub struct StaleReaper {
    store: JobStore,
    threshold: Duration,
    interval: Duration,
    max_retries: u32,
}

impl StaleReaper {
    pub fn new(store: JobStore, config: &Config) -> Self {
        Self {
            store,
            threshold: config.stale_threshold,
            interval: config.reap_interval,
            max_retries: config.max_retries,
        }
    }

    /// Scans once and releases every stale job
    ///
    /// Returns how many jobs were requeued or failed.
    pub async fn reap_once(&self) -> Result<usize> {
        let threshold_secs = self.threshold.as_secs();
        let max_retries = self.max_retries;

        run_blocking(&self.store, move |store| {
            let mut released = 0;
            for id in store.stale_scan(threshold_secs)? {
                if store.fail(&id, STALE_REASON, ResultDetails::new(), true, max_retries)? {
                    released += 1;
                } else {
                    debug!("Stale job {} finished before it could be released", id);
                }
            }
            Ok(released)
        })
        .await
    }

    /// Runs the reaper until `shutdown` flips to `true`
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Starting stale job reaper (threshold: {:?}, interval: {:?})",
            self.threshold, self.interval
        );

        loop {
            match self.reap_once().await {
                Ok(0) => {}
                Ok(released) => warn!("Released {} stale job(s)", released),
                Err(e) => error!("Error during stale scan: {:#}", e),
            }

            if pause(self.interval, &mut shutdown).await {
                break;
            }
        }

        info!("Stale job reaper stopped");
        Ok(())
    }
}
