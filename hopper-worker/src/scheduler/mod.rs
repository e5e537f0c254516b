//! Scheduler layer for the worker
//!
//! This layer drives the queue: the poller claims jobs and reports their
//! outcomes, the reaper returns abandoned jobs to the queue.
//!
//! Store operations block on the file lock, so they run on tokio's blocking
//! pool rather than on the async executor.

pub mod poller;
pub mod reaper;

use anyhow::{Context, Result};
use hopper_store::JobStore;

pub use poller::{CycleReport, JobPoller};
pub use reaper::StaleReaper;

/// Runs a store operation on the blocking pool
pub(crate) async fn run_blocking<T, F>(store: &JobStore, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&JobStore) -> hopper_store::Result<T> + Send + 'static,
{
    let store = store.clone();
    let value = tokio::task::spawn_blocking(move || op(&store))
        .await
        .context("Store task panicked")??;
    Ok(value)
}

/// Sleeps for `duration` unless shutdown is requested first
///
/// Returns `true` when the caller should stop.
pub(crate) async fn pause(
    duration: std::time::Duration,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        changed = shutdown.changed() => {
            if changed.is_err() {
                return true;
            }
        }
    }

    *shutdown.borrow()
}
