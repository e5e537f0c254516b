//! Job poller
//!
//! Claims queued jobs one at a time, runs them through the handler and
//! reports each outcome back to the store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hopper_core::domain::job::JobRecord;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{pause, run_blocking};
use crate::config::Config;
use crate::service::{HandlerContext, JobHandler, Outcome};
use hopper_store::JobStore;

/// Attempts made to report an outcome before giving up on it
const REPORT_ATTEMPTS: u32 = 3;

/// Initial delay between report attempts
const REPORT_RETRY_DELAY_MS: u64 = 500;

/// What a single poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// The queue was empty
    Idle,

    /// A job was claimed and handled
    Processed {
        job_id: String,
        outcome: &'static str,
        /// Whether the store accepted the outcome; `false` means the job had
        /// already left processing, for instance because the reaper requeued
        /// it
        recorded: bool,
    },
}

/// Job poller that continuously claims and handles jobs
pub struct JobPoller {
    config: Config,
    store: JobStore,
    handler: Arc<dyn JobHandler>,
    context: HandlerContext,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(
        config: Config,
        store: JobStore,
        handler: Arc<dyn JobHandler>,
        context: HandlerContext,
    ) -> Self {
        Self {
            config,
            store,
            handler,
            context,
        }
    }

    /// Runs the polling loop until `shutdown` flips to `true`
    ///
    /// A job already claimed is always handled and reported before the loop
    /// checks for shutdown.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Starting job poller (worker: {}, poll interval: {:?})",
            self.context.worker_id, self.config.poll_interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.run_once().await {
                Ok(CycleReport::Idle) => {
                    debug!("No jobs in queue, waiting {:?}", self.config.poll_interval);
                    self.config.poll_interval
                }
                Ok(CycleReport::Processed { .. }) => self.config.cooldown,
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                    self.config.error_backoff
                }
            };

            if pause(delay, &mut shutdown).await {
                break;
            }
        }

        info!("Job poller stopped");
        Ok(())
    }

    /// Performs a single poll cycle
    pub async fn run_once(&self) -> Result<CycleReport> {
        let Some(job) = run_blocking(&self.store, |store| store.dequeue()).await? else {
            return Ok(CycleReport::Idle);
        };

        info!("Processing job {} (attempt {})", job.id, job.attempts);

        let outcome = self.handler.handle(&job, &self.context).await;
        let label = outcome.label();
        self.log_outcome(&job, &outcome);

        let recorded = self.report_with_retry(&job, outcome).await?;
        if !recorded {
            warn!(
                "Job {} was no longer processing when its outcome ({}) was reported",
                job.id, label
            );
        }

        Ok(CycleReport::Processed {
            job_id: job.id,
            outcome: label,
            recorded,
        })
    }

    fn log_outcome(&self, job: &JobRecord, outcome: &Outcome) {
        match outcome {
            Outcome::Submitted(_) => info!("Job {} completed successfully", job.id),
            Outcome::NeedsReview { reason, .. } => {
                warn!("Job {} needs manual review: {}", job.id, reason)
            }
            Outcome::Failed {
                reason,
                retryable: true,
                ..
            } if job.attempts <= self.config.max_retries => warn!(
                "Job {} failed, will retry (attempt {}): {}",
                job.id, job.attempts, reason
            ),
            Outcome::Failed { reason, .. } => error!(
                "Job {} failed after {} attempt(s): {}",
                job.id, job.attempts, reason
            ),
        }
    }

    /// Reports an outcome, retrying transient store errors
    ///
    /// Giving up leaves the job in processing, where the reaper eventually
    /// finds it.
    async fn report_with_retry(&self, job: &JobRecord, outcome: Outcome) -> Result<bool> {
        let mut attempt = 0;
        let mut delay_ms = REPORT_RETRY_DELAY_MS;

        loop {
            attempt += 1;

            match self.report(&job.id, outcome.clone()).await {
                Ok(recorded) => return Ok(recorded),
                Err(e) if attempt < REPORT_ATTEMPTS && is_retryable(&e) => {
                    warn!(
                        "Failed to report job {} (attempt {}/{}): {:#}",
                        job.id, attempt, REPORT_ATTEMPTS, e
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
                Err(e) => return Err(e.context(format!("Failed to report job {}", job.id))),
            }
        }
    }

    async fn report(&self, id: &str, outcome: Outcome) -> Result<bool> {
        let id = id.to_string();
        let max_retries = self.config.max_retries;

        run_blocking(&self.store, move |store| match outcome {
            Outcome::Submitted(details) => store.complete(&id, details),
            Outcome::NeedsReview { reason, details } => {
                store.flag_for_review(&id, &reason, details)
            }
            Outcome::Failed {
                reason,
                details,
                retryable,
            } => store.fail(&id, &reason, details, retryable, max_retries),
        })
        .await
    }
}

fn is_retryable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<hopper_store::StoreError>()
        .is_some_and(|e| e.is_retryable())
}
