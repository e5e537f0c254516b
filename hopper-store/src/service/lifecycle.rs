//! Job lifecycle
//!
//! Enqueue, dequeue and the three ways a claimed job leaves Processing.
//!
//! ```text
//! enqueue ──> Queued ──dequeue──> Processing ──complete──> Completed
//!               ^                     │ ├──fail──────────> Failed
//!               └────fail(retry)──────┘ └──flag_for_review> NeedsReview
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hopper_core::domain::job::{JobRecord, JobStatus, ResultDetails};
use hopper_core::domain::partition::Partition;
use hopper_core::dto::job::NewJob;

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::lock::LockCoordinator;
use crate::repository::PartitionStore;
use crate::service::maintenance::collapse_duplicates;
use crate::service::partition_set::PartitionSet;

/// Name of the global lock file inside the queue directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// Durable job queue over a directory of partition files
#[derive(Clone)]
pub struct JobStore {
    pub(crate) repo: PartitionStore,
    pub(crate) lock: LockCoordinator,
    pub(crate) config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore")
            .field("root", &self.repo.root())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobStore {
    /// Open (and if needed initialize) the queue directory at `root`
    ///
    /// Runs crash recovery before returning: missing partitions are
    /// created, leftover write artifacts removed and records duplicated by
    /// an interrupted move collapsed to a single copy.
    pub fn open(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let store = Self::unchecked(root.into(), config)?;
        let report = store.recover()?;
        if !report.is_clean() {
            tracing::warn!("Recovered queue at {}: {}", store.root().display(), report);
        }
        Ok(store)
    }

    /// Open without running recovery
    pub fn open_without_recovery(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        Self::unchecked(root.into(), config)
    }

    fn unchecked(root: PathBuf, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&root).map_err(|e| {
            StoreError::io(format!("creating queue directory {}", root.display()), e)
        })?;

        let lock = LockCoordinator::new(root.join(LOCK_FILE_NAME), config.lock_poll_interval);

        Ok(Self {
            repo: PartitionStore::new(root),
            lock,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run `f` on freshly read partitions under the global lock, then write
    /// back whatever it modified
    pub(crate) fn locked<T>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&mut PartitionSet<'_>) -> Result<T>,
    ) -> Result<T> {
        self.lock.with_lock(timeout, || {
            let mut set = PartitionSet::new(&self.repo);
            let value = f(&mut set)?;
            if set.is_dirty() {
                set.commit()?;
            }
            Ok(value)
        })
    }

    /// Add a job to the tail of the queue
    ///
    /// Returns `false` without changing anything if the id already exists
    /// in any partition.
    pub fn enqueue(&self, job: NewJob) -> Result<bool> {
        let id = job.resolve_id();

        self.locked(self.config.lock_timeout, |set| {
            if let Some((partition, _)) = set.locate(&id)? {
                tracing::warn!("Rejected duplicate job {} (already in {})", id, partition);
                return Ok(false);
            }

            let record = JobRecord::queued(id.clone(), job.payload, self.now());
            set.records(Partition::Queued)?.push(record);
            set.mark_dirty(Partition::Queued);

            tracing::info!("Job {} queued", id);
            Ok(true)
        })
    }

    /// Claim the oldest queued job
    ///
    /// The claimed job moves to Processing with its attempt counter bumped.
    /// Returns `None` when nothing is queued.
    pub fn dequeue(&self) -> Result<Option<JobRecord>> {
        self.locked(self.config.lock_timeout, |set| {
            let index = loop {
                let Some(index) = fifo_head(set.records(Partition::Queued)?) else {
                    return Ok(None);
                };
                let id = set.records(Partition::Queued)?[index].id.clone();
                if !repair_if_duplicated(set, &id, Partition::Queued)? {
                    break index;
                }
            };

            let queued = set.records(Partition::Queued)?;
            let mut record = queued.remove(index);
            record.status = JobStatus::Processing;
            record.attempts = record.attempts.saturating_add(1);
            record.started_at = Some(self.now());
            record.ended_at = None;

            set.records(Partition::Processing)?.push(record.clone());
            set.mark_dirty(Partition::Processing);
            set.mark_dirty(Partition::Queued);

            tracing::info!("Job {} claimed (attempt {})", record.id, record.attempts);
            Ok(Some(record))
        })
    }

    /// Mark a processing job as successfully completed
    ///
    /// Returns `false` if the job is not in Processing, e.g. because it was
    /// already finalized by an earlier call.
    pub fn complete(&self, id: &str, details: ResultDetails) -> Result<bool> {
        let moved = self.leave_processing(id, "complete", |record, now| {
            record.merge_result(details);
            record.ended_at = Some(now);
            JobStatus::Completed
        })?;
        Ok(moved.is_some())
    }

    /// Record a failed attempt
    ///
    /// With `retry` set and `attempts <= max_retries`, the job goes back to
    /// the tail of the queue; otherwise it fails permanently. A job is thus
    /// attempted at most `max_retries + 1` times.
    pub fn fail(
        &self,
        id: &str,
        reason: &str,
        details: ResultDetails,
        retry: bool,
        max_retries: u32,
    ) -> Result<bool> {
        Ok(self
            .fail_with_status(id, reason, details, retry, max_retries)?
            .is_some())
    }

    /// Same as [`fail`](Self::fail), returning the status the job ended up
    /// in (`Queued` or `Failed`), or `None` if it was not processing
    pub fn fail_with_status(
        &self,
        id: &str,
        reason: &str,
        details: ResultDetails,
        retry: bool,
        max_retries: u32,
    ) -> Result<Option<JobStatus>> {
        self.leave_processing(id, "fail", |record, now| {
            record.last_error = Some(reason.to_string());
            record.merge_result(details);

            if retry && record.attempts <= max_retries {
                // Re-enters the back of the line
                record.created_at = now;
                record.started_at = None;
                record.ended_at = None;
                JobStatus::Queued
            } else {
                record.ended_at = Some(now);
                JobStatus::Failed
            }
        })
    }

    /// Park a processing job for a human to look at
    pub fn flag_for_review(&self, id: &str, reason: &str, details: ResultDetails) -> Result<bool> {
        let moved = self.leave_processing(id, "flag_for_review", |record, now| {
            record.last_error = Some(reason.to_string());
            record.merge_result(details);
            record.ended_at = Some(now);
            JobStatus::NeedsReview
        })?;
        Ok(moved.is_some())
    }

    /// Move `id` out of Processing to the status chosen by `apply`
    ///
    /// Returns the new status, or `None` if the job was not processing.
    fn leave_processing(
        &self,
        id: &str,
        operation: &str,
        apply: impl FnOnce(&mut JobRecord, DateTime<Utc>) -> JobStatus,
    ) -> Result<Option<JobStatus>> {
        self.locked(self.config.lock_timeout, |set| {
            repair_if_duplicated(set, id, Partition::Processing)?;

            let processing = set.records(Partition::Processing)?;
            let Some(index) = processing.iter().position(|r| r.id == id) else {
                tracing::warn!("Ignored {} for job {}: not in processing", operation, id);
                return Ok(None);
            };

            let mut record = processing.remove(index);
            let next = apply(&mut record, self.now());
            debug_assert!(JobStatus::Processing.can_transition_to(next));
            record.status = next;

            let attempts = record.attempts;
            set.records(next.partition())?.push(record);
            set.mark_dirty(next.partition());
            set.mark_dirty(Partition::Processing);

            match next {
                JobStatus::Queued => {
                    tracing::info!("Job {} requeued after attempt {}", id, attempts)
                }
                JobStatus::Failed => {
                    tracing::warn!("Job {} failed after {} attempt(s)", id, attempts)
                }
                _ => tracing::info!("Job {} moved to {}", id, next),
            }
            Ok(Some(next))
        })
    }

    /// Look a job up in every partition
    pub fn find(&self, id: &str) -> Result<Option<JobRecord>> {
        self.locked(self.config.lock_timeout, |set| {
            Ok(match set.locate(id)? {
                Some((partition, index)) => Some(set.records(partition)?[index].clone()),
                None => None,
            })
        })
    }

    /// Snapshot of one partition, in stored order
    pub fn list(&self, partition: Partition) -> Result<Vec<JobRecord>> {
        self.locked(self.config.lock_timeout, |set| {
            Ok(set.records(partition)?.clone())
        })
    }
}

/// Collapse duplicates if `id` is also stored outside `partition`
///
/// An interrupted move can leave a record in two partitions, and handles
/// opened before the crash never ran recovery. Returns whether a repair
/// happened.
fn repair_if_duplicated(set: &mut PartitionSet<'_>, id: &str, partition: Partition) -> Result<bool> {
    let mut elsewhere = false;
    for other in Partition::ALL.into_iter().filter(|p| *p != partition) {
        if set.records(other)?.iter().any(|r| r.id == id) {
            elsewhere = true;
            break;
        }
    }
    let repeated = set.records(partition)?.iter().filter(|r| r.id == id).count() > 1;
    if !elsewhere && !repeated {
        return Ok(false);
    }

    let repaired = collapse_duplicates(set)?;
    tracing::warn!(
        "Job {} was stored in more than one place; collapsed {} duplicated job(s)",
        id,
        repaired.len()
    );
    Ok(true)
}

/// Index of the record to dequeue: smallest `created_at`, earliest position
/// on ties
fn fifo_head(records: &[JobRecord]) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .min_by_key(|(index, record)| (record.created_at, *index))
        .map(|(index, _)| index)
}
