//! Maintenance operations
//!
//! Read-only monitoring (stale scan, stats) and the crash recovery run when
//! a store is opened.

use std::collections::{BTreeMap, HashMap};

use chrono::TimeDelta;
use hopper_core::domain::partition::Partition;
use hopper_core::dto::stats::{QueueStats, UNKNOWN_COUNT};

use crate::error::Result;
use crate::service::lifecycle::JobStore;
use crate::service::partition_set::PartitionSet;

/// What recovery had to fix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Temp files of writes interrupted before their rename
    pub temp_artifacts_removed: usize,
    /// Ids found in more than one partition, collapsed to one copy
    pub duplicates_removed: Vec<String>,
    /// Records whose status did not match their partition
    pub statuses_fixed: Vec<String>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.temp_artifacts_removed == 0
            && self.duplicates_removed.is_empty()
            && self.statuses_fixed.is_empty()
    }
}

impl std::fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} temp artifact(s) removed, {} duplicate(s) collapsed, {} status(es) fixed",
            self.temp_artifacts_removed,
            self.duplicates_removed.len(),
            self.statuses_fixed.len()
        )
    }
}

impl JobStore {
    /// Ids of processing jobs claimed more than `threshold_secs` ago
    ///
    /// Changes nothing; the caller decides what to do with stale jobs
    /// (usually `fail(id, "stale", .., retry = true, ..)`).
    pub fn stale_scan(&self, threshold_secs: u64) -> Result<Vec<String>> {
        let threshold = i64::try_from(threshold_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);

        self.locked(self.config.lock_timeout, |set| {
            let now = self.now();
            let stale: Vec<String> = set
                .records(Partition::Processing)?
                .iter()
                .filter(|record| match record.started_at {
                    Some(started) => now - started > threshold,
                    // Claimed without a start time; only a hand-edited file
                    // gets here, and nothing else would ever release it
                    None => true,
                })
                .map(|record| record.id.clone())
                .collect();

            if !stale.is_empty() {
                tracing::warn!(
                    "Found {} stale job(s) processing for more than {}s",
                    stale.len(),
                    threshold_secs
                );
            }
            Ok(stale)
        })
    }

    /// Per-partition record counts, best effort
    ///
    /// Waits at most `stats_lock_timeout` for the lock. A partition that
    /// cannot be counted (lock timeout, unreadable or corrupted file) is
    /// reported as `-1`.
    pub fn stats(&self) -> QueueStats {
        let counted = self.lock.with_lock(self.config.stats_lock_timeout, || {
            let mut stats = QueueStats::default();
            for partition in Partition::ALL {
                let count = match self.repo.load_partition(partition) {
                    Ok(records) => i64::try_from(records.len()).unwrap_or(i64::MAX),
                    Err(e) => {
                        tracing::warn!("Cannot count partition {}: {}", partition, e);
                        UNKNOWN_COUNT
                    }
                };
                stats.set(partition, count);
            }
            Ok(stats)
        });

        match counted {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Queue stats unavailable: {}", e);
                QueueStats::unknown()
            }
        }
    }

    /// Bring the queue directory back to a consistent state
    ///
    /// Creates missing partitions, removes leftover temp files and repairs
    /// the two states an interrupted move can leave behind: a record present
    /// in two partitions, or a status that disagrees with its partition.
    pub fn recover(&self) -> Result<RecoveryReport> {
        self.lock.with_lock(self.config.lock_timeout, || {
            self.repo.ensure_layout()?;
            let temp_artifacts_removed = self.repo.sweep_temp_artifacts()?;

            let mut set = PartitionSet::new(&self.repo);
            let duplicates_removed = collapse_duplicates(&mut set)?;
            let statuses_fixed = fix_statuses(&mut set)?;
            set.commit()?;

            Ok(RecoveryReport {
                temp_artifacts_removed,
                duplicates_removed,
                statuses_fixed,
            })
        })
    }
}

/// Keep one copy of every id found more than once
pub(crate) fn collapse_duplicates(set: &mut PartitionSet<'_>) -> Result<Vec<String>> {
    let mut copies: HashMap<String, Vec<(Partition, usize, u32)>> = HashMap::new();
    for partition in Partition::ALL {
        for (index, record) in set.records(partition)?.iter().enumerate() {
            copies
                .entry(record.id.clone())
                .or_default()
                .push((partition, index, record.attempts));
        }
    }

    let mut doomed: BTreeMap<Partition, Vec<usize>> = BTreeMap::new();
    let mut repaired = Vec::new();
    for (id, found) in copies.into_iter().filter(|(_, found)| found.len() > 1) {
        let keep = choose_survivor(&found);
        for (position, (partition, index, _)) in found.iter().enumerate() {
            if position != keep {
                doomed.entry(*partition).or_default().push(*index);
            }
        }
        tracing::warn!(
            "Job {} was present in {} partitions; kept the copy in {}",
            id,
            found.len(),
            found[keep].0
        );
        repaired.push(id);
    }

    for (partition, mut indices) in doomed {
        indices.sort_unstable_by(|a, b| b.cmp(a));
        let records = set.records(partition)?;
        for index in indices {
            records.remove(index);
        }
        set.mark_dirty(partition);
    }

    repaired.sort();
    Ok(repaired)
}

/// Pick which copy of a duplicated record to keep
///
/// Moves write the destination before the source, so the destination copy
/// is the one to keep. A terminal partition is always a destination. For a
/// Queued/Processing pair, a claim bumps `attempts` and a retry does not,
/// which tells the two moves apart.
fn choose_survivor(copies: &[(Partition, usize, u32)]) -> usize {
    if let Some(terminal) = copies.iter().position(|(p, _, _)| p.is_terminal()) {
        return terminal;
    }

    let processing = copies.iter().position(|(p, _, _)| *p == Partition::Processing);
    let queued = copies.iter().position(|(p, _, _)| *p == Partition::Queued);
    match (processing, queued) {
        (Some(p), Some(q)) => {
            if copies[p].2 > copies[q].2 {
                p
            } else {
                q
            }
        }
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => 0,
    }
}

/// Rewrite any status that disagrees with the partition holding the record
fn fix_statuses(set: &mut PartitionSet<'_>) -> Result<Vec<String>> {
    let mut fixed = Vec::new();
    for partition in Partition::ALL {
        let expected = partition.status();
        let mut touched = false;
        for record in set.records(partition)?.iter_mut() {
            if record.status != expected {
                tracing::warn!(
                    "Job {} had status {} inside partition {}; corrected",
                    record.id,
                    record.status,
                    partition
                );
                record.status = expected;
                fixed.push(record.id.clone());
                touched = true;
            }
        }
        if touched {
            set.mark_dirty(partition);
        }
    }
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StoreConfig;
    use chrono::Utc;
    use hopper_core::domain::job::{JobRecord, JobStatus, ResultDetails};
    use hopper_core::dto::job::NewJob;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn open(dir: &tempfile::TempDir) -> (JobStore, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let store = JobStore::open(dir.path(), StoreConfig::default())
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (store, clock)
    }

    #[test]
    fn test_stale_scan_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = open(&dir);
        store.enqueue(NewJob::with_id("A", json!({}))).unwrap();
        store.dequeue().unwrap();

        clock.advance(chrono::Duration::seconds(30));
        assert!(store.stale_scan(60).unwrap().is_empty());

        clock.advance(chrono::Duration::seconds(31));
        assert_eq!(store.stale_scan(60).unwrap(), vec!["A".to_string()]);

        let job = store.find("A").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn test_stale_scan_exact_threshold_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = open(&dir);
        store.enqueue(NewJob::with_id("A", json!({}))).unwrap();
        store.dequeue().unwrap();

        clock.advance(chrono::Duration::seconds(60));
        assert!(store.stale_scan(60).unwrap().is_empty());
        assert!(store.stale_scan(u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_stats_counts_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        for id in ["A", "B", "C"] {
            store.enqueue(NewJob::with_id(id, json!({}))).unwrap();
        }
        store.dequeue().unwrap();
        store.dequeue().unwrap();
        store.complete("A", ResultDetails::new()).unwrap();

        let stats = store.stats();
        assert_eq!(stats.get(Partition::Queued), 1);
        assert_eq!(stats.get(Partition::Processing), 1);
        assert_eq!(stats.get(Partition::Completed), 1);
        assert_eq!(stats.get(Partition::Failed), 0);
        assert_eq!(stats.get(Partition::Review), 0);
    }

    #[test]
    fn test_stats_unknown_while_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().with_stats_lock_timeout(Duration::from_millis(20));
        let store = JobStore::open(dir.path(), config).unwrap();
        let _held = store.lock.acquire(Duration::from_secs(1)).unwrap();

        assert_eq!(store.stats(), QueueStats::unknown());
    }

    #[test]
    fn test_stats_unknown_for_corrupt_partition() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        std::fs::write(store.repo.path(Partition::Failed), b"{oops").unwrap();

        let stats = store.stats();
        assert_eq!(stats.get(Partition::Failed), UNKNOWN_COUNT);
        assert_eq!(stats.get(Partition::Queued), 0);
    }

    fn record(id: &str, status: JobStatus, attempts: u32) -> JobRecord {
        let mut record = JobRecord::queued(id.to_string(), json!({}), Utc::now());
        record.status = status;
        record.attempts = attempts;
        record
    }

    #[test]
    fn test_recover_keeps_claimed_copy_after_interrupted_dequeue() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store
            .repo
            .write_partition(Partition::Queued, &[record("A", JobStatus::Queued, 0)])
            .unwrap();
        store
            .repo
            .write_partition(Partition::Processing, &[record("A", JobStatus::Processing, 1)])
            .unwrap();

        let report = store.recover().unwrap();

        assert_eq!(report.duplicates_removed, vec!["A".to_string()]);
        assert!(store.list(Partition::Queued).unwrap().is_empty());
        assert_eq!(store.list(Partition::Processing).unwrap().len(), 1);
    }

    #[test]
    fn test_recover_keeps_requeued_copy_after_interrupted_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store
            .repo
            .write_partition(Partition::Queued, &[record("A", JobStatus::Queued, 1)])
            .unwrap();
        store
            .repo
            .write_partition(Partition::Processing, &[record("A", JobStatus::Processing, 1)])
            .unwrap();

        store.recover().unwrap();

        assert_eq!(store.list(Partition::Queued).unwrap().len(), 1);
        assert!(store.list(Partition::Processing).unwrap().is_empty());
    }

    #[test]
    fn test_recover_prefers_terminal_copy() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store
            .repo
            .write_partition(Partition::Processing, &[record("A", JobStatus::Processing, 2)])
            .unwrap();
        store
            .repo
            .write_partition(Partition::Completed, &[record("A", JobStatus::Completed, 2)])
            .unwrap();

        store.recover().unwrap();

        assert!(store.list(Partition::Processing).unwrap().is_empty());
        assert_eq!(store.find("A").unwrap().unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_recover_fixes_status_drift() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store
            .repo
            .write_partition(Partition::Review, &[record("A", JobStatus::Failed, 1)])
            .unwrap();

        let report = store.recover().unwrap();

        assert_eq!(report.statuses_fixed, vec!["A".to_string()]);
        assert_eq!(store.find("A").unwrap().unwrap().status, JobStatus::NeedsReview);
    }

    #[test]
    fn test_recover_on_clean_queue_reports_clean() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store.enqueue(NewJob::with_id("A", json!({}))).unwrap();

        assert!(store.recover().unwrap().is_clean());
    }

    #[test]
    fn test_choose_survivor() {
        assert_eq!(
            choose_survivor(&[(Partition::Processing, 0, 1), (Partition::Failed, 0, 1)]),
            1
        );
        assert_eq!(
            choose_survivor(&[(Partition::Queued, 0, 0), (Partition::Processing, 3, 1)]),
            1
        );
        assert_eq!(
            choose_survivor(&[(Partition::Queued, 2, 2), (Partition::Processing, 0, 2)]),
            0
        );
        assert_eq!(
            choose_survivor(&[(Partition::Queued, 0, 0), (Partition::Queued, 1, 0)]),
            0
        );
    }
}
