//! Partition repository
//!
//! Reads and atomically replaces partition files. No locking and no business
//! logic happen here: callers hold the global lock around every
//! read-then-write pair.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use hopper_core::domain::job::JobRecord;
use hopper_core::domain::partition::Partition;

use crate::error::{Result, StoreError};

/// Suffix of in-flight write artifacts
const TEMP_SUFFIX: &str = ".tmp";

/// File-per-partition record store rooted at a queue directory
#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a partition's durable file
    pub fn path(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.file_name())
    }

    /// Create the queue directory and an empty file for each missing partition
    pub fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            StoreError::io(format!("creating queue directory {}", self.root.display()), e)
        })?;

        for partition in Partition::ALL {
            if !self.path(partition).exists() {
                self.write_partition(partition, &[])?;
                tracing::debug!("Initialized empty partition {}", partition);
            }
        }

        Ok(())
    }

    /// Read a partition, treating unreadable content as empty
    ///
    /// A missing file is an empty partition. A file that fails to parse is
    /// logged and read as empty, but left on disk untouched so an operator
    /// can recover it.
    pub fn read_partition(&self, partition: Partition) -> Result<Vec<JobRecord>> {
        match self.load_partition(partition) {
            Err(StoreError::CorruptedPartition { partition, source }) => {
                tracing::error!(
                    "Partition {} at {} is corrupted and will be read as empty: {}",
                    partition,
                    self.path(partition).display(),
                    source
                );
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Read a partition, reporting unparseable content as
    /// [`StoreError::CorruptedPartition`]
    pub fn load_partition(&self, partition: Partition) -> Result<Vec<JobRecord>> {
        let path = self.path(partition);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(format!("reading {}", path.display()), e)),
        };

        serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::CorruptedPartition { partition, source })
    }

    /// Atomically replace a partition's content
    ///
    /// The records go to a temporary file in the same directory, which is
    /// synced and then renamed over the partition file. A crash at any point
    /// leaves either the old or the new content in place.
    pub fn write_partition(&self, partition: Partition, records: &[JobRecord]) -> Result<()> {
        let target = self.path(partition);
        let data = serde_json::to_vec_pretty(records)?;

        self.preserve_if_corrupt(partition)?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", partition.name()))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|e| {
                StoreError::io(format!("creating temp file in {}", self.root.display()), e)
            })?;

        temp.write_all(&data)
            .map_err(|e| StoreError::io(format!("writing temp file for {}", target.display()), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(format!("syncing temp file for {}", target.display()), e))?;

        temp.persist(&target).map_err(|e| {
            StoreError::io(format!("renaming temp file to {}", target.display()), e.error)
        })?;

        Ok(())
    }

    /// Move unparseable content aside before it would be overwritten
    ///
    /// Returns the path the content was moved to, if any.
    fn preserve_if_corrupt(&self, partition: Partition) -> Result<Option<PathBuf>> {
        let Err(StoreError::CorruptedPartition { .. }) = self.load_partition(partition) else {
            return Ok(None);
        };

        let path = self.path(partition);
        let millis = chrono::Utc::now().timestamp_millis();
        let aside = self
            .root
            .join(format!("{}.corrupt-{}", partition.file_name(), millis));

        fs::rename(&path, &aside).map_err(|e| {
            StoreError::io(format!("preserving corrupted {}", path.display()), e)
        })?;

        tracing::error!(
            "Preserved corrupted partition {} as {} before rewriting it",
            partition,
            aside.display()
        );

        Ok(Some(aside))
    }

    /// Remove temp files left behind by writes that never reached the rename
    ///
    /// Must only run while holding the global lock, otherwise it could delete
    /// the temp file of a write in progress.
    pub fn sweep_temp_artifacts(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StoreError::io(
                    format!("listing {}", self.root.display()),
                    e,
                ));
            }
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry
                .map_err(|e| StoreError::io(format!("listing {}", self.root.display()), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if !is_temp_artifact(&name) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    tracing::warn!("Removed leftover write artifact {}", name);
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::io(
                        format!("removing {}", entry.path().display()),
                        e,
                    ));
                }
            }
        }

        Ok(removed)
    }
}

fn is_temp_artifact(name: &str) -> bool {
    name.ends_with(TEMP_SUFFIX)
        && Partition::ALL
            .iter()
            .any(|p| name.starts_with(&format!(".{}.", p.name())))
}
