//! Partitions loaded for one locked operation

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use hopper_core::domain::job::JobRecord;
use hopper_core::domain::partition::Partition;

use crate::error::Result;
use crate::repository::PartitionStore;

/// Lazily loaded partitions plus the order in which they were modified
///
/// Only valid while the global lock is held. Partitions are written back
/// in the order they were marked dirty, so a move that marks the
/// destination first never loses a record if the process dies between the
/// two writes: at worst the record exists in both files, which recovery
/// repairs.
pub(crate) struct PartitionSet<'a> {
    repo: &'a PartitionStore,
    loaded: BTreeMap<Partition, Vec<JobRecord>>,
    dirty: Vec<Partition>,
}

impl<'a> PartitionSet<'a> {
    pub(crate) fn new(repo: &'a PartitionStore) -> Self {
        Self {
            repo,
            loaded: BTreeMap::new(),
            dirty: Vec::new(),
        }
    }

    /// Records of `partition`, read from disk on first access
    pub(crate) fn records(&mut self, partition: Partition) -> Result<&mut Vec<JobRecord>> {
        match self.loaded.entry(partition) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let records = self.repo.read_partition(partition)?;
                Ok(entry.insert(records))
            }
        }
    }

    /// The partition currently holding `id`, if any
    pub(crate) fn locate(&mut self, id: &str) -> Result<Option<(Partition, usize)>> {
        for partition in Partition::ALL {
            if let Some(index) = self.records(partition)?.iter().position(|r| r.id == id) {
                return Ok(Some((partition, index)));
            }
        }
        Ok(None)
    }

    pub(crate) fn mark_dirty(&mut self, partition: Partition) {
        if !self.dirty.contains(&partition) {
            self.dirty.push(partition);
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Write every modified partition back, in modification order
    pub(crate) fn commit(&mut self) -> Result<()> {
        for partition in std::mem::take(&mut self.dirty) {
            if let Some(records) = self.loaded.get(&partition) {
                self.repo.write_partition(partition, records)?;
            }
        }
        Ok(())
    }
}
