//! Queue statistics DTO

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::partition::Partition;

/// Count reported for a partition whose size could not be determined
pub const UNKNOWN_COUNT: i64 = -1;

/// Per-partition record counts
///
/// A count of [`UNKNOWN_COUNT`] means the partition could not be read in
/// time (or could not be parsed), never that it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub counts: BTreeMap<Partition, i64>,
}

impl QueueStats {
    /// Stats with every partition marked unknown
    pub fn unknown() -> Self {
        Self {
            counts: Partition::ALL
                .into_iter()
                .map(|p| (p, UNKNOWN_COUNT))
                .collect(),
        }
    }

    pub fn set(&mut self, partition: Partition, count: i64) {
        self.counts.insert(partition, count);
    }

    pub fn get(&self, partition: Partition) -> i64 {
        self.counts.get(&partition).copied().unwrap_or(UNKNOWN_COUNT)
    }

    /// Sum of all known counts
    pub fn known_total(&self) -> i64 {
        self.counts.values().filter(|c| **c >= 0).sum()
    }

    pub fn has_unknown(&self) -> bool {
        Partition::ALL.into_iter().any(|p| self.get(p) == UNKNOWN_COUNT)
    }
}

impl std::fmt::Display for QueueStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = Partition::ALL
            .into_iter()
            .map(|p| format!("{}={}", p.name(), self.get(p)))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
