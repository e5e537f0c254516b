//! Partition domain model
//!
//! A partition is the durable set of every record sharing one status.

use serde::{Deserialize, Serialize};

use crate::domain::job::JobStatus;

/// One of the five durable job sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Queued,
    Processing,
    Completed,
    Failed,
    Review,
}

impl Partition {
    /// Every partition, in lifecycle order
    pub const ALL: [Partition; 5] = [
        Partition::Queued,
        Partition::Processing,
        Partition::Completed,
        Partition::Failed,
        Partition::Review,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Partition::Queued => "queued",
            Partition::Processing => "processing",
            Partition::Completed => "completed",
            Partition::Failed => "failed",
            Partition::Review => "review",
        }
    }

    /// File name of the partition inside the queue directory
    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    /// The status every record in this partition carries
    pub fn status(self) -> JobStatus {
        match self {
            Partition::Queued => JobStatus::Queued,
            Partition::Processing => JobStatus::Processing,
            Partition::Completed => JobStatus::Completed,
            Partition::Failed => JobStatus::Failed,
            Partition::Review => JobStatus::NeedsReview,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.status().is_terminal()
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string names no partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPartition(pub String);

impl std::fmt::Display for UnknownPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown partition '{}' (expected one of: queued, processing, completed, failed, review)",
            self.0
        )
    }
}

impl std::error::Error for UnknownPartition {}

impl std::str::FromStr for Partition {
    type Err = UnknownPartition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Partition::ALL
            .into_iter()
            .find(|p| p.name() == lowered)
            .ok_or_else(|| UnknownPartition(s.to_string()))
    }
}
