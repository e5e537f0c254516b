//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::partition::Partition;

/// Caller-supplied details merged into a job's `result` map.
pub type ResultDetails = serde_json::Map<String, serde_json::Value>;

/// A job application tracked by the queue
///
/// `payload` and `result` are opaque to the store: the producer decides the
/// payload shape and the worker decides what goes into the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<ResultDetails>,
}

impl JobRecord {
    /// Creates a freshly queued record
    pub fn queued(id: String, payload: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            payload,
            attempts: 0,
            created_at: now,
            started_at: None,
            ended_at: None,
            last_error: None,
            result: None,
        }
    }

    /// Merges `details` into `result` key by key.
    ///
    /// Keys already present are overwritten by the newer value; other keys
    /// are kept, so details reported over several calls accumulate.
    pub fn merge_result(&mut self, details: ResultDetails) {
        if details.is_empty() {
            return;
        }
        let result = self.result.get_or_insert_with(ResultDetails::new);
        for (key, value) in details {
            result.insert(key, value);
        }
    }
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    NeedsReview,
}

impl JobStatus {
    /// The partition a record with this status must live in
    pub fn partition(self) -> Partition {
        match self {
            JobStatus::Queued => Partition::Queued,
            JobStatus::Processing => Partition::Processing,
            JobStatus::Completed => Partition::Completed,
            JobStatus::Failed => Partition::Failed,
            JobStatus::NeedsReview => Partition::Review,
        }
    }

    /// Terminal statuses never transition again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::NeedsReview
        )
    }

    /// Whether `self -> next` is an allowed lifecycle edge
    ///
    /// Queued only moves to Processing. Processing moves to any terminal
    /// status or back to Queued for a retry.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Processing, JobStatus::Queued) => true,
            (JobStatus::Processing, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "Queued"),
            JobStatus::Processing => write!(f, "Processing"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::NeedsReview => write!(f, "NeedsReview"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(value: serde_json::Value) -> ResultDetails {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_queued_record_defaults() {
        let now = Utc::now();
        let job = JobRecord::queued("j1".to_string(), json!({"apply_url": "u"}), now);

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.created_at, now);
        assert!(job.started_at.is_none());
        assert!(job.result.is_none());
    }

    #[test]
    fn test_merge_result_accumulates() {
        let mut job = JobRecord::queued("j1".to_string(), json!({}), Utc::now());

        job.merge_result(details(json!({"screenshot": "a.png", "fields": 3})));
        job.merge_result(details(json!({"fields": 4, "outcome": "submitted"})));

        let result = job.result.unwrap();
        assert_eq!(result["screenshot"], json!("a.png"));
        assert_eq!(result["fields"], json!(4));
        assert_eq!(result["outcome"], json!("submitted"));
    }

    #[test]
    fn test_merge_empty_details_leaves_result_unset() {
        let mut job = JobRecord::queued("j1".to_string(), json!({}), Utc::now());
        job.merge_result(ResultDetails::new());
        assert!(job.result.is_none());
    }

    #[test]
    fn test_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::NeedsReview));

        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::NeedsReview.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let value = serde_json::to_value(JobStatus::NeedsReview).unwrap();
        assert_eq!(value, json!("needs_review"));
    }

    #[test]
    fn test_status_partition_mapping() {
        assert_eq!(JobStatus::NeedsReview.partition(), Partition::Review);
        assert_eq!(JobStatus::Processing.partition(), Partition::Processing);
    }
}
