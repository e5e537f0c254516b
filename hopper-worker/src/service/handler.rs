//! Job handler
//!
//! The handler is the collaborator that actually applies to a posting. The
//! poller hands it a claimed record and reports whatever [`Outcome`] comes
//! back to the store.

use async_trait::async_trait;
use hopper_core::domain::job::{JobRecord, ResultDetails};
use hopper_core::domain::payload::JobPayload;
use serde_json::Value;
use tracing::info;

use super::page_cache::PageCache;

/// Failure messages that need a human rather than another attempt
const REVIEW_MARKERS: [&str; 2] = ["missing required fields", "submit button not found"];

/// Result of handling one job
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The application went through
    Submitted(ResultDetails),

    /// The form could not be completed automatically
    NeedsReview {
        reason: String,
        details: ResultDetails,
    },

    /// The attempt failed
    Failed {
        reason: String,
        details: ResultDetails,
        retryable: bool,
    },
}

impl Outcome {
    /// Classifies a failure message
    ///
    /// Messages mentioning missing required fields or a missing submit
    /// button go to review; everything else is a retryable failure.
    pub fn from_failure_message(message: impl Into<String>, details: ResultDetails) -> Self {
        let reason = message.into();
        let lowered = reason.to_lowercase();

        if REVIEW_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            Outcome::NeedsReview { reason, details }
        } else {
            Outcome::Failed {
                reason,
                details,
                retryable: true,
            }
        }
    }

    /// Short label used in logs and cycle reports
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Submitted(_) => "submitted",
            Outcome::NeedsReview { .. } => "needs_review",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// State shared by every job a worker handles
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub worker_id: String,
    pub page_cache: PageCache,
}

impl HandlerContext {
    pub fn new(worker_id: impl Into<String>, page_cache: PageCache) -> Self {
        Self {
            worker_id: worker_id.into(),
            page_cache,
        }
    }
}

/// Applies to one job posting
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Handles a claimed job
    ///
    /// Errors are expressed as [`Outcome::Failed`] or
    /// [`Outcome::NeedsReview`]; the poller reports exactly one outcome per
    /// claimed job.
    async fn handle(&self, job: &JobRecord, ctx: &HandlerContext) -> Outcome;
}

/// Handler that only records the application URL
///
/// Stands in for the browser automation: it validates the payload, notes the
/// URL in the page cache and reports the job as submitted.
#[derive(Debug, Default, Clone)]
pub struct LoggingHandler;

impl LoggingHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for LoggingHandler {
    async fn handle(&self, job: &JobRecord, ctx: &HandlerContext) -> Outcome {
        let payload = match JobPayload::from_value(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                let mut details = ResultDetails::new();
                details.insert("payload_error".to_string(), Value::String(e.to_string()));
                return Outcome::NeedsReview {
                    reason: format!("Invalid payload: {}", e),
                    details,
                };
            }
        };

        let cached = ctx.page_cache.get(&payload.apply_url).is_some();
        if !cached {
            ctx.page_cache
                .insert(payload.apply_url.clone(), format!("visited by {}", ctx.worker_id));
        }

        info!(
            "Job {} (attempt {}): {} at {} -> {}",
            job.id,
            job.attempts,
            payload.title().unwrap_or("untitled"),
            payload.company().unwrap_or("unknown company"),
            payload.apply_url
        );

        let mut details = ResultDetails::new();
        details.insert(
            "apply_url".to_string(),
            Value::String(payload.apply_url.clone()),
        );
        details.insert("worker_id".to_string(), Value::String(ctx.worker_id.clone()));
        details.insert("page_cached".to_string(), Value::Bool(cached));

        Outcome::Submitted(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn context() -> HandlerContext {
        HandlerContext::new("worker-1", PageCache::new(Duration::from_secs(60), 8))
    }

    #[test]
    fn test_review_markers_are_case_insensitive() {
        let outcome = Outcome::from_failure_message("Missing Required Fields: email", ResultDetails::new());
        assert_eq!(outcome.label(), "needs_review");

        let outcome = Outcome::from_failure_message("SUBMIT BUTTON NOT FOUND", ResultDetails::new());
        assert_eq!(outcome.label(), "needs_review");
    }

    #[test]
    fn test_other_failures_are_retryable() {
        let outcome = Outcome::from_failure_message("timeout loading page", ResultDetails::new());
        assert_eq!(
            outcome,
            Outcome::Failed {
                reason: "timeout loading page".to_string(),
                details: ResultDetails::new(),
                retryable: true,
            }
        );
    }

    #[tokio::test]
    async fn test_logging_handler_submits_valid_payload() {
        let ctx = context();
        let job = JobRecord::queued(
            "job-1".to_string(),
            json!({"id": 7, "apply_url": "https://jobs.example.com/7", "title": "SRE"}),
            Utc::now(),
        );

        let Outcome::Submitted(details) = LoggingHandler::new().handle(&job, &ctx).await else {
            panic!("expected a submitted outcome");
        };
        assert_eq!(details["apply_url"], json!("https://jobs.example.com/7"));
        assert_eq!(details["page_cached"], json!(false));
        assert_eq!(ctx.page_cache.len(), 1);

        let Outcome::Submitted(details) = LoggingHandler::new().handle(&job, &ctx).await else {
            panic!("expected a submitted outcome");
        };
        assert_eq!(details["page_cached"], json!(true));
    }

    #[tokio::test]
    async fn test_logging_handler_flags_invalid_payload() {
        let job = JobRecord::queued("job-2".to_string(), json!({"id": 1}), Utc::now());

        let outcome = LoggingHandler::new().handle(&job, &context()).await;
        assert_eq!(outcome.label(), "needs_review");
    }
}
