//! Job DTOs

use serde::{Deserialize, Serialize};

/// Request to enqueue a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Caller-chosen id; a UUID v4 is generated when absent
    pub id: Option<String>,
    pub payload: serde_json::Value,
}

impl NewJob {
    pub fn new(payload: serde_json::Value) -> Self {
        Self { id: None, payload }
    }

    pub fn with_id(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Some(id.into()),
            payload,
        }
    }

    /// Returns the caller id or a freshly generated one
    pub fn resolve_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_id_keeps_caller_id() {
        let job = NewJob::with_id("gh-42", json!({}));
        assert_eq!(job.resolve_id(), "gh-42");
    }

    #[test]
    fn test_resolve_id_generates_uuid() {
        let job = NewJob::new(json!({}));
        let id = job.resolve_id();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_ne!(id, job.resolve_id());
    }
}
