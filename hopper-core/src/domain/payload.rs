//! Typed view of the producer payload
//!
//! The store never looks inside a payload. Producers and workers that need
//! the posting details parse it with [`JobPayload::from_value`].

use serde::{Deserialize, Serialize};

/// A job posting as emitted by the scraper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Posting identifier on the job board (numeric for most boards)
    #[serde(rename = "id")]
    pub posting_id: serde_json::Value,

    /// Where the application form lives
    pub apply_url: String,

    /// Title, company, location and anything else the scraper attached
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobPayload {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let payload: JobPayload = serde_json::from_value(value.clone())?;
        if payload.posting_id.is_null() {
            return Err(serde::de::Error::custom("payload id must not be null"));
        }
        if payload.apply_url.trim().is_empty() {
            return Err(serde::de::Error::custom("payload apply_url must not be empty"));
        }
        Ok(payload)
    }

    pub fn title(&self) -> Option<&str> {
        self.extra.get("title").and_then(|v| v.as_str())
    }

    pub fn company(&self) -> Option<&str> {
        self.extra.get("company").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_scraper_payload() {
        let value = json!({
            "id": 4012345,
            "title": "Backend Engineer",
            "company": "Acme",
            "apply_url": "https://boards.greenhouse.io/acme/jobs/4012345"
        });

        let payload = JobPayload::from_value(&value).unwrap();
        assert_eq!(payload.posting_id, json!(4012345));
        assert_eq!(payload.title(), Some("Backend Engineer"));
        assert_eq!(payload.company(), Some("Acme"));
    }

    #[test]
    fn test_missing_apply_url_rejected() {
        assert!(JobPayload::from_value(&json!({"id": 1})).is_err());
        assert!(JobPayload::from_value(&json!({"id": 1, "apply_url": "  "})).is_err());
    }

    #[test]
    fn test_null_id_rejected() {
        assert!(JobPayload::from_value(&json!({"id": null, "apply_url": "u"})).is_err());
    }
}
