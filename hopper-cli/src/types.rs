//! Common types used across CLI modules

use std::path::Path;

use anyhow::{Context, Result, bail};
use hopper_core::domain::job::ResultDetails;
use serde_json::Value;

/// JSON given either inline or as `@path` to a file holding it
#[derive(Debug, Clone, PartialEq)]
pub enum JsonInput {
    Inline(String),
    File(String),
}

impl JsonInput {
    /// Parse a command-line argument into a JsonInput
    pub fn parse(input: &str) -> Self {
        match input.strip_prefix('@') {
            Some(path) => JsonInput::File(path.to_string()),
            None => JsonInput::Inline(input.to_string()),
        }
    }

    /// Read and parse the JSON
    pub fn load(&self) -> Result<Value> {
        match self {
            JsonInput::Inline(text) => {
                serde_json::from_str(text).context("Argument is not valid JSON")
            }
            JsonInput::File(path) => {
                let text = std::fs::read_to_string(Path::new(path))
                    .with_context(|| format!("Failed to read {}", path))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("{} does not contain valid JSON", path))
            }
        }
    }
}

/// Parses an optional `--details` argument into a JSON object
pub fn parse_details(input: Option<&str>) -> Result<ResultDetails> {
    let Some(input) = input else {
        return Ok(ResultDetails::new());
    };

    match JsonInput::parse(input).load()? {
        Value::Object(details) => Ok(details),
        other => bail!("Details must be a JSON object, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_inline_and_file() {
        assert_eq!(
            JsonInput::parse("{\"a\": 1}"),
            JsonInput::Inline("{\"a\": 1}".to_string())
        );
        assert_eq!(
            JsonInput::parse("@posting.json"),
            JsonInput::File("posting.json".to_string())
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posting.json");
        std::fs::write(&path, r#"{"id": 9, "apply_url": "https://example.com/9"}"#).unwrap();

        let input = JsonInput::parse(&format!("@{}", path.display()));
        assert_eq!(input.load().unwrap()["id"], json!(9));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(JsonInput::parse("{not json").load().is_err());
        assert!(JsonInput::parse("@/definitely/missing.json").load().is_err());
    }

    #[test]
    fn test_details_must_be_object() {
        assert!(parse_details(None).unwrap().is_empty());
        assert_eq!(
            parse_details(Some(r#"{"screenshot": "s.png"}"#)).unwrap()["screenshot"],
            json!("s.png")
        );
        assert!(parse_details(Some("[1, 2]")).is_err());
    }
}
