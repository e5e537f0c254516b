//! Error types for the store

use std::time::Duration;

use hopper_core::domain::partition::Partition;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when operating on the queue directory
///
/// Duplicate ids and unknown job ids are not errors: the lifecycle
/// operations report them as `false` / `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The global lock could not be taken in time; nothing was changed
    #[error("timed out after {waited:?} waiting for the queue lock")]
    LockTimeout {
        /// How long the caller waited
        waited: Duration,
    },

    /// Filesystem operation failed
    #[error("I/O error while {context}: {source}")]
    Io {
        /// What the store was doing
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A partition file exists but cannot be parsed
    #[error("partition '{partition}' is corrupted: {source}")]
    CorruptedPartition {
        partition: Partition,
        #[source]
        source: serde_json::Error,
    },

    /// Records could not be serialized
    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),

    /// Store configuration is unusable
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Check if this error is a lock timeout
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Check if retrying the whole operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = StoreError::LockTimeout {
            waited: Duration::from_millis(250),
        };
        assert!(err.is_lock_timeout());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_error_is_not_retryable() {
        let err = StoreError::InvalidConfig("lock_timeout must be greater than 0".to_string());
        assert!(!err.is_lock_timeout());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("lock_timeout"));
    }

    #[test]
    fn test_io_error_message_has_context() {
        let err = StoreError::io(
            "reading queued.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().starts_with("I/O error while reading queued.json"));
    }
}
