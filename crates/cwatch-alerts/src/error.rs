//! Error types for the cwatch-alerts crate.

use thiserror::Error;

/// Errors that can occur while building specs, evaluating a cycle or
/// delivering a digest.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid metric specification.
    #[error("invalid metric spec: {reason}")]
    InvalidSpec {
        /// The reason the spec is invalid.
        reason: String,
    },

    /// Invalid watcher entry.
    #[error("invalid watcher: {reason}")]
    InvalidWatcher {
        /// The reason the watcher is invalid.
        reason: String,
    },

    /// Two specs share the same label.
    #[error("duplicate metric label: {label}")]
    DuplicateLabel {
        /// The label that appears more than once.
        label: String,
    },

    /// A sample broke the input contract of the evaluation core.
    #[error("contract violation for '{label}': {reason}")]
    ContractViolation {
        /// The label of the offending sample.
        label: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid notification channel configuration.
    #[error("invalid channel: {reason}")]
    InvalidChannel {
        /// The reason the channel configuration is invalid.
        reason: String,
    },

    /// Notification delivery failed.
    #[error("notification failed: {reason}")]
    NotificationFailed {
        /// The reason the notification failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_spec() {
        let err = AlertError::InvalidSpec {
            reason: "label cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "invalid metric spec: label cannot be empty");
    }

    #[test]
    fn error_display_duplicate_label() {
        let err = AlertError::DuplicateLabel {
            label: "cpu".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate metric label: cpu");
    }

    #[test]
    fn error_display_contract_violation() {
        let err = AlertError::ContractViolation {
            label: "cpu".to_string(),
            reason: "value is NaN".to_string(),
        };
        assert_eq!(err.to_string(), "contract violation for 'cpu': value is NaN");
    }

    #[test]
    fn error_display_invalid_channel() {
        let err = AlertError::InvalidChannel {
            reason: "webhook URL cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "invalid channel: webhook URL cannot be empty");
    }

    #[test]
    fn error_display_notification_failed() {
        let err = AlertError::NotificationFailed {
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "notification failed: connection refused");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("invalid json");
        assert!(json_err.is_err());
        let alert_err: AlertError = json_err.unwrap_err().into();
        assert!(matches!(alert_err, AlertError::SerializationError(_)));
    }
}
