//! Error types for the cwatch-metrics crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching samples.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The lookback window is empty or inverted.
    #[error("invalid lookback window: {reason}")]
    InvalidWindow {
        /// The reason the window is invalid.
        reason: String,
    },

    /// A spec could not be turned into a source query.
    #[error("invalid query for '{label}': {reason}")]
    InvalidQuery {
        /// The metric label.
        label: String,
        /// The reason the query is invalid.
        reason: String,
    },

    /// The source could not deliver samples this cycle.
    #[error("failed to fetch metrics from {source_name}: {reason}")]
    FetchFailed {
        /// Name of the failing source.
        source_name: String,
        /// What went wrong.
        reason: String,
    },

    /// A sample file could not be read.
    #[error("failed to read sample file '{}': {source}", .path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for MetricsError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_fetch_failed() {
        let err = MetricsError::FetchFailed {
            source_name: "cloudwatch".to_string(),
            reason: "throttled".to_string(),
        };
        assert_eq!(err.to_string(), "failed to fetch metrics from cloudwatch: throttled");
    }

    #[test]
    fn error_display_invalid_query() {
        let err = MetricsError::InvalidQuery {
            label: "cpu".to_string(),
            reason: "missing id".to_string(),
        };
        assert_eq!(err.to_string(), "invalid query for 'cpu': missing id");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<u32>("x").unwrap_err();
        let err: MetricsError = json_err.into();
        assert!(matches!(err, MetricsError::SerializationError(_)));
    }
}
