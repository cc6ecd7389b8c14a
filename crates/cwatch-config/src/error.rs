//! Error types for the cwatch-config crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// One problem found while validating the metrics file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Index of the offending metric, or `None` for root-level problems.
    pub metric: Option<usize>,
    /// Dotted path of the offending field, e.g. `acceptable_bounds.lower`.
    pub field: String,
    /// What is wrong.
    pub message: String,
}

impl ConfigIssue {
    /// Creates an issue for a field of metric `index`.
    #[must_use]
    pub fn metric(index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            metric: Some(index),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a root-level issue.
    #[must_use]
    pub fn root(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            metric: None,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.metric {
            Some(index) if self.field.is_empty() => write!(f, "Metric #{index}: {}", self.message),
            Some(index) => write!(f, "Metric #{index} '{}': {}", self.field, self.message),
            None if self.field.is_empty() => write!(f, "root: {}", self.message),
            None => write!(f, "root '{}': {}", self.field, self.message),
        }
    }
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that can occur while loading the metrics file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("required metrics file not found: {}", .path.display())]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("failed to read metrics file '{}': {source}", .path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("invalid JSON in metrics file: {reason}")]
    Parse {
        /// Parser message including line and column.
        reason: String,
    },

    /// The file is valid JSON but breaks one or more rules.
    #[error("invalid metrics configuration ({} issue(s)):\n{}", .issues.len(), render_issues(.issues))]
    Invalid {
        /// Every problem found, in document order.
        issues: Vec<ConfigIssue>,
    },
}

impl ConfigError {
    /// Returns the validation issues, if this is a validation error.
    #[must_use]
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            Self::Invalid { issues } => issues,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
