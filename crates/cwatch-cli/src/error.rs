//! Error types for the CLI.

use std::io;

use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The metrics configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] cwatch_config::ConfigError),

    /// Samples could not be fetched or loaded.
    #[error(transparent)]
    Metrics(#[from] cwatch_metrics::MetricsError),

    /// Evaluation or channel setup failed.
    #[error(transparent)]
    Alert(#[from] cwatch_alerts::AlertError),

    /// A command-line argument combination is not usable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// At least one channel did not accept the digest.
    #[error("digest delivery failed: {0}")]
    DeliveryFailed(String),

    /// Output formatting failed.
    #[error("output error: {0}")]
    Format(String),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_display() {
        let err = CliError::InvalidArgument("--webhook-url is required".into());
        assert_eq!(err.to_string(), "invalid argument: --webhook-url is required");
    }

    #[test]
    fn config_error_is_transparent() {
        let err: CliError = cwatch_config::ConfigError::Parse {
            reason: "expected value".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            cwatch_config::ConfigError::Parse {
                reason: "expected value".into()
            }
            .to_string()
        );
    }

    #[test]
    fn io_error_converts() {
        let err: CliError = io::Error::new(io::ErrorKind::BrokenPipe, "closed").into();
        assert!(matches!(err, CliError::Io(_)));
    }
}
