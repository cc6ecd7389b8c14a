//! Metric configuration loading and validation for cwatch.
//!
//! The metric list lives in a JSON file (by default `metrics.json`):
//!
//! ```json
//! {
//!   "metrics": [
//!     {
//!       "label": "cpu",
//!       "namespace": "AWS/RDS",
//!       "metric_name": "CPUUtilization",
//!       "dimensions": [{ "Name": "DBInstanceIdentifier", "Value": "main" }],
//!       "acceptable_bounds": { "lower": 0, "upper": 80 },
//!       "diff": 10,
//!       "title": "DB",
//!       "mentions": { "title": [{ "email": "ann@example.com", "name": "Ann" }] }
//!     }
//!   ]
//! }
//! ```
//!
//! [`MetricsConfig`] checks the whole document before building any spec and
//! reports every problem at once in a single [`ConfigError::Invalid`].
//!
//! ```rust
//! use cwatch_config::MetricsConfig;
//!
//! let config = MetricsConfig::from_json_str(
//!     r#"{"metrics": [{"label": "cpu", "namespace": "AWS/EC2", "metric_name": "CPUUtilization",
//!        "dimensions": [], "acceptable_bounds": {"lower": 0, "upper": 80}}]}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.len(), 1);
//! assert_eq!(config.specs()[0].title(), "General");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod schema;
pub mod validate;

use std::path::{Path, PathBuf};

use cwatch_alerts::MetricSpec;
use serde_json::Value;
use tracing::{debug, info, warn};

pub use error::{ConfigError, ConfigIssue, Result};
pub use schema::{
    BoundsEntry, DimensionEntry, MentionsEntry, MetricEntry, MetricsFile, WatcherEntry,
};
pub use validate::validate_document;

/// Default metrics file name.
pub const DEFAULT_CONFIG_FILE: &str = "metrics.json";

/// A validated metric configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    specs: Vec<MetricSpec>,
    path: Option<PathBuf>,
}

impl MetricsConfig {
    /// Loads and validates a metrics file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file does not exist,
    /// `ConfigError::Io` if it cannot be read, `ConfigError::Parse` for
    /// malformed JSON and `ConfigError::Invalid` for rule violations.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading metrics file");

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut config = Self::from_json_str(&content)?;
        config.path = Some(path.to_path_buf());
        info!(path = %path.display(), metrics = config.len(), "loaded metrics configuration");
        Ok(config)
    }

    /// Parses and validates a metrics document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON and
    /// `ConfigError::Invalid` for rule violations.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(content)?;
        Self::from_value(root)
    }

    /// Validates an already parsed document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` listing every rule violation.
    pub fn from_value(root: Value) -> Result<Self> {
        let issues = validate_document(&root);
        if !issues.is_empty() {
            return Err(ConfigError::Invalid { issues });
        }

        let file: MetricsFile = serde_json::from_value(root)?;

        let mut specs = Vec::with_capacity(file.metrics.len());
        let mut issues = Vec::new();
        for (index, entry) in file.metrics.into_iter().enumerate() {
            match entry.into_spec() {
                Ok(spec) => specs.push(spec),
                Err(e) => issues.push(ConfigIssue::metric(index, "", e.to_string())),
            }
        }
        if !issues.is_empty() {
            return Err(ConfigError::Invalid { issues });
        }

        if specs.is_empty() {
            warn!("metrics configuration is empty; every digest will be empty");
        }

        Ok(Self { specs, path: None })
    }

    /// Returns the specs in configuration order.
    #[must_use]
    pub fn specs(&self) -> &[MetricSpec] {
        &self.specs
    }

    /// Consumes the configuration and returns the specs.
    #[must_use]
    pub fn into_specs(self) -> Vec<MetricSpec> {
        self.specs
    }

    /// Returns the number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if no metrics are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Returns the file the configuration was loaded from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Groups specs by title, in first-seen title order.
    #[must_use]
    pub fn grouped(&self) -> Vec<(&str, Vec<&MetricSpec>)> {
        let mut groups: Vec<(&str, Vec<&MetricSpec>)> = Vec::new();
        for spec in &self.specs {
            match groups.iter_mut().find(|(title, _)| *title == spec.title()) {
                Some((_, members)) => members.push(spec),
                None => groups.push((spec.title(), vec![spec])),
            }
        }
        groups
    }

    /// Renders the "tracking metrics" listing printed at startup.
    #[must_use]
    pub fn grouped_summary(&self) -> String {
        let mut out = String::from("Tracking metrics (grouped):\n");
        for (title, specs) in self.grouped() {
            out.push_str(&format!("  {title}\n"));
            for spec in specs {
                let diff = spec
                    .diff_threshold
                    .map(|d| format!(", diff_threshold={d}"))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "    - {} :: {}/{} (stat={}, period={}) acceptable_bounds={}{diff}\n",
                    spec.label,
                    spec.namespace,
                    spec.metric_name,
                    spec.statistic(),
                    spec.period_secs(),
                    spec.bounds,
                ));
            }
        }
        out
    }
}
