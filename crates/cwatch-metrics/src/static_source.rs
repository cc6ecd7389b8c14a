//! In-memory source replaying fixed readings.
//!
//! Sample files map labels to a reading or `null`:
//!
//! ```json
//! {
//!   "cpu": { "timestamp": "2024-05-01T12:00:00Z", "value": 65.0 },
//!   "mem": null
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cwatch_alerts::{MetricSpec, Sample, SampleSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::source::{LookbackWindow, MetricSource};

/// One replayed reading. Either part may be missing, which reads as no data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticReading {
    /// When the value was observed.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// The observed value.
    #[serde(default)]
    pub value: Option<f64>,
}

/// A source that answers every fetch with the same readings.
///
/// The lookback window is ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    readings: BTreeMap<String, Option<StaticReading>>,
}

impl StaticSource {
    /// Creates an empty source; every metric reads as no data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reading.
    #[must_use]
    pub fn with_reading(
        mut self,
        label: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Self {
        self.set(label, timestamp, value);
        self
    }

    /// Replaces the reading for a label.
    pub fn set(&mut self, label: impl Into<String>, timestamp: DateTime<Utc>, value: f64) {
        self.readings.insert(
            label.into(),
            Some(StaticReading {
                timestamp: Some(timestamp),
                value: Some(value),
            }),
        );
    }

    /// Marks a label as having no data.
    pub fn clear(&mut self, label: impl Into<String>) {
        self.readings.insert(label.into(), None);
    }

    /// Parses readings from JSON.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::SerializationError` for malformed input.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let readings: BTreeMap<String, Option<StaticReading>> = serde_json::from_str(content)?;
        Ok(Self { readings })
    }

    /// Loads readings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::Io` if the file cannot be read and
    /// `MetricsError::SerializationError` for malformed input.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| MetricsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_json_str(&content)?;
        debug!(path = %path.display(), readings = source.len(), "loaded sample file");
        Ok(source)
    }

    /// Returns the number of labels with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Returns true if no label has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn sample_for(&self, label: &str) -> Sample {
        match self.readings.get(label).copied().flatten() {
            Some(reading) => Sample {
                label: label.to_string(),
                timestamp: reading.timestamp,
                value: reading.value,
            },
            None => Sample::unknown(label),
        }
    }
}

#[async_trait]
impl MetricSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, specs: &[MetricSpec], _window: LookbackWindow) -> Result<SampleSet> {
        Ok(specs.iter().map(|spec| self.sample_for(&spec.label)).collect())
    }
}
