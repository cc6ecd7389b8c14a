//! Core types for the evaluation engine.
//!
//! This module provides the fundamental types used throughout the cwatch-alerts crate:
//! - [`Bounds`]: An inclusive acceptable range for a metric value
//! - [`Watcher`]: A chat recipient tagged when a metric's title alerts
//! - [`MetricSpec`]: The static description of one tracked metric
//! - [`Sample`] / [`SampleSet`]: Point-in-time readings for one cycle
//! - [`MetricStatus`]: The per-cycle verdict for a metric

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

/// Title used for metrics that do not declare one.
pub const DEFAULT_TITLE: &str = "General";

/// Statistic requested from the metric source when a spec does not set one.
pub const DEFAULT_STATISTIC: &str = "Maximum";

/// Sampling period (seconds) used when a spec does not set one.
pub const DEFAULT_PERIOD_SECS: u32 = 60;

/// An inclusive `[lower, upper]` range of acceptable values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    /// Creates a new range.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidSpec` if either end is not finite or if
    /// `lower > upper`.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(AlertError::InvalidSpec {
                reason: format!("bounds must be finite numbers, got [{lower}, {upper}]"),
            });
        }
        if lower > upper {
            return Err(AlertError::InvalidSpec {
                reason: format!("lower bound {lower} is greater than upper bound {upper}"),
            });
        }
        Ok(Self { lower, upper })
    }

    /// Returns the lower end of the range.
    #[must_use]
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    /// Returns the upper end of the range.
    #[must_use]
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Returns true if `value` lies inside the range, ends included.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// A name/value pair identifying the source series of a metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    /// Dimension name.
    pub name: String,
    /// Dimension value.
    pub value: String,
}

impl Dimension {
    /// Creates a new dimension.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A recipient to tag when a metric under its title is out of bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Watcher {
    identity: String,
    display_name: String,
}

impl Watcher {
    /// Creates a new watcher. Both parts are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidWatcher` if the identity has no `@`
    /// separator or the display name is blank.
    pub fn new(identity: impl AsRef<str>, display_name: impl AsRef<str>) -> Result<Self> {
        let identity = identity.as_ref().trim();
        let display_name = display_name.as_ref().trim();

        if !identity.contains('@') {
            return Err(AlertError::InvalidWatcher {
                reason: format!("identity '{identity}' must be an email/UPN"),
            });
        }
        if display_name.is_empty() {
            return Err(AlertError::InvalidWatcher {
                reason: format!("display name for '{identity}' cannot be empty"),
            });
        }

        Ok(Self {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
        })
    }

    /// Returns the recipient identity (email or UPN).
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the name shown in the chat tag.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// The static description of one tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpec {
    /// Unique label, used as the join key between samples and diff state.
    pub label: String,
    /// Namespace of the source series.
    pub namespace: String,
    /// Name of the source series.
    pub metric_name: String,
    /// Dimensions selecting the source series.
    pub dimensions: Vec<Dimension>,
    /// Acceptable value range.
    pub bounds: Bounds,
    /// Rise between consecutive samples that counts as a violation.
    pub diff_threshold: Option<f64>,
    /// Grouping key; [`DEFAULT_TITLE`] when absent.
    pub title: Option<String>,
    /// Sampling period in seconds.
    pub period_secs: Option<u32>,
    /// Statistic requested from the source.
    pub statistic: Option<String>,
    /// Recipients tagged when this metric's title alerts.
    pub watchers: Vec<Watcher>,
}

impl MetricSpec {
    /// Creates a new spec builder with the required fields.
    pub fn builder(
        label: impl Into<String>,
        namespace: impl Into<String>,
        metric_name: impl Into<String>,
        bounds: Bounds,
    ) -> MetricSpecBuilder {
        MetricSpecBuilder::new(label, namespace, metric_name, bounds)
    }

    /// Returns the grouping title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    /// Returns the sampling period, falling back to [`DEFAULT_PERIOD_SECS`].
    #[must_use]
    pub fn period_secs(&self) -> u32 {
        self.period_secs.unwrap_or(DEFAULT_PERIOD_SECS)
    }

    /// Returns the statistic, falling back to [`DEFAULT_STATISTIC`].
    #[must_use]
    pub fn statistic(&self) -> &str {
        self.statistic.as_deref().unwrap_or(DEFAULT_STATISTIC)
    }
}

/// Builder for creating [`MetricSpec`] instances.
#[derive(Debug)]
pub struct MetricSpecBuilder {
    label: String,
    namespace: String,
    metric_name: String,
    bounds: Bounds,
    dimensions: Vec<Dimension>,
    diff_threshold: Option<f64>,
    title: Option<String>,
    period_secs: Option<u32>,
    statistic: Option<String>,
    watchers: Vec<Watcher>,
}

impl MetricSpecBuilder {
    fn new(
        label: impl Into<String>,
        namespace: impl Into<String>,
        metric_name: impl Into<String>,
        bounds: Bounds,
    ) -> Self {
        Self {
            label: label.into(),
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            bounds,
            dimensions: Vec::new(),
            diff_threshold: None,
            title: None,
            period_secs: None,
            statistic: None,
            watchers: Vec::new(),
        }
    }

    /// Adds a dimension.
    #[must_use]
    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::new(name, value));
        self
    }

    /// Replaces all dimensions.
    #[must_use]
    pub fn dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Sets the rise threshold.
    #[must_use]
    pub const fn diff_threshold(mut self, threshold: f64) -> Self {
        self.diff_threshold = Some(threshold);
        self
    }

    /// Sets the grouping title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the sampling period in seconds.
    #[must_use]
    pub const fn period_secs(mut self, secs: u32) -> Self {
        self.period_secs = Some(secs);
        self
    }

    /// Sets the statistic.
    #[must_use]
    pub fn statistic(mut self, statistic: impl Into<String>) -> Self {
        self.statistic = Some(statistic.into());
        self
    }

    /// Adds a watcher.
    #[must_use]
    pub fn watcher(mut self, watcher: Watcher) -> Self {
        self.watchers.push(watcher);
        self
    }

    /// Builds the spec.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidSpec` if a required string is empty, the
    /// diff threshold is negative or not finite, the title is blank, the
    /// period is zero or the statistic is empty.
    pub fn build(self) -> Result<MetricSpec> {
        for (field, value) in [
            ("label", &self.label),
            ("namespace", &self.namespace),
            ("metric_name", &self.metric_name),
        ] {
            if value.trim().is_empty() {
                return Err(AlertError::InvalidSpec {
                    reason: format!("{field} cannot be empty"),
                });
            }
        }

        if let Some(threshold) = self.diff_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(AlertError::InvalidSpec {
                    reason: format!(
                        "diff threshold for '{}' must be a non-negative number, got {threshold}",
                        self.label
                    ),
                });
            }
        }

        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(AlertError::InvalidSpec {
                reason: format!("title for '{}' cannot be blank", self.label),
            });
        }

        if self.period_secs == Some(0) {
            return Err(AlertError::InvalidSpec {
                reason: format!("period for '{}' must be greater than 0", self.label),
            });
        }

        if self.statistic.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(AlertError::InvalidSpec {
                reason: format!("statistic for '{}' cannot be empty", self.label),
            });
        }

        Ok(MetricSpec {
            label: self.label,
            namespace: self.namespace,
            metric_name: self.metric_name,
            dimensions: self.dimensions,
            bounds: self.bounds,
            diff_threshold: self.diff_threshold,
            title: self.title,
            period_secs: self.period_secs,
            statistic: self.statistic,
            watchers: self.watchers,
        })
    }
}

/// A point-in-time reading for one metric.
///
/// A sample without a timestamp or without a value means "no data" and is
/// kept distinct from a numeric zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// The metric label this sample belongs to.
    pub label: String,
    /// When the value was observed.
    pub timestamp: Option<DateTime<Utc>>,
    /// The observed value.
    pub value: Option<f64>,
}

impl Sample {
    /// Creates a sample with a known value.
    #[must_use]
    pub fn known(label: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            label: label.into(),
            timestamp: Some(timestamp),
            value: Some(value),
        }
    }

    /// Creates a sample with a known value observed now.
    #[must_use]
    pub fn now(label: impl Into<String>, value: f64) -> Self {
        Self::known(label, Utc::now(), value)
    }

    /// Creates a "no data" sample.
    #[must_use]
    pub fn unknown(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timestamp: None,
            value: None,
        }
    }

    /// Returns the value if both timestamp and value are present.
    #[must_use]
    pub fn reading(&self) -> Option<f64> {
        self.timestamp.and(self.value)
    }
}

/// The samples gathered for one cycle, keyed by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: HashMap<String, Sample>,
}

impl SampleSet {
    /// Creates an empty set (every metric evaluates as unknown).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a sample, replacing any previous one for the same label.
    pub fn insert(&mut self, sample: Sample) {
        self.samples.insert(sample.label.clone(), sample);
    }

    /// Gets the sample for a label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Sample> {
        self.samples.get(label)
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the set holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterates over the samples in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }
}

impl FromIterator<Sample> for SampleSet {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut set = Self::new();
        for sample in iter {
            set.insert(sample);
        }
        set
    }
}

/// The per-cycle verdict for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    /// Within bounds and no diff violation.
    Ok,
    /// Out of bounds, or rose by at least the diff threshold.
    Violation,
    /// No sample this cycle.
    Unknown,
}

impl MetricStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Violation => "violation",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for [`MetricStatus::Violation`].
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        matches!(self, Self::Violation)
    }
}

impl std::fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
