//! Typed records of the metrics file.
//!
//! These mirror the JSON layout one to one. They are only deserialized after
//! [`crate::validate::validate_document`] accepted the document, and are then
//! turned into [`MetricSpec`]s.

use cwatch_alerts::{Bounds, Dimension, MetricSpec, Watcher};
use serde::{Deserialize, Serialize};

/// The whole file: `{ "metrics": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsFile {
    /// Metric entries in configuration order.
    pub metrics: Vec<MetricEntry>,
}

/// One entry of the `metrics` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    /// Unique metric label.
    pub label: String,
    /// Source namespace.
    pub namespace: String,
    /// Source metric name.
    pub metric_name: String,
    /// Series dimensions.
    pub dimensions: Vec<DimensionEntry>,
    /// Inclusive acceptable range.
    pub acceptable_bounds: BoundsEntry,
    /// Rise threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<f64>,
    /// Grouping title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Sampling period in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
    /// Statistic name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<String>,
    /// Watchers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<MentionsEntry>,
}

/// A `{ "Name", "Value" }` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionEntry {
    /// Dimension name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Dimension value.
    #[serde(rename = "Value")]
    pub value: String,
}

/// `{ "lower", "upper" }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsEntry {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

/// The `mentions` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionsEntry {
    /// Watchers tagged when the metric's title violates.
    #[serde(default)]
    pub title: Vec<WatcherEntry>,
}

/// One `{ "email", "name" }` watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherEntry {
    /// Recipient identity.
    pub email: String,
    /// Display name.
    pub name: String,
}

impl MetricEntry {
    /// Builds the validated spec for this entry.
    ///
    /// # Errors
    ///
    /// Returns the first `AlertError` raised by the spec builder.
    pub fn into_spec(self) -> cwatch_alerts::Result<MetricSpec> {
        let bounds = Bounds::new(self.acceptable_bounds.lower, self.acceptable_bounds.upper)?;
        let dimensions = self
            .dimensions
            .into_iter()
            .map(|d| Dimension::new(d.name, d.value))
            .collect();

        let mut builder = MetricSpec::builder(self.label, self.namespace, self.metric_name, bounds)
            .dimensions(dimensions);

        if let Some(diff) = self.diff {
            builder = builder.diff_threshold(diff);
        }
        if let Some(title) = self.title {
            builder = builder.title(title);
        }
        if let Some(period) = self.period {
            builder = builder.period_secs(period);
        }
        if let Some(stat) = self.stat {
            builder = builder.statistic(stat);
        }
        for watcher in self.mentions.unwrap_or_default().title {
            builder = builder.watcher(Watcher::new(&watcher.email, &watcher.name)?);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_into_spec_applies_defaults() {
        let entry: MetricEntry = serde_json::from_str(
            r#"{
                "label": "cpu",
                "namespace": "AWS/EC2",
                "metric_name": "CPUUtilization",
                "dimensions": [{"Name": "InstanceId", "Value": "i-123"}],
                "acceptable_bounds": {"lower": 0, "upper": 80}
            }"#,
        )
        .unwrap();

        let spec = entry.into_spec().unwrap();
        assert_eq!(spec.title(), cwatch_alerts::DEFAULT_TITLE);
        assert_eq!(spec.statistic(), cwatch_alerts::DEFAULT_STATISTIC);
        assert_eq!(spec.period_secs(), cwatch_alerts::DEFAULT_PERIOD_SECS);
        assert_eq!(spec.dimensions, vec![Dimension::new("InstanceId", "i-123")]);
        assert!(spec.watchers.is_empty());
    }

    #[test]
    fn entry_into_spec_trims_watchers() {
        let entry: MetricEntry = serde_json::from_str(
            r#"{
                "label": "cpu",
                "namespace": "AWS/EC2",
                "metric_name": "CPUUtilization",
                "dimensions": [],
                "acceptable_bounds": {"lower": 0, "upper": 80},
                "diff": 10,
                "title": "Web",
                "period": 300,
                "stat": "Average",
                "mentions": {"title": [{"email": " ann@example.com ", "name": " Ann "}]}
            }"#,
        )
        .unwrap();

        let spec = entry.into_spec().unwrap();
        assert_eq!(spec.diff_threshold, Some(10.0));
        assert_eq!(spec.title(), "Web");
        assert_eq!(spec.period_secs(), 300);
        assert_eq!(spec.statistic(), "Average");
        assert_eq!(spec.watchers[0].identity(), "ann@example.com");
        assert_eq!(spec.watchers[0].display_name(), "Ann");
    }

    #[test]
    fn optional_fields_are_not_serialized_when_absent() {
        let entry = MetricEntry {
            label: "cpu".to_string(),
            namespace: "AWS/EC2".to_string(),
            metric_name: "CPUUtilization".to_string(),
            dimensions: Vec::new(),
            acceptable_bounds: BoundsEntry {
                lower: 0.0,
                upper: 80.0,
            },
            diff: None,
            title: None,
            period: None,
            stat: None,
            mentions: None,
        };

        let json = serde_json::to_value(&entry).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 5);
    }
}
