//! Output formatting for CLI commands.
//!
//! Supports text (human-readable) and JSON output formats.

use std::io::Write;

use cwatch_alerts::{MessageEnvelope, MetricSpec};
use cwatch_config::MetricsConfig;
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both text and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TextDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Text => {
                value.write_text(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TextDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}

/// Trait for types that have a human-readable text form.
pub trait TextDisplay {
    /// Write the value as human-readable text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// One title and its metrics, as reported by `check`.
#[derive(Debug, Clone, Serialize)]
pub struct TitleGroup {
    /// Group title.
    pub title: String,
    /// Metrics in configuration order.
    pub metrics: Vec<MetricSpec>,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// The file that was checked.
    pub path: String,
    /// Number of metrics tracked.
    pub metric_count: usize,
    /// Metrics grouped by title.
    pub groups: Vec<TitleGroup>,
    #[serde(skip)]
    text: String,
}

impl ConfigSummary {
    /// Summarizes a loaded configuration.
    #[must_use]
    pub fn new(config: &MetricsConfig) -> Self {
        let groups = config
            .grouped()
            .into_iter()
            .map(|(title, specs)| TitleGroup {
                title: title.to_string(),
                metrics: specs.into_iter().cloned().collect(),
            })
            .collect();

        Self {
            path: config
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            metric_count: config.len(),
            groups,
            text: config.grouped_summary(),
        }
    }
}

impl TextDisplay for ConfigSummary {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.metric_count == 0 {
            writeln!(writer, "No metrics configured in {}", self.path)?;
            return Ok(());
        }
        write!(writer, "{}", self.text)?;
        writeln!(writer)?;
        writeln!(writer, "{} metric(s) OK", self.metric_count)?;
        Ok(())
    }
}

/// The card built by a single cycle.
///
/// JSON output is the exact payload posted to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct CardOutput {
    #[serde(flatten)]
    envelope: MessageEnvelope,
    #[serde(skip)]
    text: String,
}

impl CardOutput {
    /// Pairs a message with its plain-text rendering.
    #[must_use]
    pub fn new(envelope: MessageEnvelope, text: impl Into<String>) -> Self {
        Self {
            envelope,
            text: text.into(),
        }
    }

    /// Returns the message.
    #[must_use]
    pub const fn envelope(&self) -> &MessageEnvelope {
        &self.envelope
    }
}

impl TextDisplay for CardOutput {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write!(writer, "{}", self.text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwatch_alerts::Digest;

    const CONFIG: &str = r#"{"metrics": [
        {
            "label": "cpu",
            "namespace": "AWS/RDS",
            "metric_name": "CPUUtilization",
            "dimensions": [],
            "acceptable_bounds": {"lower": 0, "upper": 80},
            "diff": 10,
            "title": "DB"
        }
    ]}"#;

    #[test]
    fn config_summary_text() {
        let config = MetricsConfig::from_json_str(CONFIG).unwrap();
        let out = OutputFormat::new(Format::Text)
            .to_string(&ConfigSummary::new(&config))
            .unwrap();

        assert!(out.starts_with(
            "Tracking metrics (grouped):\n  DB\n    - cpu :: AWS/RDS/CPUUtilization"
        ));
        assert!(out.ends_with("1 metric(s) OK\n"));
    }

    #[test]
    fn config_summary_json() {
        let config = MetricsConfig::from_json_str(CONFIG).unwrap();
        let out = OutputFormat::new(Format::Json)
            .to_string(&ConfigSummary::new(&config))
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["metric_count"], 1);
        assert_eq!(value["groups"][0]["title"], "DB");
        assert_eq!(value["groups"][0]["metrics"][0]["label"], "cpu");
        assert!(value.get("text").is_none());
    }

    #[test]
    fn empty_config_summary_text() {
        let config = MetricsConfig::from_json_str(r#"{"metrics": []}"#).unwrap();
        let out = OutputFormat::default().to_string(&ConfigSummary::new(&config)).unwrap();
        assert!(out.starts_with("No metrics configured"));
    }

    #[test]
    fn card_output_json_is_the_envelope() {
        let envelope = MessageEnvelope::from_digest(&Digest::default());
        let output = CardOutput::new(envelope.clone(), "");

        let out = OutputFormat::new(Format::Json).to_string(&output).unwrap();
        let parsed: MessageEnvelope = serde_json::from_str(&out).unwrap();
        assert_eq!(&parsed, output.envelope());
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn card_output_text() {
        let envelope = MessageEnvelope::from_digest(&Digest::default());
        let output = CardOutput::new(envelope, "Web\n  - cpu\n");
        assert_eq!(
            OutputFormat::new(Format::Text).to_string(&output).unwrap(),
            "Web\n  - cpu\n"
        );
    }
}
