//! Per-metric evaluation.
//!
//! A metric's status for one cycle is decided from two independent checks:
//! - [`bounds_violated`]: the value left its inclusive acceptable range
//! - [`evaluate_diff`]: the value rose by at least the diff threshold since
//!   the last known reading
//!
//! [`resolve_status`] combines both into an [`EvaluationOutcome`] with a
//! rendered status line, and records the reading in the
//! [`PreviousValueStore`] used by the next cycle's diff check.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AlertError, Result};
use crate::types::{Bounds, MetricSpec, MetricStatus, Sample};

/// Marker rendered for metrics that are within bounds.
pub const OK_MARKER: &str = "✅";

/// Marker rendered for metrics in violation.
pub const VIOLATION_MARKER: &str = "‼️";

/// Returns true if `value` lies outside `bounds`. Both ends are acceptable.
#[must_use]
pub fn bounds_violated(value: f64, bounds: &Bounds) -> bool {
    !bounds.contains(value)
}

/// Outcome of the rate-of-change check.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiffCheck {
    /// Whether the rise met the threshold.
    pub violated: bool,
    /// `current - previous`, when both a threshold and a previous value exist.
    pub delta: Option<f64>,
}

/// Checks the rise from `previous` to `current` against `threshold`.
///
/// Only rises count: a drop of any size never violates. Without a threshold
/// or without a previous reading the check is a no-op.
#[must_use]
pub fn evaluate_diff(current: f64, previous: Option<f64>, threshold: Option<f64>) -> DiffCheck {
    match (previous, threshold) {
        (Some(previous), Some(threshold)) => {
            let delta = current - previous;
            DiffCheck {
                violated: delta >= threshold,
                delta: Some(delta),
            }
        }
        _ => DiffCheck::default(),
    }
}

/// The last known reading for every label seen so far.
///
/// Owned by the polling driver and lent to each cycle's evaluation. It only
/// ever grows or is overwritten with real readings; an unknown sample leaves
/// the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousValueStore {
    values: HashMap<String, f64>,
}

impl PreviousValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last known value for a label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<f64> {
        self.values.get(label).copied()
    }

    /// Records the latest reading for a label.
    pub fn record(&mut self, label: impl Into<String>, value: f64) {
        self.values.insert(label.into(), value);
    }

    /// Returns the number of labels with a stored value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// How violation details are appended to a status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixStyle {
    /// One suffix, present only for diff violations: `" (Δ+15.000)"`.
    #[default]
    Combined,
    /// One bracketed item per violation kind:
    /// `" [out of bounds] [Δ+15.000 ≥ 10.000]"`.
    Itemized,
}

/// Rendering choices for status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Fixed number of decimals for values and deltas.
    pub precision: usize,
    /// How violation details are shown.
    pub suffix_style: SuffixStyle,
}

impl RenderOptions {
    /// Largest supported precision.
    pub const MAX_PRECISION: usize = 6;

    /// Formats a number with the configured precision.
    ///
    /// Values that round to zero are rendered without a sign.
    #[must_use]
    pub fn format_number(&self, value: f64) -> String {
        let precision = self.precision.min(Self::MAX_PRECISION);
        let rendered = format!("{value:.precision$}");
        match rendered.strip_prefix('-') {
            Some(unsigned) if unsigned.chars().all(|c| c == '0' || c == '.') => {
                unsigned.to_string()
            }
            _ => rendered,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            precision: 3,
            suffix_style: SuffixStyle::Combined,
        }
    }
}

/// The verdict for one metric in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    /// The metric label.
    pub label: String,
    /// The metric's grouping title.
    pub title: String,
    /// The combined status.
    pub status: MetricStatus,
    /// The observed value, if any.
    pub value: Option<f64>,
    /// The value rounded for display, if any.
    pub display_value: Option<String>,
    /// The rise since the previous reading, when a diff check ran.
    pub delta: Option<f64>,
    /// Whether the value was outside its bounds.
    pub bounds_violated: bool,
    /// Whether the rise met the diff threshold.
    pub diff_violated: bool,
    /// The rendered status line, without any bullet prefix.
    pub line: String,
}

/// Evaluates one metric against its sample and the stored previous value.
///
/// An absent or unknown sample yields [`MetricStatus::Unknown`] and leaves
/// `store` untouched. A known sample is checked against bounds and the diff
/// threshold, then recorded in `store` whatever the verdict.
///
/// # Errors
///
/// Returns `AlertError::ContractViolation` if the sample value is not finite
/// or belongs to a different label. `store` is not modified in that case.
pub fn resolve_status(
    spec: &MetricSpec,
    sample: Option<&Sample>,
    store: &mut PreviousValueStore,
    options: &RenderOptions,
) -> Result<EvaluationOutcome> {
    let title = spec.title().to_string();

    let Some(value) = sample.and_then(Sample::reading) else {
        debug!(label = %spec.label, "no data for metric");
        return Ok(EvaluationOutcome {
            label: spec.label.clone(),
            title,
            status: MetricStatus::Unknown,
            value: None,
            display_value: None,
            delta: None,
            bounds_violated: false,
            diff_violated: false,
            line: format!("{} = NA", spec.label),
        });
    };

    check_sample(spec, sample, value)?;

    let out_of_bounds = bounds_violated(value, &spec.bounds);
    let diff = evaluate_diff(value, store.get(&spec.label), spec.diff_threshold);

    let status = if out_of_bounds || diff.violated {
        MetricStatus::Violation
    } else {
        MetricStatus::Ok
    };

    let display_value = options.format_number(value);
    let line = render_line(spec, status, &display_value, out_of_bounds, diff, options);

    debug!(
        label = %spec.label,
        value = value,
        previous = ?store.get(&spec.label),
        delta = ?diff.delta,
        status = %status,
        "evaluated metric"
    );

    store.record(spec.label.clone(), value);

    Ok(EvaluationOutcome {
        label: spec.label.clone(),
        title,
        status,
        value: Some(value),
        display_value: Some(display_value),
        delta: diff.delta,
        bounds_violated: out_of_bounds,
        diff_violated: diff.violated,
        line,
    })
}

/// Verifies that a sample can be evaluated for `spec`.
///
/// # Errors
///
/// Returns `AlertError::ContractViolation` for a mismatched label or a
/// non-finite value.
pub fn check_sample(spec: &MetricSpec, sample: Option<&Sample>, value: f64) -> Result<()> {
    if let Some(sample) = sample {
        if sample.label != spec.label {
            return Err(AlertError::ContractViolation {
                label: spec.label.clone(),
                reason: format!("sample belongs to '{}'", sample.label),
            });
        }
    }
    if !value.is_finite() {
        return Err(AlertError::ContractViolation {
            label: spec.label.clone(),
            reason: format!("value {value} is not a finite number"),
        });
    }
    Ok(())
}

fn render_line(
    spec: &MetricSpec,
    status: MetricStatus,
    display_value: &str,
    out_of_bounds: bool,
    diff: DiffCheck,
    options: &RenderOptions,
) -> String {
    if !status.is_violation() {
        return format!("{} {OK_MARKER} = {display_value}", spec.label);
    }

    let delta = diff.delta.filter(|_| diff.violated);
    let mut suffix = String::new();

    match options.suffix_style {
        SuffixStyle::Combined => {
            if let Some(delta) = delta {
                suffix.push_str(&format!(" (Δ+{})", options.format_number(delta)));
            }
        }
        SuffixStyle::Itemized => {
            if out_of_bounds {
                suffix.push_str(" [out of bounds]");
            }
            if let (Some(delta), Some(threshold)) = (delta, spec.diff_threshold) {
                suffix.push_str(&format!(
                    " [Δ+{} ≥ {}]",
                    options.format_number(delta),
                    options.format_number(threshold)
                ));
            }
        }
    }

    format!("{} {VIOLATION_MARKER} = {display_value}{suffix}", spec.label)
}
