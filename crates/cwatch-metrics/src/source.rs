//! The metric source seam and the lookback window it is queried with.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cwatch_alerts::{MetricSpec, SampleSet};

use crate::error::{MetricsError, Result};

/// Default lookback window length in minutes.
pub const DEFAULT_LOOKBACK_MINUTES: i64 = 5;

/// The time range a fetch looks back over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl LookbackWindow {
    /// Creates a window from explicit bounds.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidWindow` if `start` is not before `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(MetricsError::InvalidWindow {
                reason: format!("start {start} must be before end {end}"),
            });
        }
        Ok(Self { start, end })
    }

    /// Creates a window of length `span` ending at `end`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidWindow` if `span` is not positive.
    pub fn ending_at(end: DateTime<Utc>, span: Duration) -> Result<Self> {
        Self::new(end - span, end)
    }

    /// Creates a window of length `span` ending now.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidWindow` if `span` is not positive.
    pub fn ending_now(span: Duration) -> Result<Self> {
        Self::ending_at(Utc::now(), span)
    }

    /// Creates a window of the last `minutes` minutes.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidWindow` if `minutes` is zero.
    pub fn last_minutes(minutes: u32) -> Result<Self> {
        Self::ending_now(Duration::minutes(i64::from(minutes)))
    }

    /// Returns the start of the window.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the end of the window.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns the window length.
    #[must_use]
    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// Returns true if `ts` falls inside the window (both ends inclusive).
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

impl Default for LookbackWindow {
    fn default() -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::minutes(DEFAULT_LOOKBACK_MINUTES),
            end,
        }
    }
}

/// Something that can report the latest sample of each configured metric.
///
/// Implementations return at most one sample per label, the most recent one
/// inside the window. Labels the source has no data for may be left out or
/// reported as unknown; both are treated as "no data".
#[async_trait]
pub trait MetricSource: Send + Sync + fmt::Debug {
    /// Returns the name of this source.
    fn name(&self) -> &str;

    /// Fetches the latest sample for every spec.
    async fn fetch(&self, specs: &[MetricSpec], window: LookbackWindow) -> Result<SampleSet>;
}
