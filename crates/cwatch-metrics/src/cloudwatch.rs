//! Amazon CloudWatch metric source.
//!
//! All specs are fetched with `GetMetricData`, one query per spec, split into
//! batches of at most [`MAX_QUERIES_PER_REQUEST`]. For every returned series
//! the latest (timestamp, value) pair wins.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::error::DisplayErrorContext;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{Dimension, Metric, MetricDataQuery, MetricStat, ScanBy};
use chrono::{DateTime, Utc};
use cwatch_alerts::{MetricSpec, Sample, SampleSet};
use tracing::{debug, info, warn};

use crate::error::{MetricsError, Result};
use crate::source::{LookbackWindow, MetricSource};

/// `GetMetricData` accepts at most this many queries per call.
pub const MAX_QUERIES_PER_REQUEST: usize = 500;

/// Default operation timeout for CloudWatch calls.
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`CloudWatchSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudWatchConfig {
    /// Named credentials profile; the default chain is used when unset.
    pub profile: Option<String>,
    /// Region; the profile or environment region is used when unset.
    pub region: Option<String>,
    /// Timeout for one API operation, retries included.
    pub operation_timeout: Duration,
}

impl Default for CloudWatchConfig {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
        }
    }
}

/// One series returned by the service, converted to plain types.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesResult {
    /// The query id the series answers.
    pub id: String,
    /// Datapoint timestamps.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Datapoint values, parallel to `timestamps`.
    pub values: Vec<f64>,
}

/// Fetches samples from CloudWatch.
#[derive(Debug, Clone)]
pub struct CloudWatchSource {
    client: Client,
}

impl CloudWatchSource {
    /// Builds a client from the shared AWS configuration chain.
    pub async fn connect(config: &CloudWatchConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(config.operation_timeout)
                .build(),
        );
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }

        let sdk_config = loader.load().await;
        info!(
            profile = config.profile.as_deref().unwrap_or("default"),
            region = ?sdk_config.region().map(ToString::to_string),
            "CloudWatch client ready"
        );

        Self::from_client(Client::new(&sdk_config))
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_batch(
        &self,
        queries: Vec<MetricDataQuery>,
        window: LookbackWindow,
    ) -> Result<Vec<SeriesResult>> {
        let mut series = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .get_metric_data()
                .set_metric_data_queries(Some(queries.clone()))
                .start_time(to_aws_time(window.start()))
                .end_time(to_aws_time(window.end()))
                .scan_by(ScanBy::TimestampAscending)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| MetricsError::FetchFailed {
                    source_name: "cloudwatch".to_string(),
                    reason: DisplayErrorContext(&e).to_string(),
                })?;

            for result in output.metric_data_results() {
                let Some(id) = result.id() else {
                    continue;
                };
                series.push(convert_series(id, result.timestamps(), result.values()));
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(series)
    }
}

#[async_trait]
impl MetricSource for CloudWatchSource {
    fn name(&self) -> &str {
        "cloudwatch"
    }

    async fn fetch(&self, specs: &[MetricSpec], window: LookbackWindow) -> Result<SampleSet> {
        if specs.is_empty() {
            return Ok(SampleSet::new());
        }

        let queries = build_queries(specs)?;
        let mut series = Vec::new();
        for batch in queries.chunks(MAX_QUERIES_PER_REQUEST) {
            debug!(queries = batch.len(), "requesting metric data");
            series.extend(self.fetch_batch(batch.to_vec(), window).await?);
        }

        Ok(samples_from_series(specs, &series))
    }
}

/// Returns the query id used for the spec at `index`.
#[must_use]
pub fn query_id(index: usize) -> String {
    format!("m{index}")
}

/// Builds one `GetMetricData` query per spec, in spec order.
///
/// # Errors
///
/// Returns `MetricsError::InvalidQuery` if the SDK rejects a query.
pub fn build_queries(specs: &[MetricSpec]) -> Result<Vec<MetricDataQuery>> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| build_query(index, spec))
        .collect()
}

fn build_query(index: usize, spec: &MetricSpec) -> Result<MetricDataQuery> {
    let invalid = |reason: String| MetricsError::InvalidQuery {
        label: spec.label.clone(),
        reason,
    };

    let dimensions = spec
        .dimensions
        .iter()
        .map(|d| {
            Ok(Dimension::builder()
                .name(&d.name)
                .value(&d.value)
                .build())
        })
        .collect::<Result<Vec<_>>>()?;

    let metric = Metric::builder()
        .namespace(&spec.namespace)
        .metric_name(&spec.metric_name)
        .set_dimensions(Some(dimensions))
        .build();

    let period = i32::try_from(spec.period_secs())
        .map_err(|_| invalid(format!("period {} is too large", spec.period_secs())))?;

    let stat = MetricStat::builder()
        .metric(metric)
        .period(period)
        .stat(spec.statistic())
        .build();

    Ok(MetricDataQuery::builder()
        .id(query_id(index))
        .metric_stat(stat)
        .return_data(true)
        .build())
}

/// Converts one service series, keeping every timestamp paired with its
/// value. Datapoints whose timestamp is out of range are dropped as a pair.
#[must_use]
pub fn convert_series(id: &str, timestamps: &[AwsDateTime], values: &[f64]) -> SeriesResult {
    let (timestamps, values): (Vec<_>, Vec<_>) = timestamps
        .iter()
        .zip(values.iter().copied())
        .filter_map(|(ts, value)| from_aws_time(ts).map(|ts| (ts, value)))
        .unzip();

    SeriesResult {
        id: id.to_string(),
        timestamps,
        values,
    }
}

/// Picks the latest (timestamp, value) pair of a series.
///
/// Ties on the timestamp go to the larger value. Extra timestamps or values
/// without a partner are ignored.
#[must_use]
pub fn latest_point(timestamps: &[DateTime<Utc>], values: &[f64]) -> Option<(DateTime<Utc>, f64)> {
    timestamps
        .iter()
        .copied()
        .zip(values.iter().copied())
        .max_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)))
}

/// Turns service results into one sample per spec.
///
/// Specs without a series, or whose series is empty, read as no data.
/// Series with an unknown id are skipped.
#[must_use]
pub fn samples_from_series(specs: &[MetricSpec], series: &[SeriesResult]) -> SampleSet {
    let labels: HashMap<String, &str> = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| (query_id(index), spec.label.as_str()))
        .collect();

    let mut latest: HashMap<&str, (DateTime<Utc>, f64)> = HashMap::new();
    for result in series {
        let Some(label) = labels.get(&result.id).copied() else {
            warn!(id = %result.id, "ignoring series with unknown query id");
            continue;
        };
        if let Some(point) = latest_point(&result.timestamps, &result.values) {
            let newer = latest.get(label).is_none_or(|current| point.0 >= current.0);
            if newer {
                latest.insert(label, point);
            }
        }
    }

    specs
        .iter()
        .map(|spec| match latest.get(spec.label.as_str()) {
            Some((ts, value)) => Sample::known(spec.label.clone(), *ts, *value),
            None => Sample::unknown(spec.label.clone()),
        })
        .collect()
}

fn to_aws_time(ts: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_millis(ts.timestamp_millis())
}

fn from_aws_time(ts: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}
