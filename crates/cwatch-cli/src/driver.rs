//! The polling loop: fetch, evaluate, deliver, sleep.

use std::future::Future;
use std::time::Duration;

use cwatch_alerts::{
    DigestManager, MessageEnvelope, NotificationResult, PreviousValueStore, SampleSet,
    StatusCounts,
};
use cwatch_metrics::{LookbackWindow, MetricSource};
use tracing::{error, info, warn};

use crate::error::Result;

/// What to do with a cycle whose fetch failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchErrorPolicy {
    /// Evaluate an empty sample set, so every metric reports NA.
    #[default]
    EvaluateUnknown,
    /// Skip evaluation and delivery for this cycle.
    SkipCycle,
}

/// Settings for the poller.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Length of the window each fetch looks back over.
    pub lookback: chrono::Duration,
    /// Fetch failure handling.
    pub on_fetch_error: FetchErrorPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            lookback: chrono::Duration::minutes(cwatch_metrics::DEFAULT_LOOKBACK_MINUTES),
            on_fetch_error: FetchErrorPolicy::default(),
        }
    }
}

/// The result of one cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Status tallies; all zero for a skipped cycle.
    pub counts: StatusCounts,
    /// Number of watchers tagged.
    pub recipients: usize,
    /// The fetch error, if the fetch failed.
    pub fetch_error: Option<String>,
    /// The message built this cycle; `None` if the cycle was skipped.
    pub message: Option<MessageEnvelope>,
    /// Plain-text rendering of the digest; empty if the cycle was skipped.
    pub text: String,
    /// One result per enabled channel.
    pub deliveries: Vec<NotificationResult>,
}

impl CycleOutcome {
    fn skipped(cycle: u64, fetch_error: String) -> Self {
        Self {
            cycle,
            counts: StatusCounts::default(),
            recipients: 0,
            fetch_error: Some(fetch_error),
            message: None,
            text: String::new(),
            deliveries: Vec::new(),
        }
    }

    /// Returns true if evaluation and delivery were skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.message.is_none()
    }

    /// Returns true if every channel accepted the message.
    #[must_use]
    pub fn delivered(&self) -> bool {
        self.deliveries.iter().all(|r| r.success)
    }

    /// Returns the failed deliveries.
    pub fn failures(&self) -> impl Iterator<Item = &NotificationResult> {
        self.deliveries.iter().filter(|r| !r.success)
    }
}

/// Drives evaluation cycles against a metric source.
///
/// The poller owns the previous-value store, so diff checks compare each
/// cycle with the one before it for as long as the poller lives.
#[derive(Debug)]
pub struct Poller {
    manager: DigestManager,
    source: Box<dyn MetricSource>,
    store: PreviousValueStore,
    config: DriverConfig,
    cycles: u64,
}

impl Poller {
    /// Creates a poller with an empty previous-value store.
    #[must_use]
    pub fn new(
        manager: DigestManager,
        source: Box<dyn MetricSource>,
        config: DriverConfig,
    ) -> Self {
        Self {
            manager,
            source,
            store: PreviousValueStore::new(),
            config,
            cycles: 0,
        }
    }

    /// Returns the number of cycles started so far.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Returns the previous-value store.
    #[must_use]
    pub const fn store(&self) -> &PreviousValueStore {
        &self.store
    }

    /// Runs one fetch, evaluate and deliver cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if a sample breaks the evaluation contract. The
    /// store is left untouched in that case.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.cycles += 1;
        let cycle = self.cycles;
        let window = LookbackWindow::ending_now(self.config.lookback)?;

        let (samples, fetch_error) = match self.source.fetch(self.manager.specs(), window).await {
            Ok(samples) => (samples, None),
            Err(e) => {
                warn!(cycle, source = %self.source.name(), error = %e, "metric fetch failed");
                match self.config.on_fetch_error {
                    FetchErrorPolicy::SkipCycle => {
                        info!(cycle, "skipping cycle");
                        return Ok(CycleOutcome::skipped(cycle, e.to_string()));
                    }
                    FetchErrorPolicy::EvaluateUnknown => (SampleSet::new(), Some(e.to_string())),
                }
            }
        };

        let report = self.manager.evaluate(&samples, &mut self.store)?;
        let message = report.envelope();
        let deliveries = self.manager.deliver(&message).await;

        Ok(CycleOutcome {
            cycle,
            counts: report.counts,
            recipients: report.recipients.len(),
            fetch_error,
            text: report.digest.render_text(),
            message: Some(message),
            deliveries,
        })
    }

    /// Runs cycles until `max_cycles` is reached or `shutdown` resolves,
    /// sleeping `interval` after each cycle. Returns the number of cycles run.
    ///
    /// A failed cycle is logged and the loop carries on.
    pub async fn run<F>(&mut self, interval: Duration, max_cycles: Option<u64>, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            match self.run_cycle().await {
                Ok(outcome) => {
                    for failure in outcome.failures() {
                        warn!(cycle = outcome.cycle, result = %failure, "delivery failed");
                    }
                }
                Err(e) => error!(cycle = self.cycles, error = %e, "cycle failed"),
            }

            if max_cycles.is_some_and(|max| self.cycles >= max) {
                info!(cycles = self.cycles, "cycle limit reached");
                break;
            }

            tokio::select! {
                () = &mut shutdown => {
                    info!(cycles = self.cycles, "shutdown requested");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }
        }

        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use cwatch_alerts::{Bounds, MetricSpec, NotificationChannel, Sample, Watcher};
    use cwatch_metrics::{MetricsError, StaticSource};

    #[derive(Debug)]
    struct FailingSource;

    #[async_trait]
    impl MetricSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(
            &self,
            _specs: &[MetricSpec],
            _window: LookbackWindow,
        ) -> cwatch_metrics::Result<SampleSet> {
            Err(MetricsError::FetchFailed {
                source_name: "failing".into(),
                reason: "throttled".into(),
            })
        }
    }

    /// Answers each fetch with the next scripted reading; `None` fails the fetch.
    #[derive(Debug)]
    struct ScriptedSource {
        readings: Mutex<VecDeque<Option<f64>>>,
    }

    impl ScriptedSource {
        fn new(readings: impl IntoIterator<Item = Option<f64>>) -> Self {
            Self {
                readings: Mutex::new(readings.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl MetricSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(
            &self,
            specs: &[MetricSpec],
            _window: LookbackWindow,
        ) -> cwatch_metrics::Result<SampleSet> {
            match self.readings.lock().unwrap().pop_front().flatten() {
                Some(value) => Ok(specs
                    .iter()
                    .map(|spec| Sample::known(spec.label.clone(), Utc::now(), value))
                    .collect()),
                None => Err(MetricsError::FetchFailed {
                    source_name: "scripted".into(),
                    reason: "connection reset".into(),
                }),
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    struct RecordingChannel {
        sent: Arc<Mutex<Vec<MessageEnvelope>>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(
            &self,
            message: &MessageEnvelope,
        ) -> cwatch_alerts::Result<NotificationResult> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                Ok(NotificationResult::failure("recording", "HTTP 500: boom").with_status_code(500))
            } else {
                Ok(NotificationResult::success("recording").with_status_code(200))
            }
        }
    }

    fn specs() -> Vec<MetricSpec> {
        vec![
            MetricSpec::builder("cpu", "AWS/EC2", "CPUUtilization", Bounds::new(0.0, 80.0).unwrap())
                .title("Web")
                .diff_threshold(10.0)
                .watcher(Watcher::new("ann@example.com", "Ann").unwrap())
                .build()
                .unwrap(),
        ]
    }

    fn poller(
        source: Box<dyn MetricSource>,
        channel: RecordingChannel,
        policy: FetchErrorPolicy,
    ) -> Poller {
        let mut manager = DigestManager::new(specs()).unwrap();
        manager.add_channel(Box::new(channel));
        Poller::new(
            manager,
            source,
            DriverConfig {
                on_fetch_error: policy,
                ..DriverConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn cycle_evaluates_and_delivers() {
        let channel = RecordingChannel::default();
        let source = StaticSource::new().with_reading("cpu", Utc::now(), 95.0);
        let mut poller = poller(Box::new(source), channel.clone(), FetchErrorPolicy::default());

        let outcome = poller.run_cycle().await.unwrap();

        assert_eq!(outcome.cycle, 1);
        assert_eq!(outcome.counts.violating, 1);
        assert_eq!(outcome.recipients, 1);
        assert!(outcome.delivered());
        assert!(outcome.text.contains("<at>Ann</at>"));
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
        assert_eq!(poller.store().get("cpu"), Some(95.0));
    }

    #[tokio::test]
    async fn fetch_failure_reports_every_metric_unknown() {
        let channel = RecordingChannel::default();
        let mut poller = poller(
            Box::new(FailingSource),
            channel.clone(),
            FetchErrorPolicy::EvaluateUnknown,
        );

        let outcome = poller.run_cycle().await.unwrap();

        assert!(!outcome.is_skipped());
        assert!(outcome.fetch_error.as_deref().unwrap().contains("throttled"));
        assert_eq!(outcome.counts.unknown, 1);
        assert_eq!(outcome.recipients, 0);
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_last_known_value_for_next_diff() {
        let source = ScriptedSource::new([Some(50.0), None, Some(61.0)]);
        let mut poller = poller(
            Box::new(source),
            RecordingChannel::default(),
            FetchErrorPolicy::EvaluateUnknown,
        );

        let first = poller.run_cycle().await.unwrap();
        assert_eq!(first.counts.ok, 1);
        assert_eq!(poller.store().get("cpu"), Some(50.0));

        let gap = poller.run_cycle().await.unwrap();
        assert!(gap.fetch_error.is_some());
        assert!(gap.text.contains("  - cpu = NA\n"));
        assert_eq!(poller.store().get("cpu"), Some(50.0));

        let after = poller.run_cycle().await.unwrap();
        assert_eq!(after.counts.violating, 1);
        assert!(after.text.contains("  - cpu ‼️ = 61.000 (Δ+11.000)\n"));
        assert_eq!(poller.store().get("cpu"), Some(61.0));
    }

    #[tokio::test]
    async fn fetch_failure_can_skip_the_cycle() {
        let channel = RecordingChannel::default();
        let mut poller =
            poller(Box::new(FailingSource), channel.clone(), FetchErrorPolicy::SkipCycle);

        let outcome = poller.run_cycle().await.unwrap();

        assert!(outcome.is_skipped());
        assert!(outcome.deliveries.is_empty());
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_reported() {
        let channel = RecordingChannel {
            fail: true,
            ..RecordingChannel::default()
        };
        let source = StaticSource::new().with_reading("cpu", Utc::now(), 5.0);
        let mut poller = poller(Box::new(source), channel, FetchErrorPolicy::default());

        let outcome = poller.run_cycle().await.unwrap();

        assert!(!outcome.delivered());
        assert_eq!(outcome.failures().count(), 1);
    }

    #[tokio::test]
    async fn non_finite_sample_fails_the_cycle() {
        let source = StaticSource::new().with_reading("cpu", Utc::now(), f64::NAN);
        let mut poller =
            poller(Box::new(source), RecordingChannel::default(), FetchErrorPolicy::default());

        assert!(poller.run_cycle().await.is_err());
        assert_eq!(poller.store().get("cpu"), None);
    }

    #[tokio::test]
    async fn run_stops_at_cycle_limit() {
        let channel = RecordingChannel::default();
        let source = StaticSource::new().with_reading("cpu", Utc::now(), 5.0);
        let mut poller = poller(Box::new(source), channel.clone(), FetchErrorPolicy::default());

        let cycles = poller
            .run(Duration::from_millis(5), Some(3), std::future::pending())
            .await;

        assert_eq!(cycles, 3);
        assert_eq!(channel.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let source = StaticSource::new().with_reading("cpu", Utc::now(), 5.0);
        let mut poller =
            poller(Box::new(source), RecordingChannel::default(), FetchErrorPolicy::default());

        let cycles = poller
            .run(Duration::from_secs(3600), None, std::future::ready(()))
            .await;

        assert_eq!(cycles, 1);
    }
}
