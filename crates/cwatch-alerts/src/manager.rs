//! Digest manager driving one evaluation cycle.
//!
//! [`DigestManager`] owns the validated metric specs and the delivery
//! channels. Each call to [`DigestManager::evaluate`] is a function of the
//! specs, the cycle's samples and the caller's [`PreviousValueStore`]; it
//! produces a [`CycleReport`] holding every intermediate result and the final
//! [`Digest`].

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::card::MessageEnvelope;
use crate::channels::{NotificationChannel, NotificationResult};
use crate::digest::{
    Aggregation, Digest, DigestBuilder, GroupAggregator, MentionResolver, MentionScope,
    RecipientSet,
};
use crate::error::{AlertError, Result};
use crate::evaluator::{
    EvaluationOutcome, PreviousValueStore, RenderOptions, check_sample, resolve_status,
};
use crate::types::{MetricSpec, MetricStatus, SampleSet};

/// Configuration for the digest manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestConfig {
    /// How values and violation suffixes are rendered.
    pub render: RenderOptions,
    /// Which watchers are tagged for a violation.
    pub mention_scope: MentionScope,
}

/// Per-status counts for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Metrics evaluated.
    pub evaluated: usize,
    /// Metrics within bounds and below their diff threshold.
    pub ok: usize,
    /// Metrics with a violation.
    pub violating: usize,
    /// Metrics without data.
    pub unknown: usize,
}

impl StatusCounts {
    fn tally<'a>(outcomes: impl IntoIterator<Item = &'a EvaluationOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            counts.evaluated += 1;
            match outcome.status {
                MetricStatus::Ok => counts.ok += 1,
                MetricStatus::Violation => counts.violating += 1,
                MetricStatus::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

/// Everything one evaluation cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Per-metric verdicts in configuration order.
    pub outcomes: Vec<EvaluationOutcome>,
    /// Verdicts grouped by title.
    pub aggregation: Aggregation,
    /// Watchers to tag.
    pub recipients: RecipientSet,
    /// The assembled digest.
    pub digest: Digest,
    /// Status counts.
    pub counts: StatusCounts,
}

impl CycleReport {
    /// Returns true if any metric violated this cycle.
    #[must_use]
    pub fn has_violation(&self) -> bool {
        self.counts.violating > 0
    }

    /// Wraps the digest into the wire envelope.
    #[must_use]
    pub fn envelope(&self) -> MessageEnvelope {
        MessageEnvelope::from_digest(&self.digest)
    }
}

/// Evaluates metrics and delivers digests.
#[derive(Debug)]
pub struct DigestManager {
    config: DigestConfig,
    specs: Vec<MetricSpec>,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl DigestManager {
    /// Creates a manager with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::DuplicateLabel` if two specs share a label.
    pub fn new(specs: Vec<MetricSpec>) -> Result<Self> {
        Self::with_config(specs, DigestConfig::default())
    }

    /// Creates a manager with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::DuplicateLabel` if two specs share a label.
    pub fn with_config(specs: Vec<MetricSpec>, config: DigestConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.label.as_str()) {
                return Err(AlertError::DuplicateLabel {
                    label: spec.label.clone(),
                });
            }
        }

        Ok(Self {
            config,
            specs,
            channels: Vec::new(),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Returns the metric specs in configuration order.
    #[must_use]
    pub fn specs(&self) -> &[MetricSpec] {
        &self.specs
    }

    /// Adds a delivery channel.
    pub fn add_channel(&mut self, channel: Box<dyn NotificationChannel>) {
        info!(channel = %channel.name(), "added notification channel");
        self.channels.push(channel);
    }

    /// Returns the number of delivery channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Runs one evaluation pass.
    ///
    /// Every sample is checked before any verdict is computed, so a contract
    /// violation leaves `store` exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::ContractViolation` if a sample for a configured
    /// label is not a finite number.
    pub fn evaluate(
        &self,
        samples: &SampleSet,
        store: &mut PreviousValueStore,
    ) -> Result<CycleReport> {
        for spec in &self.specs {
            let sample = samples.get(&spec.label);
            if let Some(value) = sample.and_then(|s| s.reading()) {
                check_sample(spec, sample, value)?;
            }
        }

        for sample in samples.iter() {
            if !self.specs.iter().any(|s| s.label == sample.label) {
                debug!(label = %sample.label, "ignoring sample for unconfigured metric");
            }
        }

        let mut outcomes = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let outcome =
                resolve_status(spec, samples.get(&spec.label), store, &self.config.render)?;
            outcomes.push(outcome);
        }

        let aggregation = GroupAggregator::aggregate(&outcomes);
        let recipients =
            MentionResolver::new(self.config.mention_scope).resolve(&self.specs, &aggregation);
        let digest = DigestBuilder::new().build(&aggregation, &recipients);
        let counts = StatusCounts::tally(&outcomes);

        info!(
            evaluated = counts.evaluated,
            ok = counts.ok,
            violating = counts.violating,
            unknown = counts.unknown,
            recipients = recipients.len(),
            "evaluation cycle complete"
        );

        Ok(CycleReport {
            outcomes,
            aggregation,
            recipients,
            digest,
            counts,
        })
    }

    /// Sends a message through every enabled channel.
    ///
    /// Channel errors are folded into failed results; nothing is retried.
    pub async fn deliver(&self, message: &MessageEnvelope) -> Vec<NotificationResult> {
        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            if !channel.is_enabled() {
                debug!(channel = %channel.name(), "channel is disabled, skipping");
                continue;
            }

            let result = match channel.send(message).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(channel = %channel.name(), error = %e, "failed to send digest");
                    NotificationResult::failure(channel.name(), e.to_string())
                }
            };
            if !result.success {
                warn!(channel = %channel.name(), result = %result, "digest delivery failed");
            }
            results.push(result);
        }

        results
    }
}
