//! Metric status evaluation and alert digest construction for cwatch.
//!
//! `cwatch-alerts` is the core of cwatch. Each polling cycle it checks every
//! configured metric against static bounds and an optional rise threshold,
//! groups the verdicts by title, works out which watchers to tag, and builds
//! a chat card that is posted to a webhook.
//!
//! # Features
//!
//! - **Bounds and diff checks**: inclusive bounds plus a rise-only delta
//!   threshold against the previous reading
//! - **Carried state**: a [`PreviousValueStore`] owned by the caller and lent
//!   to each cycle
//! - **Grouped digest**: one section per title in configuration order
//! - **Alert-gated mentions**: watchers are tagged only for titles that
//!   violated this cycle
//! - **Adaptive Card output**: ready-to-post envelope with mention entities
//!
//! # Example
//!
//! ```rust
//! use cwatch_alerts::{
//!     Bounds, DigestManager, MetricSpec, PreviousValueStore, Sample, SampleSet, Watcher,
//! };
//!
//! let spec = MetricSpec::builder("cpu", "AWS/EC2", "CPUUtilization", Bounds::new(0.0, 80.0).unwrap())
//!     .diff_threshold(10.0)
//!     .title("Web")
//!     .watcher(Watcher::new("ann@example.com", "Ann").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let manager = DigestManager::new(vec![spec]).unwrap();
//! let mut store = PreviousValueStore::new();
//!
//! let samples: SampleSet = [Sample::now("cpu", 92.5)].into_iter().collect();
//! let report = manager.evaluate(&samples, &mut store).unwrap();
//!
//! assert!(report.has_violation());
//! assert_eq!(report.digest.render_text(), "Web\n  - cpu ‼️ = 92.500\nNotifying: <at>Ann</at>\n");
//! assert_eq!(store.get("cpu"), Some(92.5));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod card;
pub mod channels;
pub mod digest;
pub mod error;
pub mod evaluator;
pub mod manager;
pub mod types;

// Re-export main types at crate root
pub use card::{AdaptiveCard, Attachment, MentionEntity, MessageEnvelope, TextBlock};
pub use channels::{
    LogChannel, NotificationChannel, NotificationResult, TeamsWebhookChannel, WebhookConfig,
};
pub use digest::{
    Aggregation, Digest, DigestBuilder, Group, GroupAggregator, Mention, MentionResolver,
    MentionScope, Recipient, RecipientSet,
};
pub use error::{AlertError, Result};
pub use evaluator::{
    EvaluationOutcome, PreviousValueStore, RenderOptions, SuffixStyle, bounds_violated,
    evaluate_diff, resolve_status,
};
pub use manager::{CycleReport, DigestConfig, DigestManager, StatusCounts};
pub use types::{
    Bounds, DEFAULT_PERIOD_SECS, DEFAULT_STATISTIC, DEFAULT_TITLE, Dimension, MetricSpec,
    MetricSpecBuilder, MetricStatus, Sample, SampleSet, Watcher,
};
