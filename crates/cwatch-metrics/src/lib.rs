//! Metric sources for cwatch.
//!
//! A [`MetricSource`] reports, for every configured metric, the most recent
//! sample inside a [`LookbackWindow`]. Two sources are provided:
//!
//! - [`CloudWatchSource`]: Amazon CloudWatch through `GetMetricData`
//! - [`StaticSource`]: fixed readings, loaded from a JSON file or built in
//!   code, for offline rendering and tests
//!
//! # Example
//!
//! ```rust
//! use cwatch_alerts::{Bounds, MetricSpec};
//! use cwatch_metrics::{LookbackWindow, MetricSource, StaticSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let spec = MetricSpec::builder("cpu", "AWS/EC2", "CPUUtilization", Bounds::new(0.0, 80.0).unwrap())
//!     .build()
//!     .unwrap();
//!
//! let source = StaticSource::from_json_str(
//!     r#"{"cpu": {"timestamp": "2024-05-01T12:00:00Z", "value": 42.0}}"#,
//! )
//! .unwrap();
//!
//! let samples = source.fetch(&[spec], LookbackWindow::default()).await.unwrap();
//! assert_eq!(samples.get("cpu").and_then(|s| s.reading()), Some(42.0));
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cloudwatch;
pub mod error;
pub mod source;
pub mod static_source;

// Re-export main types at crate root
pub use cloudwatch::{CloudWatchConfig, CloudWatchSource, SeriesResult};
pub use error::{MetricsError, Result};
pub use source::{DEFAULT_LOOKBACK_MINUTES, LookbackWindow, MetricSource};
pub use static_source::{StaticReading, StaticSource};
