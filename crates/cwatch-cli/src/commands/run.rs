//! `cwatch run`: the long-running poller.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cwatch_alerts::DigestManager;
use cwatch_config::MetricsConfig;
use tracing::{info, warn};

use super::{build_channel, build_source};
use crate::cli::RunArgs;
use crate::driver::{DriverConfig, Poller};
use crate::error::{CliError, Result};

/// Polls metrics every interval and posts a digest each cycle until
/// interrupted.
#[derive(Debug, Clone)]
pub struct RunCommand {
    config_path: PathBuf,
}

impl RunCommand {
    /// Create a new run command.
    #[must_use]
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Execute the command.
    ///
    /// Writes the tracked-metrics listing to `out`, then runs cycles until
    /// Ctrl-C or `--max-cycles`. Failed cycles and deliveries are logged and
    /// do not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or no
    /// delivery target is configured.
    pub async fn execute<W: Write>(&self, out: &mut W, args: &RunArgs) -> Result<()> {
        let config = MetricsConfig::from_file(&self.config_path)?;
        let channel = build_channel(&args.delivery)?.ok_or_else(|| {
            CliError::InvalidArgument(
                "--webhook-url (or CWATCH_WEBHOOK_URL) is required unless --dry-run is set".into(),
            )
        })?;

        write!(out, "{}", config.grouped_summary())?;
        out.flush()?;

        let mut manager =
            DigestManager::with_config(config.into_specs(), args.digest.digest_config())?;
        manager.add_channel(channel);

        let source = build_source(&args.source).await?;
        info!(
            source = %source.name(),
            interval_secs = args.interval,
            lookback_minutes = args.source.lookback_minutes,
            "starting poller"
        );

        let mut poller = Poller::new(
            manager,
            source,
            DriverConfig {
                lookback: args.source.lookback(),
                on_fetch_error: args.fetch_error_policy(),
            },
        );
        let cycles = poller
            .run(Duration::from_secs(args.interval), args.max_cycles, shutdown_signal())
            .await;

        info!(cycles, "poller stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C; run until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{DeliveryArgs, DigestArgs, MentionScopeArg, SourceArgs, SuffixStyleArg};
    use std::io::Write as _;

    fn run_args(samples: Option<PathBuf>, dry_run: bool) -> RunArgs {
        RunArgs {
            source: SourceArgs {
                aws_profile: None,
                aws_region: None,
                aws_timeout: 30,
                lookback_minutes: 5,
                samples,
            },
            digest: DigestArgs {
                precision: 3,
                suffix_style: SuffixStyleArg::Combined,
                mention_scope: MentionScopeArg::Title,
            },
            delivery: DeliveryArgs {
                webhook_url: None,
                webhook_timeout: 5,
                dry_run,
            },
            interval: 1,
            skip_on_fetch_error: false,
            max_cycles: Some(1),
        }
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(content.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn dry_run_prints_listing_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(
            dir.path(),
            "metrics.json",
            r#"{"metrics": [{"label": "cpu", "namespace": "AWS/EC2", "metric_name": "CPUUtilization",
                "dimensions": [], "acceptable_bounds": {"lower": 0, "upper": 80}, "title": "Web"}]}"#,
        );
        let samples = write_file(
            dir.path(),
            "samples.json",
            r#"{"cpu": {"timestamp": "2024-05-01T12:00:00Z", "value": 5.0}}"#,
        );
        let mut out = Vec::new();

        RunCommand::new(&config)
            .execute(&mut out, &run_args(Some(samples), true))
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Tracking metrics (grouped):\n  Web\n"));
    }

    #[tokio::test]
    async fn webhook_required_without_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(dir.path(), "metrics.json", r#"{"metrics": []}"#);

        let err = RunCommand::new(&config)
            .execute(&mut Vec::new(), &run_args(None, false))
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
