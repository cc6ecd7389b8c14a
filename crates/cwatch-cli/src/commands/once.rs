//! `cwatch once`: run a single cycle and print the card.

use std::io::Write;
use std::path::{Path, PathBuf};

use cwatch_alerts::DigestManager;
use cwatch_config::MetricsConfig;
use tracing::info;

use super::{build_channel, build_source};
use crate::cli::OnceArgs;
use crate::driver::{DriverConfig, FetchErrorPolicy, Poller};
use crate::error::{CliError, Result};
use crate::output::{CardOutput, OutputFormat};

/// Evaluates every metric once, prints the card and posts it if a
/// channel is configured.
#[derive(Debug, Clone)]
pub struct OnceCommand {
    config_path: PathBuf,
}

impl OnceCommand {
    /// Create a new once command.
    #[must_use]
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Execute the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or sample file cannot be
    /// loaded, a sample is malformed, or a channel rejects the card.
    pub async fn execute<W: Write>(&self, out: &mut W, args: &OnceArgs) -> Result<()> {
        let config = MetricsConfig::from_file(&self.config_path)?;
        let mut manager =
            DigestManager::with_config(config.into_specs(), args.digest.digest_config())?;
        if let Some(channel) = build_channel(&args.delivery)? {
            manager.add_channel(channel);
        }

        let source = build_source(&args.source).await?;
        let mut poller = Poller::new(
            manager,
            source,
            DriverConfig {
                lookback: args.source.lookback(),
                on_fetch_error: FetchErrorPolicy::EvaluateUnknown,
            },
        );

        let outcome = poller.run_cycle().await?;
        if let Some(message) = outcome.message.clone() {
            let output = CardOutput::new(message, outcome.text.as_str());
            OutputFormat::new(args.format).write(out, &output)?;
        }

        if !outcome.delivered() {
            let reasons: Vec<String> = outcome.failures().map(ToString::to_string).collect();
            return Err(CliError::DeliveryFailed(reasons.join("; ")));
        }
        info!(
            violating = outcome.counts.violating,
            unknown = outcome.counts.unknown,
            channels = outcome.deliveries.len(),
            "single cycle complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{DeliveryArgs, DigestArgs, Format, MentionScopeArg, SourceArgs, SuffixStyleArg};
    use cwatch_alerts::MessageEnvelope;
    use std::io::Write as _;
    use tempfile::TempDir;

    const CONFIG: &str = r#"{"metrics": [
        {"label": "cpu", "namespace": "AWS/EC2", "metric_name": "CPUUtilization",
         "dimensions": [{"Name": "InstanceId", "Value": "i-1"}],
         "acceptable_bounds": {"lower": 0, "upper": 80}, "title": "Web",
         "mentions": {"title": [{"email": "ann@example.com", "name": "Ann"}]}},
        {"label": "mem", "namespace": "CWAgent", "metric_name": "mem_used_percent",
         "dimensions": [], "acceptable_bounds": {"lower": 0, "upper": 90}, "title": "Web"}
    ]}"#;

    fn setup(samples: &str) -> (TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("metrics.json");
        let sample_file = dir.path().join("samples.json");
        std::fs::File::create(&config).unwrap().write_all(CONFIG.as_bytes()).unwrap();
        std::fs::File::create(&sample_file)
            .unwrap()
            .write_all(samples.as_bytes())
            .unwrap();
        (dir, config, sample_file)
    }

    fn args(samples: PathBuf, format: Format) -> OnceArgs {
        OnceArgs {
            source: SourceArgs {
                aws_profile: None,
                aws_region: None,
                aws_timeout: 30,
                lookback_minutes: 5,
                samples: Some(samples),
            },
            digest: DigestArgs {
                precision: 3,
                suffix_style: SuffixStyleArg::Combined,
                mention_scope: MentionScopeArg::Title,
            },
            delivery: DeliveryArgs {
                webhook_url: None,
                webhook_timeout: 5,
                dry_run: false,
            },
            format,
        }
    }

    #[tokio::test]
    async fn prints_card_with_mention() {
        let (_dir, config, samples) =
            setup(r#"{"cpu": {"timestamp": "2024-05-01T12:00:00Z", "value": 95.5}}"#);
        let mut out = Vec::new();

        OnceCommand::new(&config)
            .execute(&mut out, &args(samples, Format::Json))
            .await
            .unwrap();

        let envelope: MessageEnvelope = serde_json::from_slice(&out).unwrap();
        let card = envelope.card().unwrap();
        assert_eq!(card.body[0].text, "Web");
        assert_eq!(card.msteams.entities.len(), 1);
        assert_eq!(card.msteams.entities[0].text, "<at>Ann</at>");
    }

    #[tokio::test]
    async fn prints_digest_text() {
        let (_dir, config, samples) =
            setup(r#"{"cpu": {"timestamp": "2024-05-01T12:00:00Z", "value": 12.0}}"#);
        let mut out = Vec::new();

        OnceCommand::new(&config)
            .execute(&mut out, &args(samples, Format::Text))
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Web\n"));
        assert!(out.contains("cpu"));
        assert!(out.contains("mem"));
        assert!(!out.contains("Notifying"));
    }

    #[tokio::test]
    async fn unreachable_webhook_fails_the_command() {
        let (_dir, config, samples) = setup("{}");
        let mut args = args(samples, Format::Json);
        args.delivery.webhook_url = Some("http://127.0.0.1:9/hook".into());
        args.delivery.webhook_timeout = 2;

        let err = OnceCommand::new(&config)
            .execute(&mut Vec::new(), &args)
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::DeliveryFailed(_)));
    }
}
