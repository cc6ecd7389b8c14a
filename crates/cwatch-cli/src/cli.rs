//! Command-line argument parsing with clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cwatch_alerts::{DigestConfig, MentionScope, RenderOptions, SuffixStyle};
use cwatch_metrics::CloudWatchConfig;

use crate::driver::FetchErrorPolicy;

/// Poll CloudWatch metrics and post grouped status digests to Microsoft Teams.
#[derive(Parser, Debug, Clone)]
#[command(name = "cwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Metrics configuration file.
    #[arg(
        short,
        long,
        env = "CWATCH_CONFIG",
        default_value = cwatch_config::DEFAULT_CONFIG_FILE,
        global = true
    )]
    pub config: PathBuf,

    /// Log output format.
    #[arg(
        long,
        value_enum,
        env = "CWATCH_LOG_FORMAT",
        default_value_t = LogFormat::Pretty,
        global = true
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Command output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll metrics forever and post a digest every cycle.
    Run(RunArgs),

    /// Run a single cycle and print the card.
    Once(OnceArgs),

    /// Validate the configuration and list the tracked metrics.
    Check(CheckArgs),
}

/// Where samples come from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// AWS named profile for credentials.
    #[arg(long, env = "AWS_PROFILE")]
    pub aws_profile: Option<String>,

    /// AWS region for CloudWatch.
    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,

    /// CloudWatch operation timeout in seconds.
    #[arg(long, default_value_t = cwatch_metrics::cloudwatch::DEFAULT_OPERATION_TIMEOUT_SECS)]
    pub aws_timeout: u64,

    /// Minutes to look back for the latest datapoint.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub lookback_minutes: u32,

    /// Replay readings from a JSON file instead of querying CloudWatch.
    #[arg(long, value_name = "FILE")]
    pub samples: Option<PathBuf>,
}

impl SourceArgs {
    /// Returns the CloudWatch connection settings.
    #[must_use]
    pub fn cloudwatch_config(&self) -> CloudWatchConfig {
        CloudWatchConfig {
            profile: self.aws_profile.clone(),
            region: self.aws_region.clone(),
            operation_timeout: Duration::from_secs(self.aws_timeout),
        }
    }

    /// Returns the lookback window length.
    #[must_use]
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lookback_minutes))
    }
}

/// How the digest is rendered and who is tagged.
#[derive(Args, Debug, Clone)]
pub struct DigestArgs {
    /// Decimal places for values and deltas.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub precision: u8,

    /// How violation details are appended to a line.
    #[arg(long, value_enum, default_value_t = SuffixStyleArg::Combined)]
    pub suffix_style: SuffixStyleArg,

    /// Which watchers are tagged when a metric violates.
    #[arg(long, value_enum, default_value_t = MentionScopeArg::Title)]
    pub mention_scope: MentionScopeArg,
}

impl DigestArgs {
    /// Returns the engine configuration.
    #[must_use]
    pub fn digest_config(&self) -> DigestConfig {
        DigestConfig {
            render: RenderOptions {
                precision: usize::from(self.precision),
                suffix_style: self.suffix_style.into(),
            },
            mention_scope: self.mention_scope.into(),
        }
    }
}

/// Suffix style options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuffixStyleArg {
    /// Only the rise, as ` (Δ+x)`.
    Combined,
    /// Every violation kind listed separately.
    Itemized,
}

impl From<SuffixStyleArg> for SuffixStyle {
    fn from(arg: SuffixStyleArg) -> Self {
        match arg {
            SuffixStyleArg::Combined => Self::Combined,
            SuffixStyleArg::Itemized => Self::Itemized,
        }
    }
}

/// Mention scope options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MentionScopeArg {
    /// Every watcher of a violating title.
    Title,
    /// Only watchers of the violating metrics.
    Metric,
}

impl From<MentionScopeArg> for MentionScope {
    fn from(arg: MentionScopeArg) -> Self {
        match arg {
            MentionScopeArg::Title => Self::Title,
            MentionScopeArg::Metric => Self::Metric,
        }
    }
}

/// Where the digest is posted.
#[derive(Args, Debug, Clone)]
pub struct DeliveryArgs {
    /// Teams incoming webhook or Workflows URL.
    #[arg(long, env = "CWATCH_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds.
    #[arg(long, default_value_t = cwatch_alerts::channels::DEFAULT_WEBHOOK_TIMEOUT_SECS)]
    pub webhook_timeout: u64,

    /// Log the digest instead of posting it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Metric source options.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Digest options.
    #[command(flatten)]
    pub digest: DigestArgs,

    /// Delivery options.
    #[command(flatten)]
    pub delivery: DeliveryArgs,

    /// Seconds to wait between cycles.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Skip the cycle instead of reporting every metric as NA when the fetch fails.
    #[arg(long)]
    pub skip_on_fetch_error: bool,

    /// Stop after this many cycles.
    #[arg(long, value_name = "N")]
    pub max_cycles: Option<u64>,
}

impl RunArgs {
    /// Returns the fetch failure policy.
    #[must_use]
    pub const fn fetch_error_policy(&self) -> FetchErrorPolicy {
        if self.skip_on_fetch_error {
            FetchErrorPolicy::SkipCycle
        } else {
            FetchErrorPolicy::EvaluateUnknown
        }
    }
}

/// Arguments for the once command.
#[derive(Args, Debug, Clone)]
pub struct OnceArgs {
    /// Metric source options.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Digest options.
    #[command(flatten)]
    pub digest: DigestArgs,

    /// Delivery options.
    #[command(flatten)]
    pub delivery: DeliveryArgs,

    /// Output format: the card JSON or the digest as text.
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    pub format: Format,
}

/// Arguments for the check command.
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_check_with_defaults() {
        let cli = Cli::try_parse_from(["cwatch", "check"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("metrics.json"));
        assert_eq!(cli.log_format, LogFormat::Pretty);
        match cli.command {
            Commands::Check(args) => assert_eq!(args.format, Format::Text),
            other => panic!("expected check, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_run_options() {
        let cli = Cli::try_parse_from([
            "cwatch",
            "run",
            "--config",
            "/etc/cwatch/metrics.json",
            "--aws-profile",
            "prod",
            "--aws-region",
            "ap-northeast-1",
            "--webhook-url",
            "https://example.com/hook",
            "--interval",
            "30",
            "--skip-on-fetch-error",
            "--precision",
            "1",
            "--suffix-style",
            "itemized",
            "--mention-scope",
            "metric",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/cwatch/metrics.json"));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.interval, 30);
        assert_eq!(args.fetch_error_policy(), FetchErrorPolicy::SkipCycle);
        assert_eq!(args.source.cloudwatch_config().profile.as_deref(), Some("prod"));
        assert_eq!(args.delivery.webhook_url.as_deref(), Some("https://example.com/hook"));

        let config = args.digest.digest_config();
        assert_eq!(config.render.precision, 1);
        assert_eq!(config.render.suffix_style, SuffixStyle::Itemized);
        assert_eq!(config.mention_scope, MentionScope::Metric);
    }

    #[test]
    fn once_defaults_to_json_output() {
        let cli =
            Cli::try_parse_from(["cwatch", "once", "--samples", "s.json", "--dry-run"]).unwrap();
        let Commands::Once(args) = cli.command else {
            panic!("expected once");
        };
        assert_eq!(args.format, Format::Json);
        assert!(args.delivery.dry_run);
        assert_eq!(args.source.samples, Some(PathBuf::from("s.json")));
        assert_eq!(args.source.lookback(), chrono::Duration::minutes(5));
        assert_eq!(args.digest.digest_config(), DigestConfig::default());
    }

    #[test]
    fn precision_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["cwatch", "once", "--precision", "7"]).is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        assert!(Cli::try_parse_from(["cwatch", "run", "--interval", "0"]).is_err());
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["cwatch", "check", "-c", "other.json"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.json"));
    }
}
