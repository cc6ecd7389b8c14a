//! Command implementations.

mod check;
mod once;
mod run;

pub use check::CheckCommand;
pub use once::OnceCommand;
pub use run::RunCommand;

use cwatch_alerts::{LogChannel, NotificationChannel, TeamsWebhookChannel, WebhookConfig};
use cwatch_metrics::{CloudWatchSource, MetricSource, StaticSource};
use tracing::info;

use crate::cli::{DeliveryArgs, SourceArgs};
use crate::error::Result;

/// Name of the Teams channel in logs and results.
pub const TEAMS_CHANNEL_NAME: &str = "teams";

/// Builds the metric source: a sample file when given, CloudWatch otherwise.
pub(crate) async fn build_source(args: &SourceArgs) -> Result<Box<dyn MetricSource>> {
    if let Some(path) = &args.samples {
        info!(path = %path.display(), "replaying samples from file");
        return Ok(Box::new(StaticSource::from_file(path)?));
    }

    let source = CloudWatchSource::connect(&args.cloudwatch_config()).await;
    Ok(Box::new(source))
}

/// Builds the delivery channel, if any.
///
/// A dry run logs the card instead of posting it and wins over a webhook URL.
pub(crate) fn build_channel(args: &DeliveryArgs) -> Result<Option<Box<dyn NotificationChannel>>> {
    if args.dry_run {
        return Ok(Some(Box::new(LogChannel::new("dry-run"))));
    }

    let Some(url) = &args.webhook_url else {
        return Ok(None);
    };
    let config = WebhookConfig::new(TEAMS_CHANNEL_NAME, url.as_str())?
        .with_timeout_secs(args.webhook_timeout);
    Ok(Some(Box::new(TeamsWebhookChannel::new(config)?)))
}
