//! Notification channels for digest delivery.
//!
//! This module provides the [`NotificationChannel`] trait and its
//! implementations: an HTTP webhook channel that posts the card to a chat
//! incoming webhook, and a channel that only logs the card.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::card::MessageEnvelope;
use crate::error::{AlertError, Result};

/// Maximum number of response-body characters kept in a failure message.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Default request timeout for webhook delivery.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 15;

/// Result of sending a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    /// Whether the message was delivered.
    pub success: bool,
    /// The channel that processed this message.
    pub channel: String,
    /// Optional message or error description.
    pub message: Option<String>,
    /// Response status code (if applicable).
    pub status_code: Option<u16>,
}

impl NotificationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            status_code: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            status_code: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub const fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl fmt::Display for NotificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.success { "delivered" } else { "failed" };
        write!(f, "{}: {outcome}", self.channel)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {code})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Trait for notification channels.
///
/// Delivery problems that the remote end reports (bad status, unreachable
/// host, timeout) come back as a failed [`NotificationResult`]; `Err` is
/// reserved for local failures such as serialization.
#[async_trait]
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Sends a message through this channel.
    async fn send(&self, message: &MessageEnvelope) -> Result<NotificationResult>;

    /// Returns true if this channel is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Configuration for a webhook channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// The name of this webhook.
    pub name: String,
    /// The URL to post messages to.
    pub url: String,
    /// Extra HTTP headers to include with requests.
    pub headers: HashMap<String, String>,
    /// Timeout in seconds for HTTP requests.
    pub timeout_secs: u64,
    /// Whether proxy settings from the environment are honoured.
    pub system_proxy: bool,
    /// Whether this channel is enabled.
    pub enabled: bool,
}

impl WebhookConfig {
    /// Creates a new webhook configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the URL is empty or not an
    /// HTTP(S) URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(AlertError::InvalidChannel {
                reason: "webhook URL cannot be empty".to_string(),
            });
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AlertError::InvalidChannel {
                reason: format!("webhook URL must use http or https: {url}"),
            });
        }

        Ok(Self {
            name: name.into(),
            url,
            headers: HashMap::new(),
            timeout_secs: DEFAULT_WEBHOOK_TIMEOUT_SECS,
            system_proxy: true,
            enabled: true,
        })
    }

    /// Adds a header to the configuration.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets whether environment proxy settings are used.
    #[must_use]
    pub const fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.system_proxy = enabled;
        self
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Posts cards to a chat incoming webhook.
#[derive(Debug, Clone)]
pub struct TeamsWebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl TeamsWebhookChannel {
    /// Creates a new webhook channel with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` if the HTTP client cannot be
    /// built.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(|e| AlertError::InvalidChannel {
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self { config, client })
    }

    /// Returns the webhook URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Returns the channel configuration.
    #[must_use]
    pub const fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Formats the message as JSON.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SerializationError` if serialization fails.
    pub fn format_payload(&self, message: &MessageEnvelope) -> Result<String> {
        serde_json::to_string(message).map_err(AlertError::from)
    }
}

#[async_trait]
impl NotificationChannel for TeamsWebhookChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn send(&self, message: &MessageEnvelope) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel is disabled, skipping");
            return Ok(NotificationResult::success(self.name())
                .with_message("channel disabled, notification skipped"));
        }

        let payload = self.format_payload(message)?;
        debug!(channel = %self.name(), bytes = payload.len(), "posting card");

        let mut request = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        for (key, value) in &self.config.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(channel = %self.name(), error = %e, "webhook request failed");
                return Ok(NotificationResult::failure(
                    self.name(),
                    format!("request failed: {e}"),
                ));
            }
        };

        let status = response.status();
        if status.is_success() {
            info!(channel = %self.name(), status = status.as_u16(), "card delivered");
            return Ok(NotificationResult::success(self.name()).with_status_code(status.as_u16()));
        }

        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        warn!(
            channel = %self.name(),
            status = status.as_u16(),
            body = %excerpt,
            "webhook rejected card"
        );

        Ok(
            NotificationResult::failure(self.name(), format!("HTTP {status}: {excerpt}"))
                .with_status_code(status.as_u16()),
        )
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// A channel that logs the card for debugging and dry runs.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
    enabled: bool,
}

impl LogChannel {
    /// Creates a new log channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &MessageEnvelope) -> Result<NotificationResult> {
        if !self.is_enabled() {
            return Ok(NotificationResult::success(self.name()).with_message("channel disabled"));
        }

        let Some(card) = message.card() else {
            return Ok(NotificationResult::failure(self.name(), "message has no card"));
        };

        for block in &card.body {
            if block.is_heading() {
                info!(section = %block.text, "DIGEST");
            } else {
                info!(text = %block.text.trim_start(), "DIGEST");
            }
        }
        if !card.msteams.entities.is_empty() {
            debug!(mentions = card.msteams.entities.len(), "mention entities attached");
        }

        Ok(NotificationResult::success(self.name()).with_message("logged to tracing"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
