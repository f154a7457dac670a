//! # Notification Service
//!
//! Scripts raise alerts with `alert::send(channel, text)`. The
//! [`NotificationService`] looks the channel up by name and hands the
//! [`AlertMessage`] to its [`Notifier`].
//!
//! Only generic JSON webhooks are built in. Channel-specific rendering
//! (Slack blocks, Telegram markup and so on) is left to whatever sits behind
//! the webhook.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;

use crate::{config::ChannelsConfig, http_client::HttpClientPool};

pub mod error;
mod webhook;

pub use error::NotificationError;
pub use webhook::WebhookNotifier;

/// Severity attached to an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Informational.
    #[default]
    Info,
    /// Needs attention.
    Warning,
    /// Needs attention now.
    Critical,
}

impl FromStr for AlertLevel {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(AlertLevel::Info),
            "warning" | "warn" => Ok(AlertLevel::Warning),
            "critical" | "error" => Ok(AlertLevel::Critical),
            other => Err(NotificationError::ConfigError(format!("unknown alert level '{other}'"))),
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        };
        f.write_str(level)
    }
}

/// An alert raised by a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    /// Target channel name.
    pub channel: String,
    /// Severity.
    pub level: AlertLevel,
    /// Message text.
    pub text: String,
    /// Script that raised the alert.
    pub script: Option<String>,
}

/// Delivers alerts to one channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message`.
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotificationError>;
}

/// A service responsible for dispatching alerts to named channels.
#[derive(Clone, Default)]
pub struct NotificationService {
    channels: HashMap<String, Arc<dyn Notifier>>,
}

impl NotificationService {
    /// Creates a service without channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a notifier for every configured channel.
    pub fn from_config(
        config: &ChannelsConfig,
        pool: &HttpClientPool,
    ) -> Result<Self, NotificationError> {
        let mut service = Self::new();
        for channel in &config.webhook {
            let client = pool.get_or_create(&channel.retry_policy)?;
            service.register(&channel.name, Arc::new(WebhookNotifier::new(channel, client)?))?;
        }
        tracing::info!(count = service.channels.len(), "Notification channels initialized.");
        Ok(service)
    }

    /// Adds a channel.
    pub fn register(
        &mut self,
        name: &str,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(), NotificationError> {
        if self.channels.contains_key(name) {
            return Err(NotificationError::DuplicateChannel(name.to_string()));
        }
        self.channels.insert(name.to_string(), notifier);
        Ok(())
    }

    /// Sends `message` to the channel it names.
    pub async fn send(&self, message: &AlertMessage) -> Result<(), NotificationError> {
        let notifier = self
            .channels
            .get(&message.channel)
            .ok_or_else(|| NotificationError::UnknownChannel(message.channel.clone()))?;

        notifier.notify(message).await.inspect_err(|e| {
            tracing::warn!(channel = %message.channel, error = %e, "Failed to send alert.");
        })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    fn alert(channel: &str) -> AlertMessage {
        AlertMessage {
            channel: channel.into(),
            level: AlertLevel::Warning,
            text: "cpu high".into(),
            script: None,
        }
    }

    #[tokio::test]
    async fn test_send_routes_to_channel() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().with(eq(alert("ops"))).times(1).returning(|_| Ok(()));

        let mut service = NotificationService::new();
        service.register("ops", Arc::new(notifier)).unwrap();

        service.send(&alert("ops")).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let service = NotificationService::new();
        let err = service.send(&alert("nowhere")).await.unwrap_err();
        assert_eq!(err.to_string(), "channel 'nowhere' not found");
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARN".parse::<AlertLevel>().unwrap(), AlertLevel::Warning);
        assert_eq!("critical".parse::<AlertLevel>().unwrap(), AlertLevel::Critical);
        assert!("loud".parse::<AlertLevel>().is_err());
    }
}
