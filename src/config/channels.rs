use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use super::HttpRetryConfig;

/// Notification channels scripts can address with `alert::send`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChannelsConfig {
    /// Generic JSON webhooks.
    #[serde(default)]
    pub webhook: Vec<WebhookChannelConfig>,
}

/// A JSON webhook channel.
#[derive(Debug, Deserialize, Clone)]
pub struct WebhookChannelConfig {
    /// Channel name.
    pub name: String,

    /// Target URL.
    pub url: Url,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// When set, requests carry an HMAC-SHA256 signature of the body in
    /// `x-signature` and the signing time in `x-timestamp`.
    #[serde(default)]
    pub secret: Option<String>,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}
