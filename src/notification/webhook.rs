//! Webhook notification implementation.
//!
//! Posts the alert as JSON to the channel URL, optionally signed with an
//! HMAC-SHA256 of the payload.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use sha2::Sha256;
use url::Url;

use super::{AlertMessage, Notifier, error::NotificationError};
use crate::config::WebhookChannelConfig;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Delivers alerts to a generic JSON webhook.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: Url,
    client: Arc<ClientWithMiddleware>,
    secret: Option<String>,
    headers: HeaderMap,
}

impl WebhookNotifier {
    /// Creates a notifier for `config`. Header names and values are validated
    /// here so a bad channel fails at startup rather than on first alert.
    pub fn new(
        config: &WebhookChannelConfig,
        client: Arc<ClientWithMiddleware>,
    ) -> Result<Self, NotificationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                NotificationError::ConfigError(format!("Invalid header name: {key}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                NotificationError::ConfigError(format!("Invalid header value for {key}: {e}"))
            })?;
            headers.insert(name, value);
        }

        if config.secret.as_deref() == Some("") {
            return Err(NotificationError::ConfigError(
                "Invalid secret: cannot be empty.".to_string(),
            ));
        }

        Ok(Self { url: config.url.clone(), client, secret: config.secret.clone(), headers })
    }

    /// Signs `body` with `secret`, returning the hex signature and the
    /// millisecond timestamp that was mixed into it.
    pub fn sign_payload(secret: &str, body: &str) -> Result<(String, String), NotificationError> {
        let timestamp = Utc::now().timestamp_millis();

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| NotificationError::ConfigError(format!("Invalid secret: {e}")))?;
        mac.update(format!("{body}{timestamp}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok((signature, timestamp.to_string()))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &AlertMessage) -> Result<(), NotificationError> {
        let body = serde_json::to_string(message).map_err(|e| {
            NotificationError::InternalError(format!("Failed to serialize payload: {e}"))
        })?;

        let mut headers = self.headers.clone();
        if let Some(secret) = &self.secret {
            let (signature, timestamp) = Self::sign_payload(secret, &body)?;
            headers.insert(
                HeaderName::from_static("x-signature"),
                HeaderValue::from_str(&signature).map_err(|e| {
                    NotificationError::InternalError(format!("Invalid signature value: {e}"))
                })?,
            );
            headers.insert(
                HeaderName::from_static("x-timestamp"),
                HeaderValue::from_str(&timestamp).map_err(|e| {
                    NotificationError::InternalError(format!("Invalid timestamp value: {e}"))
                })?,
            );
        }

        let response =
            self.client.post(self.url.clone()).headers(headers).body(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::NotifyFailed(format!(
                "Webhook request failed with status: {status}"
            )));
        }

        Ok(())
    }
}
