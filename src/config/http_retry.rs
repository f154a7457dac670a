use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{deserialize_duration, serialize_duration_to_ms};

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(200)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(5)
}

/// Serializable setting for jitter in retry policies
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// No jitter applied to the backoff duration
    None,
    /// Full jitter applied, randomizing the backoff duration
    #[default]
    Full,
}

/// Retry policy for outbound HTTP calls (datasources, webhooks, task gateway).
///
/// Uploads are not retried; `upload_timeout` bounds them instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HttpRetryConfig {
    /// Maximum number of retries for transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry
    #[serde(
        default = "default_initial_backoff",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub initial_backoff: Duration,

    /// Upper bound for the exponential backoff
    #[serde(
        default = "default_max_backoff",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub max_backoff: Duration,

    /// Jitter to apply to the backoff duration
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            jitter: JitterSetting::default(),
        }
    }
}
