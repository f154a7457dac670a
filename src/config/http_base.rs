use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration;

fn default_idle_per_host() -> usize {
    10
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Connection-level settings shared by every pooled HTTP client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BaseHttpClientConfig {
    /// Maximum idle connections per host
    #[serde(default = "default_idle_per_host")]
    pub max_idle_per_host: usize,

    /// Timeout for idle connections
    #[serde(default = "default_idle_timeout", deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,

    /// Timeout for establishing connections
    #[serde(default = "default_connect_timeout", deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,
}

impl Default for BaseHttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_idle_per_host(),
            idle_timeout: default_idle_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}
