use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{HttpRetryConfig, deserialize_duration};

fn default_query_timeout() -> Duration {
    Duration::from_secs(15)
}

/// All configured datasources, grouped by backend kind.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatasourcesConfig {
    /// Loki instances.
    #[serde(default)]
    pub loki: Vec<LokiConfig>,
}

/// Basic-auth credentials for an HTTP datasource.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// A single Loki datasource.
#[derive(Debug, Deserialize, Clone)]
pub struct LokiConfig {
    /// Name scripts use to address this datasource.
    pub name: String,

    /// Base URL of the Loki HTTP API.
    pub url: Url,

    /// Request timeout for a single query.
    #[serde(default = "default_query_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Optional basic auth.
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}
