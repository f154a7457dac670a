//! Configuration module for vigil.

mod app_config;
mod channels;
mod datasources;
mod helpers;
mod http_base;
mod http_retry;
mod rhai;
mod server;
mod upload;
mod workers;

pub use app_config::AppConfig;
pub use channels::{ChannelsConfig, WebhookChannelConfig};
pub use datasources::{BasicAuth, DatasourcesConfig, LokiConfig};
pub use helpers::{
    deserialize_duration, deserialize_duration_from_ms, parse_duration, serialize_duration_to_ms,
};
pub use http_base::BaseHttpClientConfig;
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use rhai::RhaiConfig;
pub use server::ServerConfig;
pub use upload::UploadConfig;
pub use workers::{ActivityTimeouts, WorkerConfig, WorkersConfig};
