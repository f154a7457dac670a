use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{
    BaseHttpClientConfig, ChannelsConfig, DatasourcesConfig, RhaiConfig, ServerConfig,
    UploadConfig, WorkersConfig, deserialize_duration,
};

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Directory holding the `*.rhai` scripts. Relative paths are resolved
    /// against the configuration directory.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// HTTP trigger server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Sandbox limits.
    #[serde(default)]
    pub rhai: RhaiConfig,

    /// Object storage for `upload::*`. Uploads fail with a script-visible
    /// error when absent.
    #[serde(default)]
    pub upload: Option<UploadConfig>,

    /// Datasources scripts can query.
    #[serde(default)]
    pub datasources: DatasourcesConfig,

    /// Notification channels.
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Workflow-engine workers.
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Settings for the pooled outbound HTTP clients.
    #[serde(default)]
    pub http_base_config: BaseHttpClientConfig,

    /// The maximum time to wait for graceful shutdown.
    #[serde(default = "default_shutdown_timeout", deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            server: ServerConfig::default(),
            rhai: RhaiConfig::default(),
            upload: None,
            datasources: DatasourcesConfig::default(),
            channels: ChannelsConfig::default(),
            workers: WorkersConfig::default(),
            http_base_config: BaseHttpClientConfig::default(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl AppConfig {
    /// Reads `<config_dir>/app.yaml` (default dir: `configs`) and applies
    /// `VIGIL__*` environment overrides on top.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{config_dir_str}/app.yaml")))
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        if config.scripts_dir.is_relative() {
            config.scripts_dir = Path::new(config_dir_str).join(&config.scripts_dir);
        }

        Ok(config)
    }
}
