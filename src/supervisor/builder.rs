//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    datasource::DatasourceManager,
    engine::rhai::HostServices,
    http_client::HttpClientPool,
    kv::KvStore,
    notification::NotificationService,
    runner::RhaiRunner,
    scripts::ScriptRegistry,
    upload::{S3Storage, UploadService},
    workflow::HttpTaskGatewayConnector,
};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    kv: Option<Arc<KvStore>>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Shares an existing KV store with the scripts instead of a fresh one.
    pub fn kv(mut self, kv: Arc<KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Assembles the host services and the runner, and compiles every
    /// script so that syntax errors surface before any trigger starts.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;

        let registry = Arc::new(ScriptRegistry::load_dir(&config.scripts_dir)?);
        let pool = Arc::new(HttpClientPool::new(config.http_base_config.clone()));

        let uploads = match &config.upload {
            Some(upload) => {
                UploadService::new(Arc::new(S3Storage::new(upload)?), upload.prefix.clone())
            }
            None => {
                tracing::info!("Object storage not configured; uploads are disabled.");
                UploadService::disabled()
            }
        };
        let services = HostServices {
            kv: self.kv.unwrap_or_default(),
            uploads: Arc::new(uploads),
            datasources: Arc::new(DatasourceManager::from_config(&config.datasources, &pool)?),
            notifications: Arc::new(NotificationService::from_config(&config.channels, &pool)?),
        };

        let runner = RhaiRunner::new(Arc::clone(&registry), config.rhai.clone(), services);
        runner.precompile()?;
        tracing::info!(count = registry.len(), "Scripts compiled.");

        let connector = Arc::new(HttpTaskGatewayConnector::new(pool));
        Ok(Supervisor::new(config, registry, Arc::new(runner), connector))
    }
}
