//! The Supervisor owns every trigger source and manages their lifetimes.
//!
//! - **Initialization**: [`SupervisorBuilder`] loads the scripts, builds the
//!   host services and the runner, and compiles every script up front.
//! - **Lifecycle**: [`Supervisor::run`] starts the HTTP server, the interval
//!   scheduler and both workflow worker groups, all sharing one
//!   [`CancellationToken`].
//! - **Shutdown**: Ctrl+C, SIGTERM, an external cancel or any service
//!   failing stops everything. Services get `shutdown_timeout` to drain
//!   before they are aborted.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    datasource::DatasourceError,
    http_server::{self, HttpServerError},
    notification::NotificationError,
    runner::{RunnerError, ScriptRunner},
    scheduler,
    scripts::{ScriptLoadError, ScriptRegistry},
    upload::UploadError,
    workflow::{self, EngineKind, TaskSourceConnector, WorkflowError},
};

/// Errors raised while building or running the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// The scripts directory could not be loaded.
    #[error("Failed to load scripts: {0}")]
    Scripts(#[from] ScriptLoadError),

    /// A script failed to compile at startup.
    #[error("Failed to prepare scripts: {0}")]
    Runner(#[from] RunnerError),

    /// A datasource could not be set up.
    #[error("Datasource setup failed: {0}")]
    Datasource(#[from] DatasourceError),

    /// A notification channel could not be set up.
    #[error("Notification setup failed: {0}")]
    Notification(#[from] NotificationError),

    /// Object storage could not be set up.
    #[error("Upload setup failed: {0}")]
    Upload(#[from] UploadError),

    /// The HTTP server stopped with an error.
    #[error("HTTP server error: {0}")]
    HttpServer(#[from] HttpServerError),

    /// A worker group stopped with an error.
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// A supervised task panicked.
    #[error("Supervised task panicked: {0}")]
    TaskPanicked(String),
}

/// The runtime manager for the application.
pub struct Supervisor {
    config: Arc<AppConfig>,
    registry: Arc<ScriptRegistry>,
    runner: Arc<dyn ScriptRunner>,
    connector: Arc<dyn TaskSourceConnector>,
    cancellation_token: CancellationToken,
    join_set: JoinSet<Result<(), SupervisorError>>,
}

impl Supervisor {
    /// Creates a supervisor from already built components.
    pub fn new(
        config: AppConfig,
        registry: Arc<ScriptRegistry>,
        runner: Arc<dyn ScriptRunner>,
        connector: Arc<dyn TaskSourceConnector>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            runner,
            connector,
            cancellation_token: CancellationToken::new(),
            join_set: JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder`.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// The execution funnel shared by every trigger source.
    pub fn runner(&self) -> Arc<dyn ScriptRunner> {
        Arc::clone(&self.runner)
    }

    /// A handle that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Starts all services and runs until shutdown.
    ///
    /// Returns the first service failure, if any, after everything has
    /// stopped.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        self.spawn_signal_handler();

        if self.config.server.enabled {
            let server_config = self.config.server.clone();
            let runner = Arc::clone(&self.runner);
            let token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                http_server::run_server_from_config(&server_config, runner, token).await?;
                Ok(())
            });
        }

        let registry = Arc::clone(&self.registry);
        let runner = Arc::clone(&self.runner);
        let token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            scheduler::run_scheduler(registry, runner, token).await;
            Ok(())
        });

        self.spawn_workers(EngineKind::Temporal);
        self.spawn_workers(EngineKind::Cadence);

        let mut failure = None;
        loop {
            tokio::select! {
                joined = self.join_set.join_next() => match joined {
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => {
                        tracing::error!(error = %e, "A supervised service failed. Initiating shutdown.");
                        failure.get_or_insert(e);
                        self.cancellation_token.cancel();
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "A supervised task panicked. Initiating shutdown.");
                        failure.get_or_insert(SupervisorError::TaskPanicked(e.to_string()));
                        self.cancellation_token.cancel();
                    }
                    None => break,
                },
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        self.drain(&mut failure).await;
        tracing::info!("Supervisor shutdown complete.");
        failure.map_or(Ok(()), Err)
    }

    fn spawn_signal_handler(&mut self) {
        let token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = token.cancelled() => return Ok(()),
            }
            token.cancel();
            Ok(())
        });
    }

    fn spawn_workers(&mut self, kind: EngineKind) {
        let configs = match kind {
            EngineKind::Temporal => self.config.workers.temporal.clone(),
            EngineKind::Cadence => self.config.workers.cadence.clone(),
        };
        if configs.is_empty() {
            return;
        }

        let connector = Arc::clone(&self.connector);
        let runner = Arc::clone(&self.runner);
        let token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            workflow::run_workers(kind, &configs, connector.as_ref(), runner, token).await?;
            Ok(())
        });
    }

    async fn drain(&mut self, failure: &mut Option<SupervisorError>) {
        let shutdown_timeout = self.config.shutdown_timeout;
        let join_set = &mut self.join_set;
        let drained = tokio::time::timeout(shutdown_timeout, async {
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "Service failed during shutdown.");
                        failure.get_or_insert(e);
                    }
                    Err(e) => tracing::error!(error = %e, "Task panicked during shutdown."),
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                timeout = ?shutdown_timeout,
                "Services did not stop within the shutdown timeout; aborting them."
            );
            self.join_set.shutdown().await;
        } else {
            tracing::info!("All supervised tasks have completed.");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::{ActivityTimeouts, HttpRetryConfig, ServerConfig, WorkerConfig},
        runner::MockScriptRunner,
        workflow::MockTaskSourceConnector,
    };

    fn quiet_config() -> AppConfig {
        AppConfig {
            server: ServerConfig { enabled: false, ..Default::default() },
            shutdown_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn worker(name: &str) -> WorkerConfig {
        WorkerConfig {
            name: name.into(),
            address: "http://localhost:7233".parse().unwrap(),
            namespace: None,
            task_queue: "checks".into(),
            poll_interval: Duration::from_millis(10),
            max_concurrent_activities: 1,
            activity: ActivityTimeouts::default(),
            retry_policy: HttpRetryConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let supervisor = Supervisor::new(
            quiet_config(),
            Arc::new(ScriptRegistry::default()),
            Arc::new(MockScriptRunner::new()),
            Arc::new(MockTaskSourceConnector::new()),
        );
        let token = supervisor.cancellation_token();
        let handle = tokio::spawn(supervisor.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_worker_connect_failure_stops_supervisor() {
        let mut config = quiet_config();
        config.workers.cadence = vec![worker("c1")];

        let mut connector = MockTaskSourceConnector::new();
        connector.expect_connect().returning(|config| {
            Err(WorkflowError::Connect { worker: config.name.clone(), message: "refused".into() })
        });

        let supervisor = Supervisor::new(
            config,
            Arc::new(ScriptRegistry::default()),
            Arc::new(MockScriptRunner::new()),
            Arc::new(connector),
        );
        let token = supervisor.cancellation_token();

        let err = tokio::time::timeout(Duration::from_secs(5), supervisor.run())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Workflow(WorkflowError::Connect { .. })));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_invalid_listen_address_stops_supervisor() {
        let config = AppConfig {
            server: ServerConfig { enabled: true, listen_address: "not-an-address".into() },
            ..quiet_config()
        };
        let supervisor = Supervisor::new(
            config,
            Arc::new(ScriptRegistry::default()),
            Arc::new(MockScriptRunner::new()),
            Arc::new(MockTaskSourceConnector::new()),
        );

        let err = tokio::time::timeout(Duration::from_secs(5), supervisor.run())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, SupervisorError::HttpServer(HttpServerError::InvalidAddress(_))));
    }
}
