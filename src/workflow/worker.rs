use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{
    Activity, EngineKind, LocalActivityExecutor, Task, TaskOutcome, TaskSource,
    TaskSourceConnector, WorkflowError, cadence, temporal,
};
use crate::{config::WorkerConfig, runner::ScriptRunner};

/// Polls one task queue and runs the checks each task names.
///
/// Up to `max_concurrent_activities` tasks are handled at once; polling
/// pauses while all of them are busy.
pub struct Worker {
    name: String,
    kind: EngineKind,
    source: Arc<dyn TaskSource>,
    activity: Arc<dyn Activity>,
    poll_interval: Duration,
    max_in_flight: usize,
}

impl Worker {
    /// Creates a worker for `config` reading from `source`.
    pub fn new(
        kind: EngineKind,
        config: &WorkerConfig,
        source: Arc<dyn TaskSource>,
        activity: Arc<dyn Activity>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            kind,
            source,
            activity,
            poll_interval: config.poll_interval,
            max_in_flight: config.max_concurrent_activities.max(1),
        }
    }

    /// Runs until `shutdown` is cancelled, then waits for in-flight tasks.
    #[tracing::instrument(skip_all, fields(worker = %self.name, engine = %self.kind))]
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Worker started.");
        let mut in_flight = JoinSet::new();

        loop {
            if in_flight.len() >= self.max_in_flight {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    Some(joined) = in_flight.join_next() => {
                        log_join(joined);
                        continue;
                    }
                }
            }

            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.source.poll() => polled,
            };

            match polled {
                Ok(Some(task)) => {
                    tracing::debug!(task_id = %task.id, "Task received.");
                    in_flight.spawn(handle_task(
                        self.kind,
                        Arc::clone(&self.activity),
                        Arc::clone(&self.source),
                        task,
                    ));
                    continue;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Polling failed."),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        tracing::info!("Worker stopped.");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Task handler panicked.");
    }
}

async fn handle_task(
    kind: EngineKind,
    activity: Arc<dyn Activity>,
    source: Arc<dyn TaskSource>,
    task: Task,
) {
    let result = match kind {
        EngineKind::Temporal => temporal::run_checks(activity.as_ref(), task.payload.get()).await,
        EngineKind::Cadence => match serde_json::from_str::<Vec<String>>(task.payload.get()) {
            Ok(names) => cadence::run_checks(activity.as_ref(), &names).await,
            Err(e) => Err(WorkflowError::Payload(e)),
        },
    };
    if let Err(e) = &result {
        tracing::warn!(task_id = %task.id, error = %e, "Task failed.");
    }

    let outcome = TaskOutcome::from(result);
    if let Err(e) = source.complete(&task.id, &outcome).await {
        tracing::error!(task_id = %task.id, error = %e, "Failed to report task outcome.");
    }
}

/// Connects and runs every worker in `configs` until `shutdown` is
/// cancelled.
///
/// Workers connect one after another. If any of them fails to connect, the
/// shared token is cancelled, the workers already started are drained, and
/// the connection error is returned.
pub async fn run_workers(
    kind: EngineKind,
    configs: &[WorkerConfig],
    connector: &dyn TaskSourceConnector,
    runner: Arc<dyn ScriptRunner>,
    shutdown: CancellationToken,
) -> Result<(), WorkflowError> {
    let mut workers = JoinSet::new();

    for config in configs {
        let source = match connector.connect(config).await {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(engine = %kind, worker = %config.name, error = %e, "Worker failed to connect; shutting down.");
                shutdown.cancel();
                while workers.join_next().await.is_some() {}
                return Err(e);
            }
        };

        let activity = Arc::new(LocalActivityExecutor::new(
            Arc::clone(&runner),
            config.activity,
            config.max_concurrent_activities,
        ));
        let worker = Worker::new(kind, config, source, activity);
        workers.spawn(worker.run(shutdown.clone()));
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(engine = %kind, error = %e, "Worker panicked.");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{
        config::{ActivityTimeouts, HttpRetryConfig},
        runner::{MockScriptRunner, RunnerError},
        workflow::{
            ActivityError, MockTaskSourceConnector, activity::MockActivity,
            memory::InMemoryTaskSource,
        },
    };

    fn worker_config(name: &str) -> WorkerConfig {
        WorkerConfig {
            name: name.into(),
            address: "http://localhost:7233".parse().unwrap(),
            namespace: None,
            task_queue: "checks".into(),
            poll_interval: Duration::from_millis(10),
            max_concurrent_activities: 2,
            activity: ActivityTimeouts::default(),
            retry_policy: HttpRetryConfig::default(),
        }
    }

    fn failing_on_b() -> MockActivity {
        let mut activity = MockActivity::new();
        activity.expect_execute().returning(|name| {
            if name == "b" {
                Err(ActivityError::Application(RunnerError::Runtime("err".into())))
            } else {
                Ok(())
            }
        });
        activity
    }

    async fn run_until_completed(
        kind: EngineKind,
        source: Arc<InMemoryTaskSource>,
        activity: MockActivity,
        expected: usize,
    ) -> Vec<(String, TaskOutcome)> {
        let shutdown = CancellationToken::new();
        let worker = Worker::new(
            kind,
            &worker_config("w1"),
            Arc::clone(&source) as Arc<dyn TaskSource>,
            Arc::new(activity),
        );
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while source.completed().len() < expected && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();

        let mut completed = source.completed();
        completed.sort_by(|a, b| a.0.cmp(&b.0));
        completed
    }

    #[tokio::test]
    async fn test_temporal_worker_completes_despite_failing_script() {
        let source = Arc::new(InMemoryTaskSource::new());
        source.push("1", r#"["a","b","c"]"#).unwrap();
        source.push("2", r#"{"not":"a list"}"#).unwrap();

        let completed =
            run_until_completed(EngineKind::Temporal, source, failing_on_b(), 2).await;
        assert_eq!(completed[0], ("1".to_string(), TaskOutcome::Completed));
        assert!(matches!(&completed[1].1, TaskOutcome::Failed { error } if error.starts_with("invalid task payload")));
    }

    #[tokio::test]
    async fn test_cadence_worker_fails_task_on_first_error() {
        let source = Arc::new(InMemoryTaskSource::new());
        source.push("1", r#"["a","b","c"]"#).unwrap();
        source.push("2", r#"[]"#).unwrap();

        let completed = run_until_completed(EngineKind::Cadence, source, failing_on_b(), 2).await;
        assert_eq!(
            completed[0],
            ("1".to_string(), TaskOutcome::Failed { error: "script 'b' failed: err".into() })
        );
        assert_eq!(completed[1], ("2".to_string(), TaskOutcome::Completed));
    }

    #[tokio::test]
    async fn test_connect_failure_cancels_everything() {
        let mut connector = MockTaskSourceConnector::new();
        connector.expect_connect().times(2).returning(|config| {
            if config.name == "good" {
                Ok(Arc::new(InMemoryTaskSource::new()) as Arc<dyn TaskSource>)
            } else {
                Err(WorkflowError::Connect { worker: config.name.clone(), message: "refused".into() })
            }
        });
        let mut runner = MockScriptRunner::new();
        runner.expect_run_script().never();

        let shutdown = CancellationToken::new();
        let err = run_workers(
            EngineKind::Temporal,
            &[worker_config("good"), worker_config("bad")],
            &connector,
            Arc::new(runner),
            shutdown.clone(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WorkflowError::Connect { ref worker, .. } if worker == "bad"));
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_workers_stops_on_shutdown() {
        let mut connector = MockTaskSourceConnector::new();
        connector
            .expect_connect()
            .returning(|_| Ok(Arc::new(InMemoryTaskSource::new()) as Arc<dyn TaskSource>));

        let shutdown = CancellationToken::new();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        run_workers(
            EngineKind::Cadence,
            &[worker_config("c1")],
            &connector,
            Arc::new(MockScriptRunner::new()),
            shutdown,
        )
        .await
        .unwrap();
    }
}
