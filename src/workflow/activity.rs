use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::{sync::Semaphore, time::timeout};

use super::ActivityError;
use crate::{
    config::ActivityTimeouts,
    runner::{RunnerError, ScriptRunner},
};

/// One activity: run one script.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Activity: Send + Sync {
    /// Runs `script` under the activity's timeouts.
    async fn execute(&self, script: &str) -> Result<(), ActivityError>;
}

/// Runs activities in-process with the engine's timeout semantics.
///
/// - schedule-to-start: waiting for one of `max_concurrent` slots;
/// - start-to-close: the script run itself;
/// - heartbeat: scripts never report progress, so a heartbeat timeout
///   shorter than start-to-close is what ends the run.
///
/// A timed-out run is reported as failed but keeps its slot until the
/// script actually returns; it is not killed.
pub struct LocalActivityExecutor {
    runner: Arc<dyn ScriptRunner>,
    timeouts: ActivityTimeouts,
    slots: Arc<Semaphore>,
}

impl LocalActivityExecutor {
    /// Creates an executor running at most `max_concurrent` scripts at once.
    pub fn new(
        runner: Arc<dyn ScriptRunner>,
        timeouts: ActivityTimeouts,
        max_concurrent: usize,
    ) -> Self {
        Self { runner, timeouts, slots: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    fn run_limit(&self) -> (Duration, fn(Duration) -> ActivityError) {
        let ActivityTimeouts { start_to_close, heartbeat, .. } = self.timeouts;
        if !heartbeat.is_zero() && heartbeat < start_to_close {
            (heartbeat, ActivityError::Heartbeat)
        } else {
            (start_to_close, ActivityError::StartToClose)
        }
    }
}

#[async_trait]
impl Activity for LocalActivityExecutor {
    #[tracing::instrument(skip(self))]
    async fn execute(&self, script: &str) -> Result<(), ActivityError> {
        let schedule_to_start = self.timeouts.schedule_to_start;
        let permit = timeout(schedule_to_start, Arc::clone(&self.slots).acquire_owned())
            .await
            .map_err(|_| ActivityError::ScheduleToStart(schedule_to_start))?
            .map_err(|_| ActivityError::Closed)?;

        let runner = Arc::clone(&self.runner);
        let name = script.to_string();
        let mut run = tokio::spawn(async move {
            let result = runner.run_script(&name, None).await;
            drop(permit);
            result
        });

        let (limit, on_timeout) = self.run_limit();
        match timeout(limit, &mut run).await {
            Ok(Ok(result)) => result.map_err(ActivityError::from),
            Ok(Err(join_error)) => Err(RunnerError::Join(join_error.to_string()).into()),
            Err(_) => {
                tracing::warn!(limit = ?limit, "Activity timed out; script left to finish.");
                Err(on_timeout(limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{MockScriptRunner, RunRequest};

    struct SlowRunner(Duration);

    #[async_trait]
    impl ScriptRunner for SlowRunner {
        async fn run_script(&self, _: &str, _: Option<RunRequest>) -> Result<(), RunnerError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    fn timeouts(schedule_to_start: u64, start_to_close: u64, heartbeat: u64) -> ActivityTimeouts {
        ActivityTimeouts {
            schedule_to_start: Duration::from_millis(schedule_to_start),
            start_to_close: Duration::from_millis(start_to_close),
            heartbeat: Duration::from_millis(heartbeat),
        }
    }

    #[tokio::test]
    async fn test_success_and_application_error() {
        let mut runner = MockScriptRunner::new();
        runner.expect_run_script().returning(|name, request| {
            assert!(request.is_none());
            if name == "bad" { Err(RunnerError::Runtime("boom".into())) } else { Ok(()) }
        });
        let executor = LocalActivityExecutor::new(Arc::new(runner), ActivityTimeouts::default(), 1);

        executor.execute("good").await.unwrap();
        let err = executor.execute("bad").await.unwrap_err();
        assert!(matches!(err, ActivityError::Application(RunnerError::Runtime(_))));
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_start_to_close_timeout() {
        let executor = LocalActivityExecutor::new(
            Arc::new(SlowRunner(Duration::from_secs(10))),
            timeouts(1_000, 100, 0),
            1,
        );
        let err = executor.execute("slow").await.unwrap_err();
        assert!(matches!(err, ActivityError::StartToClose(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_heartbeat_shorter_than_start_to_close() {
        let executor = LocalActivityExecutor::new(
            Arc::new(SlowRunner(Duration::from_secs(10))),
            timeouts(1_000, 5_000, 200),
            1,
        );
        let err = executor.execute("slow").await.unwrap_err();
        assert!(matches!(err, ActivityError::Heartbeat(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_schedule_to_start_timeout_while_slot_is_busy() {
        let executor = Arc::new(LocalActivityExecutor::new(
            Arc::new(SlowRunner(Duration::from_secs(10))),
            timeouts(50, 100, 0),
            1,
        ));

        // The first run times out but keeps holding the only slot.
        assert!(matches!(
            executor.execute("first").await.unwrap_err(),
            ActivityError::StartToClose(_)
        ));
        let err = executor.execute("second").await.unwrap_err();
        assert!(matches!(err, ActivityError::ScheduleToStart(_)));
    }
}
