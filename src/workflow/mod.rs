//! Workflow-engine trigger adapters.
//!
//! A worker polls one task queue through a [`TaskSource`]. Each task carries
//! an ordered list of script names; every name becomes one activity
//! invocation that calls the runner. The two engine bindings differ in how
//! they treat a failing script:
//!
//! - [`temporal`]: payload is a JSON array; failures are logged and the
//!   remaining scripts still run.
//! - [`cadence`]: payload is a plain list; the first failure aborts the rest
//!   and fails the task.

mod activity;
pub mod cadence;
mod gateway;
#[cfg(test)]
mod memory;
pub mod temporal;
mod worker;

use std::{fmt, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

pub use activity::{Activity, LocalActivityExecutor};
pub use gateway::{HttpTaskGateway, HttpTaskGatewayConnector};
pub use worker::{Worker, run_workers};

use crate::{config::WorkerConfig, http_client::HttpClientPoolError, runner::RunnerError};

/// Errors from a single activity invocation.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// No execution slot became free in time.
    #[error("activity was not started within {0:?}")]
    ScheduleToStart(Duration),

    /// The script ran longer than allowed.
    #[error("activity did not finish within {0:?}")]
    StartToClose(Duration),

    /// The activity stopped heartbeating.
    #[error("activity heartbeat timed out after {0:?}")]
    Heartbeat(Duration),

    /// The script itself failed.
    #[error(transparent)]
    Application(#[from] RunnerError),

    /// The activity slot pool was closed.
    #[error("activity executor is shut down")]
    Closed,
}

/// Errors from workers and task sources.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A worker could not connect to its engine.
    #[error("worker '{worker}' failed to connect: {message}")]
    Connect {
        /// Worker name.
        worker: String,
        /// Failure description.
        message: String,
    },

    /// A request to the engine failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The engine answered with an unexpected status.
    #[error("engine returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// A task payload could not be decoded.
    #[error("invalid task payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// An activity failed and the adapter does not continue past failures.
    #[error("script '{script}' failed: {source}")]
    Activity {
        /// Script whose activity failed.
        script: String,
        /// The activity error.
        #[source]
        source: ActivityError,
    },

    /// An HTTP client could not be created.
    #[error(transparent)]
    Client(#[from] HttpClientPoolError),
}

/// Engine binding a worker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// JSON payload, continue past failures.
    Temporal,
    /// Native list payload, abort on first failure.
    Cadence,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Temporal => f.write_str("temporal"),
            EngineKind::Cadence => f.write_str("cadence"),
        }
    }
}

/// A unit of work handed out by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    /// Engine-assigned task id.
    pub id: String,
    /// Undecoded payload; each binding decodes it in its own way.
    pub payload: Box<RawValue>,
}

/// Final state reported back for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskOutcome {
    /// All work done.
    Completed,
    /// The task failed.
    Failed {
        /// Failure description.
        error: String,
    },
}

impl From<Result<(), WorkflowError>> for TaskOutcome {
    fn from(result: Result<(), WorkflowError>) -> Self {
        match result {
            Ok(()) => TaskOutcome::Completed,
            Err(e) => TaskOutcome::Failed { error: e.to_string() },
        }
    }
}

/// A connection to a workflow engine's task queue.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetches the next task, or `None` when the queue is empty.
    async fn poll(&self) -> Result<Option<Task>, WorkflowError>;

    /// Reports the outcome of a task.
    async fn complete(&self, task_id: &str, outcome: &TaskOutcome) -> Result<(), WorkflowError>;
}

/// Opens task sources for configured workers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskSourceConnector: Send + Sync {
    /// Connects the worker described by `config`.
    async fn connect(
        &self,
        config: &WorkerConfig,
    ) -> Result<std::sync::Arc<dyn TaskSource>, WorkflowError>;
}
