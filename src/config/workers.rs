use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{HttpRetryConfig, deserialize_duration};

fn default_schedule_to_start() -> Duration {
    Duration::from_secs(60)
}

fn default_start_to_close() -> Duration {
    Duration::from_secs(60)
}

fn default_heartbeat() -> Duration {
    Duration::from_secs(20)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_concurrent_activities() -> usize {
    1
}

/// Workflow-engine workers, one list per engine binding.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkersConfig {
    /// Workers whose task payload is a JSON array of script names and which
    /// keep going past failing scripts.
    #[serde(default)]
    pub temporal: Vec<WorkerConfig>,

    /// Workers whose task payload is a plain list of script names and which
    /// stop at the first failing script.
    #[serde(default)]
    pub cadence: Vec<WorkerConfig>,
}

/// Per-activity timeouts.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTimeouts {
    /// How long an activity may wait for a free execution slot.
    #[serde(default = "default_schedule_to_start", deserialize_with = "deserialize_duration")]
    pub schedule_to_start: Duration,

    /// How long a started activity may run.
    #[serde(default = "default_start_to_close", deserialize_with = "deserialize_duration")]
    pub start_to_close: Duration,

    /// Maximum gap between two heartbeats of a running activity.
    #[serde(default = "default_heartbeat", deserialize_with = "deserialize_duration")]
    pub heartbeat: Duration,
}

impl Default for ActivityTimeouts {
    fn default() -> Self {
        Self {
            schedule_to_start: default_schedule_to_start(),
            start_to_close: default_start_to_close(),
            heartbeat: default_heartbeat(),
        }
    }
}

/// A single worker bound to one workflow-engine connection.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Worker name, used in logs.
    pub name: String,

    /// Address of the task gateway for this connection.
    pub address: Url,

    /// Namespace (or domain) the task queue lives in.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Task queue polled by this worker.
    pub task_queue: String,

    /// Delay between polls when the queue is empty.
    #[serde(default = "default_poll_interval", deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,

    /// Number of activities this worker runs at the same time.
    #[serde(default = "default_max_concurrent_activities")]
    pub max_concurrent_activities: usize,

    /// Timeouts applied to every activity invocation.
    #[serde(default)]
    pub activity: ActivityTimeouts,

    /// Retry policy for calls to the gateway.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}
