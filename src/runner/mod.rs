//! The execution funnel.
//!
//! Every trigger source (HTTP, scheduler, workflow workers, the `exec`
//! command) launches scripts through [`ScriptRunner::run_script`] and maps
//! the single `Result` it gets back into its own domain.

mod rhai_runner;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

pub use rhai_runner::RhaiRunner;

/// Inbound HTTP request data, exposed to the script as `request`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Headers with lowercase names. Repeated headers are joined with `, `.
    pub headers: HashMap<String, String>,
    /// Body as text.
    pub body: String,
}

/// Why a script run failed.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// No script with this name is loaded.
    #[error("script '{0}' not found")]
    NotFound(String),

    /// The script does not parse.
    #[error("failed to compile script '{script}': {message}")]
    Compile {
        /// Script name.
        script: String,
        /// Parser message.
        message: String,
    },

    /// The script raised an error or evaluation failed.
    #[error("{0}")]
    Runtime(String),

    /// A host module raised a failure.
    #[error("{module}: {message}")]
    HostModule {
        /// Module name, e.g. `datasource`.
        module: String,
        /// Failure description.
        message: String,
    },

    /// The script exceeded its execution budget.
    #[error("script '{script}' timed out after {timeout:?}")]
    Timeout {
        /// Script name.
        script: String,
        /// The exceeded budget.
        timeout: Duration,
    },

    /// The task running the script panicked or was cancelled.
    #[error("script task failed: {0}")]
    Join(String),
}

/// Runs named scripts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Runs `name` to completion. `request` is set only for HTTP triggers.
    async fn run_script(&self, name: &str, request: Option<RunRequest>) -> Result<(), RunnerError>;
}
