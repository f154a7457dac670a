//! `vigil exec <name>`: runs one script once and exits.

use clap::Parser;
use thiserror::Error;

use crate::{
    config::AppConfig,
    runner::RunnerError,
    supervisor::{Supervisor, SupervisorError},
};

/// Errors from a one-shot execution.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration could not be read.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Scripts or services could not be set up.
    #[error("Setup error: {0}")]
    Setup(#[from] SupervisorError),

    /// The script failed.
    #[error("Script error: {0}")]
    Script(#[from] RunnerError),
}

/// Arguments for `exec`.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Name of the script to run (its file stem).
    pub name: String,

    /// Directory holding `app.yaml`. Defaults to `configs`.
    #[arg(short, long)]
    pub config_dir: Option<String>,
}

/// Builds the runner from configuration and runs `args.name` once, without
/// starting any trigger source.
pub async fn execute(args: ExecArgs) -> Result<(), Error> {
    let config = AppConfig::new(args.config_dir.as_deref())?;
    let supervisor = Supervisor::builder().config(config).build()?;

    tracing::info!(script = %args.name, "Executing script once.");
    supervisor.runner().run_script(&args.name, None).await?;
    tracing::info!(script = %args.name, "Script succeeded.");
    Ok(())
}
