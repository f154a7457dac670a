use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vigil::{
    cmd::{ExecArgs, exec},
    config::AppConfig,
    supervisor::Supervisor,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the supervisor: HTTP server, scheduler and workflow workers.
    Run {
        /// Directory holding `app.yaml`. Defaults to `configs`.
        #[arg(short, long)]
        config_dir: Option<String>,
    },
    /// Runs a single script once and exits.
    Exec(ExecArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config_dir } => run_supervisor(config_dir.as_deref()).await?,
        Commands::Exec(args) => exec::execute(args).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(scripts_dir = %config.scripts_dir.display(), "Configuration loaded.");

    let supervisor = Supervisor::builder().config(config).build()?;
    tracing::info!("Supervisor initialized, starting triggers...");

    supervisor.run().await?;

    Ok(())
}
