//! Interval scheduler for scripts annotated with `@every`.
//!
//! Each scheduled script gets its own ticker task. The first run happens one
//! interval after start. A tick that comes due while the previous run of the
//! same script is still going is skipped, so a script never overlaps itself.

use std::sync::Arc;

use tokio::{
    task::JoinSet,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

use crate::{
    runner::ScriptRunner,
    scripts::{Script, ScriptRegistry},
};

/// Runs every scheduled script in `registry` until `shutdown` is cancelled.
pub async fn run_scheduler(
    registry: Arc<ScriptRegistry>,
    runner: Arc<dyn ScriptRunner>,
    shutdown: CancellationToken,
) {
    let scheduled = registry.scheduled();
    if scheduled.is_empty() {
        tracing::info!("No scheduled scripts.");
        return;
    }

    let mut tickers = JoinSet::new();
    for script in scheduled {
        tickers.spawn(run_ticker(script, Arc::clone(&runner), shutdown.clone()));
    }
    tracing::info!(count = tickers.len(), "Scheduler started.");

    while let Some(joined) = tickers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Scheduler ticker panicked.");
        }
    }
    tracing::info!("Scheduler stopped.");
}

#[tracing::instrument(skip_all, fields(script = %script.name))]
async fn run_ticker(script: Arc<Script>, runner: Arc<dyn ScriptRunner>, shutdown: CancellationToken) {
    let Some(every) = script.every else {
        return;
    };
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = runner.run_script(&script.name, None).await {
                    tracing::error!(error = %e, "Scheduled run failed.");
                }
            }
        }
    }
}
