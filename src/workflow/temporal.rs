//! First engine binding: failures are isolated per script.

use super::{Activity, WorkflowError};

/// Runs every script named in `payload`, a JSON array of names, in order.
///
/// A failing activity is logged and the next script still runs; the task as
/// a whole only fails when the payload cannot be decoded.
pub async fn run_checks(activity: &dyn Activity, payload: &str) -> Result<(), WorkflowError> {
    let names: Vec<String> = serde_json::from_str(payload).map_err(WorkflowError::Payload)?;

    for name in &names {
        match activity.execute(name).await {
            Ok(()) => tracing::debug!(script = %name, "Check passed."),
            Err(e) => tracing::error!(script = %name, error = %e, "Check failed; continuing."),
        }
    }
    Ok(())
}
