//! Second engine binding: the first failure aborts the task.

use super::{Activity, WorkflowError};

/// Runs the scripts in `names` in order, stopping at the first failure.
/// An empty list succeeds without doing anything.
pub async fn run_checks(activity: &dyn Activity, names: &[String]) -> Result<(), WorkflowError> {
    for name in names {
        activity
            .execute(name)
            .await
            .map_err(|source| WorkflowError::Activity { script: name.clone(), source })?;
        tracing::debug!(script = %name, "Check passed.");
    }
    Ok(())
}
