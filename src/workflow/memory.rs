//! In-process task source used by the worker tests.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use serde_json::value::RawValue;

use super::{Task, TaskOutcome, TaskSource, WorkflowError};

/// A queue of tasks held in memory, recording every reported outcome.
#[derive(Debug, Default)]
pub struct InMemoryTaskSource {
    tasks: Mutex<VecDeque<Task>>,
    completed: Mutex<Vec<(String, TaskOutcome)>>,
}

impl InMemoryTaskSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task whose payload is the given JSON text.
    pub fn push(&self, id: impl Into<String>, payload: &str) -> Result<(), WorkflowError> {
        let payload = RawValue::from_string(payload.to_string()).map_err(WorkflowError::Payload)?;
        self.lock_tasks().push_back(Task { id: id.into(), payload });
        Ok(())
    }

    /// Outcomes reported so far, in completion order.
    pub fn completed(&self) -> Vec<(String, TaskOutcome)> {
        self.completed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of tasks not yet handed out.
    pub fn pending(&self) -> usize {
        self.lock_tasks().len()
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TaskSource for InMemoryTaskSource {
    async fn poll(&self) -> Result<Option<Task>, WorkflowError> {
        Ok(self.lock_tasks().pop_front())
    }

    async fn complete(&self, task_id: &str, outcome: &TaskOutcome) -> Result<(), WorkflowError> {
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((task_id.to_string(), outcome.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_and_recorded_outcomes() {
        let source = InMemoryTaskSource::new();
        source.push("1", r#"["a"]"#).unwrap();
        source.push("2", r#"["b"]"#).unwrap();
        assert!(source.push("3", "not json").is_err());

        assert_eq!(source.poll().await.unwrap().unwrap().id, "1");
        source.complete("1", &TaskOutcome::Completed).await.unwrap();
        assert_eq!(source.pending(), 1);
        assert_eq!(source.completed(), vec![("1".to_string(), TaskOutcome::Completed)]);
    }
}
