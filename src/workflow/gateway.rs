//! HTTP task gateway: the wire protocol between workers and an engine.
//!
//! - `GET  {address}/health`: connectivity probe.
//! - `GET  {address}/queues/{queue}/tasks[?namespace=..]`: `200` with a task,
//!   or `204` when the queue is empty.
//! - `POST {address}/tasks/{id}/complete`: reports a [`TaskOutcome`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

use super::{Task, TaskOutcome, TaskSource, TaskSourceConnector, WorkflowError};
use crate::{config::WorkerConfig, http_client::HttpClientPool};

/// Task source for one worker's queue.
pub struct HttpTaskGateway {
    address: Url,
    namespace: Option<String>,
    task_queue: String,
    client: Arc<ClientWithMiddleware>,
}

impl HttpTaskGateway {
    /// Creates a gateway client for `config` using the shared `client`.
    pub fn new(config: &WorkerConfig, client: Arc<ClientWithMiddleware>) -> Self {
        Self {
            address: config.address.clone(),
            namespace: config.namespace.clone(),
            task_queue: config.task_queue.clone(),
            client,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, WorkflowError> {
        let mut url = self.address.clone();
        url.path_segments_mut()
            .map_err(|()| {
                WorkflowError::Transport(format!("invalid gateway address: {}", self.address))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn error_status(response: reqwest::Response) -> WorkflowError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    WorkflowError::Status { status, body }
}

#[async_trait]
impl TaskSource for HttpTaskGateway {
    async fn poll(&self) -> Result<Option<Task>, WorkflowError> {
        let mut url = self.url(&["queues", &self.task_queue, "tasks"])?;
        if let Some(namespace) = &self.namespace {
            url.query_pairs_mut().append_pair("namespace", namespace);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WorkflowError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => {
                let body =
                    response.bytes().await.map_err(|e| WorkflowError::Transport(e.to_string()))?;
                serde_json::from_slice(&body).map(Some).map_err(WorkflowError::Payload)
            }
            _ => Err(error_status(response).await),
        }
    }

    async fn complete(&self, task_id: &str, outcome: &TaskOutcome) -> Result<(), WorkflowError> {
        let url = self.url(&["tasks", task_id, "complete"])?;
        let response = self
            .client
            .post(url)
            .json(outcome)
            .send()
            .await
            .map_err(|e| WorkflowError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_status(response).await)
        }
    }
}

/// Connects workers to their gateways through a shared client pool.
pub struct HttpTaskGatewayConnector {
    pool: Arc<HttpClientPool>,
}

impl HttpTaskGatewayConnector {
    /// Creates a connector drawing clients from `pool`.
    pub fn new(pool: Arc<HttpClientPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskSourceConnector for HttpTaskGatewayConnector {
    #[tracing::instrument(skip_all, fields(worker = %config.name, address = %config.address))]
    async fn connect(&self, config: &WorkerConfig) -> Result<Arc<dyn TaskSource>, WorkflowError> {
        let client = self.pool.get_or_create(&config.retry_policy)?;
        let gateway = HttpTaskGateway::new(config, client);

        let connect_err =
            |message: String| WorkflowError::Connect { worker: config.name.clone(), message };
        let health = gateway.url(&["health"]).map_err(|e| connect_err(e.to_string()))?;
        let response =
            gateway.client.get(health).send().await.map_err(|e| connect_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(connect_err(format!("health check returned {}", response.status())));
        }

        tracing::info!("Worker connected.");
        Ok(Arc::new(gateway))
    }
}
