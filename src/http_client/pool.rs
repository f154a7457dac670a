//! A shared pool of outbound HTTP clients, one per retry policy.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

use super::client::create_retryable_http_client;
use crate::config::{BaseHttpClientConfig, HttpRetryConfig};

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// Datasources, webhook channels and task gateways that share a retry policy
/// also share one client, and with it one connection pool.
pub struct HttpClientPool {
    base_config: BaseHttpClientConfig,
    clients: DashMap<HttpRetryConfig, Arc<ClientWithMiddleware>>,
}

impl HttpClientPool {
    /// Creates an empty pool whose clients use `base_config` for their
    /// connection settings.
    pub fn new(base_config: BaseHttpClientConfig) -> Self {
        Self { base_config, clients: DashMap::new() }
    }

    /// Returns the client for `retry_policy`, creating it on first use.
    pub fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        if let Some(client) = self.clients.get(retry_policy) {
            return Ok(Arc::clone(client.value()));
        }

        let entry = self.clients.entry(retry_policy.clone()).or_try_insert_with(|| {
            let base_client = ReqwestClient::builder()
                .pool_max_idle_per_host(self.base_config.max_idle_per_host)
                .pool_idle_timeout(Some(self.base_config.idle_timeout))
                .connect_timeout(self.base_config.connect_timeout)
                .build()
                .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;
            Ok::<_, HttpClientPoolError>(Arc::new(create_retryable_http_client(
                retry_policy,
                base_client,
            )))
        })?;

        Ok(Arc::clone(entry.value()))
    }

    /// Number of distinct clients created so far.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True when no client has been created yet.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new(BaseHttpClientConfig::default())
    }
}
