//! Datasources scripts can query through `datasource::query`.
//!
//! Every backend implements [`Datasource`] and returns a decoded
//! [`QueryResult`]. The [`DatasourceManager`] maps the names used in scripts
//! to configured backends.

mod loki;
pub mod response;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub use loki::LokiDatasource;
pub use response::{DecodeError, Entry, QueryResult, ResultType, Stream};

use crate::{
    config::DatasourcesConfig,
    http_client::{HttpClientPool, HttpClientPoolError},
};

/// Errors that can occur while querying a datasource.
#[derive(Debug, Error)]
pub enum DatasourceError {
    /// No datasource with this name is configured.
    #[error("datasource '{0}' not found")]
    NotFound(String),

    /// Two datasources share a name.
    #[error("datasource '{0}' is configured more than once")]
    DuplicateName(String),

    /// The request could not be sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success HTTP status.
    #[error("datasource returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The HTTP client could not be created.
    #[error(transparent)]
    Client(#[from] HttpClientPoolError),
}

/// Optional parameters of a range query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Range start, unix nanoseconds.
    pub start: Option<i64>,
    /// Range end, unix nanoseconds.
    pub end: Option<i64>,
    /// Maximum number of entries to return.
    pub limit: Option<u32>,
}

/// A backend that can answer queries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Datasource: Send + Sync {
    /// Runs `query` and returns the decoded result.
    async fn query(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult, DatasourceError>;
}

/// Named registry of configured datasources.
#[derive(Clone, Default)]
pub struct DatasourceManager {
    sources: HashMap<String, Arc<dyn Datasource>>,
}

impl DatasourceManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every datasource listed in `config`, sharing clients from `pool`.
    pub fn from_config(
        config: &DatasourcesConfig,
        pool: &HttpClientPool,
    ) -> Result<Self, DatasourceError> {
        let mut manager = Self::new();
        for loki in &config.loki {
            let client = pool.get_or_create(&loki.retry_policy)?;
            manager.register(&loki.name, Arc::new(LokiDatasource::new(loki, client)))?;
        }
        tracing::info!(count = manager.sources.len(), "Datasources initialized.");
        Ok(manager)
    }

    /// Adds a datasource under `name`.
    pub fn register(
        &mut self,
        name: &str,
        source: Arc<dyn Datasource>,
    ) -> Result<(), DatasourceError> {
        if self.sources.contains_key(name) {
            return Err(DatasourceError::DuplicateName(name.to_string()));
        }
        self.sources.insert(name.to_string(), source);
        Ok(())
    }

    /// Runs `query` against the datasource called `name`.
    #[tracing::instrument(skip(self, options), level = "debug")]
    pub async fn query(
        &self,
        name: &str,
        query: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult, DatasourceError> {
        let source =
            self.sources.get(name).ok_or_else(|| DatasourceError::NotFound(name.to_string()))?;
        source.query(query, options).await
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    #[tokio::test]
    async fn test_query_routes_by_name() {
        let mut source = MockDatasource::new();
        source
            .expect_query()
            .with(eq("{app=\"api\"}"), eq(QueryOptions::default()))
            .times(1)
            .returning(|_, _| Ok(QueryResult::Streams(vec![])));

        let mut manager = DatasourceManager::new();
        manager.register("logs", Arc::new(source)).unwrap();

        let result = manager.query("logs", "{app=\"api\"}", &QueryOptions::default()).await;
        assert_eq!(result.unwrap(), QueryResult::Streams(vec![]));
    }

    #[tokio::test]
    async fn test_unknown_datasource() {
        let manager = DatasourceManager::new();
        let err = manager.query("nope", "{}", &QueryOptions::default()).await.unwrap_err();
        assert!(matches!(err, DatasourceError::NotFound(ref n) if n == "nope"));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut manager = DatasourceManager::new();
        manager.register("logs", Arc::new(MockDatasource::new())).unwrap();
        let err = manager.register("logs", Arc::new(MockDatasource::new())).unwrap_err();
        assert!(matches!(err, DatasourceError::DuplicateName(_)));
    }
}
