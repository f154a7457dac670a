//! Loki range-query client.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

use super::{
    Datasource, DatasourceError, QueryOptions,
    response::{QueryResult, decode_response},
};
use crate::config::{BasicAuth, LokiConfig};

const QUERY_RANGE_PATH: &str = "loki/api/v1/query_range";

/// A Loki instance reached over its HTTP API.
pub struct LokiDatasource {
    name: String,
    endpoint: Url,
    timeout: Duration,
    basic_auth: Option<BasicAuth>,
    client: Arc<ClientWithMiddleware>,
}

impl LokiDatasource {
    /// Creates a datasource for `config` using the shared `client`.
    pub fn new(config: &LokiConfig, client: Arc<ClientWithMiddleware>) -> Self {
        Self {
            name: config.name.clone(),
            endpoint: query_range_url(&config.url),
            timeout: config.timeout,
            basic_auth: config.basic_auth.clone(),
            client,
        }
    }
}

fn query_range_url(base: &Url) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{QUERY_RANGE_PATH}", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url
}

fn query_params(query: &str, options: &QueryOptions) -> Vec<(&'static str, String)> {
    let mut params = vec![("query", query.to_string())];
    if let Some(start) = options.start {
        params.push(("start", start.to_string()));
    }
    if let Some(end) = options.end {
        params.push(("end", end.to_string()));
    }
    if let Some(limit) = options.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

#[async_trait]
impl Datasource for LokiDatasource {
    #[tracing::instrument(skip(self, options), fields(datasource = %self.name))]
    async fn query(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult, DatasourceError> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&query_params(query, options))
            .timeout(self.timeout);
        if let Some(auth) = &self.basic_auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response =
            request.send().await.map_err(|e| DatasourceError::Request(e.to_string()))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| DatasourceError::Request(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Datasource query rejected.");
            return Err(DatasourceError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let decoded = decode_response(&body)?;
        tracing::debug!(result_type = decoded.result.result_type().as_str(), "Query decoded.");
        Ok(decoded.result)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::{config::HttpRetryConfig, http_client::HttpClientPool};

    fn datasource(url: &str, basic_auth: Option<BasicAuth>) -> LokiDatasource {
        let config = LokiConfig {
            name: "logs".into(),
            url: Url::parse(url).unwrap(),
            timeout: Duration::from_secs(2),
            basic_auth,
            retry_policy: HttpRetryConfig { max_retries: 0, ..Default::default() },
        };
        let client = HttpClientPool::default().get_or_create(&config.retry_policy).unwrap();
        LokiDatasource::new(&config, client)
    }

    #[test]
    fn test_query_range_url_keeps_base_path() {
        let base = Url::parse("http://gateway/loki-a/").unwrap();
        assert_eq!(
            query_range_url(&base).as_str(),
            "http://gateway/loki-a/loki/api/v1/query_range"
        );
    }

    #[tokio::test]
    async fn test_query_sends_params_and_decodes_streams() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/loki/api/v1/query_range")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "{app=\"api\"}".into()),
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("start".into(), "100".into()),
            ]))
            .match_header("authorization", "Basic dTpw")
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":{"resultType":"streams","result":[
                    {"stream":{"app":"api"},"values":[["150","boom"]]}
                ]}}"#,
            )
            .create_async()
            .await;

        let source = datasource(
            &server.url(),
            Some(BasicAuth { username: "u".into(), password: "p".into() }),
        );
        let options = QueryOptions { start: Some(100), end: None, limit: Some(10) };
        let QueryResult::Streams(streams) = source.query("{app=\"api\"}", &options).await.unwrap();

        mock.assert_async().await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].entries[0].timestamp, 150);
        assert_eq!(streams[0].entries[0].line, "boom");
    }

    #[tokio::test]
    async fn test_query_reports_http_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/loki/api/v1/query_range")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("parse error")
            .create_async()
            .await;

        let err = datasource(&server.url(), None)
            .query("{", &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DatasourceError::Status { status: 400, ref body } if body == "parse error"));
    }

    #[tokio::test]
    async fn test_query_rejects_vector_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/loki/api/v1/query_range")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#)
            .create_async()
            .await;

        let err = datasource(&server.url(), None)
            .query("rate({app=\"api\"}[1m])", &QueryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown result type 'vector'");
    }
}
