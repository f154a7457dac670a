//! S3-compatible object storage on top of the AWS SDK client.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::{Region, RequestChecksumCalculation, http::HttpResponse},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use aws_smithy_types::timeout::TimeoutConfig;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use super::{ObjectStorage, UploadError};
use crate::config::UploadConfig;

/// Characters left as-is in an object key path: RFC 3986 unreserved plus `/`.
const KEY_ENCODE_SET: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~').remove(b'/');

const CREDENTIALS_PROVIDER: &str = "vigil-upload-config";

/// Uploads objects to a path-style S3 endpoint.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    endpoint: Url,
    bucket: String,
    timeout: Duration,
}

impl S3Storage {
    /// Builds a client with static credentials whose operations are bounded
    /// by `upload_timeout`.
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        if config.bucket.is_empty() {
            return Err(UploadError::Config("bucket must not be empty".into()));
        }
        if config.endpoint.cannot_be_a_base() {
            return Err(UploadError::Config(format!("invalid endpoint: {}", config.endpoint)));
        }

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let timeouts = TimeoutConfig::builder().operation_timeout(config.upload_timeout).build();

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.as_str().trim_end_matches('/'))
            .force_path_style(true)
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
            timeout: config.upload_timeout,
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, UploadError> {
        let encoded_key = utf8_percent_encode(key, KEY_ENCODE_SET);
        let raw = format!(
            "{}/{}/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            self.bucket,
            encoded_key
        );
        Url::parse(&raw).map_err(|e| UploadError::Config(format!("invalid object url: {e}")))
    }

    fn map_sdk_error<E>(&self, err: SdkError<E, HttpResponse>) -> UploadError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if matches!(err, SdkError::TimeoutError(_)) {
            return UploadError::Timeout(self.timeout);
        }
        if let Some(raw) = err.raw_response() {
            let body = raw
                .body()
                .bytes()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            return UploadError::Status { status: raw.status().as_u16(), body };
        }
        UploadError::Request(DisplayErrorContext(&err).to_string())
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[tracing::instrument(skip(self, body), fields(bucket = %self.bucket, size = body.len()))]
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let key = key.trim_start_matches('/');
        let url = self.object_url(key)?;
        let length = i64::try_from(body.len())
            .map_err(|_| UploadError::Request("object too large".into()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .content_length(length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| self.map_sdk_error(e))?;

        Ok(url.to_string())
    }
}
