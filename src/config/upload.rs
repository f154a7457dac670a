use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::deserialize_duration;

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Connection settings for the S3-compatible bucket that `upload::*` writes to.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Base URL of the storage service, e.g. `https://s3.eu-west-1.amazonaws.com`.
    pub endpoint: Url,

    /// Signing region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Target bucket. Objects are addressed path-style: `{endpoint}/{bucket}/{key}`.
    pub bucket: String,

    /// Access key id used for request signing.
    pub access_key_id: String,

    /// Secret access key used for request signing.
    pub secret_access_key: String,

    /// Optional key prefix prepended to every uploaded object.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Upper bound for a single upload request.
    #[serde(default = "default_upload_timeout", deserialize_with = "deserialize_duration")]
    pub upload_timeout: Duration,
}
