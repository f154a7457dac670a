//! Object upload bridge used by the `upload::*` script functions.
//!
//! Naming rules:
//! - without a user name, the object is called `<unix-nanos>-<crc32(payload)>`;
//! - with a user name, known image suffixes are stripped first so that
//!   `chart.png` does not end up as `chart.png.png`;
//! - the extension of the requested format is always appended.

mod s3;

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub use s3::S3Storage;

/// Suffixes removed from user-supplied names before the new extension is added.
pub const KNOWN_IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg"];

/// Errors that can occur while uploading an object.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No object storage is configured.
    #[error("object storage is not configured")]
    NotConfigured,

    /// The storage client could not be built from configuration.
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The storage service answered with a non-success status.
    #[error("storage returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the service.
        body: String,
    },

    /// The upload did not finish within the configured timeout.
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
}

/// Image formats scripts can upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
}

impl ImageFormat {
    /// File extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
        }
    }

    /// MIME type sent as `content-type`.
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
        }
    }
}

/// A bucket that accepts publicly readable objects.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `body` under `key` with public-read access and returns the
    /// public URL of the object.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

/// Builds the final object name for an upload.
pub fn object_name(payload: &[u8], name: Option<&str>, format: ImageFormat) -> String {
    object_name_at(payload, name, format, next_timestamp())
}

fn object_name_at(payload: &[u8], name: Option<&str>, format: ImageFormat, nanos: i64) -> String {
    let base = match name {
        Some(name) => KNOWN_IMAGE_SUFFIXES
            .iter()
            .fold(name, |acc, suffix| acc.strip_suffix(suffix).unwrap_or(acc))
            .to_string(),
        None => format!("{}-{}", nanos, crc32fast::hash(payload)),
    };
    format!("{base}{}", format.extension())
}

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Wall-clock nanoseconds, forced to be strictly increasing within the
/// process so two uploads in the same clock tick still get distinct names.
fn next_timestamp() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let previous = LAST_TIMESTAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Uploads script artifacts to the configured object storage.
#[derive(Clone, Default)]
pub struct UploadService {
    storage: Option<Arc<dyn ObjectStorage>>,
    prefix: Option<String>,
}

impl UploadService {
    /// Creates a service backed by `storage`. Keys are prefixed with
    /// `prefix` when one is given.
    pub fn new(storage: Arc<dyn ObjectStorage>, prefix: Option<String>) -> Self {
        Self { storage: Some(storage), prefix }
    }

    /// A service without storage; every upload fails with
    /// [`UploadError::NotConfigured`].
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Uploads a PNG and returns its public URL.
    pub async fn upload_png(&self, data: Vec<u8>, name: Option<&str>) -> Result<String, UploadError> {
        self.upload(data, name, ImageFormat::Png).await
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(
        &self,
        data: Vec<u8>,
        name: Option<&str>,
        format: ImageFormat,
    ) -> Result<String, UploadError> {
        let storage = self.storage.as_ref().ok_or(UploadError::NotConfigured)?;

        let object = object_name(&data, name, format);
        let key = match &self.prefix {
            Some(prefix) => format!("{}/{object}", prefix.trim_end_matches('/')),
            None => object,
        };

        let url = storage.put_object(&key, data, format.content_type()).await?;
        tracing::debug!(key = %key, url = %url, "Object uploaded.");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;

    #[test]
    fn test_generated_name_uses_timestamp_and_checksum() {
        let name = object_name_at(b"hello", None, ImageFormat::Png, 42);
        assert_eq!(name, format!("42-{}.png", crc32fast::hash(b"hello")));
    }

    #[test]
    fn test_generated_names_differ_across_timestamps() {
        let first = object_name_at(b"same", None, ImageFormat::Png, 1_000);
        let second = object_name_at(b"same", None, ImageFormat::Png, 1_001);
        assert_ne!(first, second);
    }

    #[test]
    fn test_repeated_calls_never_collide() {
        let names: std::collections::HashSet<_> =
            (0..1_000).map(|_| object_name(b"same", None, ImageFormat::Png)).collect();
        assert_eq!(names.len(), 1_000);
    }

    #[test]
    fn test_known_suffix_is_not_doubled() {
        assert_eq!(object_name_at(b"", Some("chart.png"), ImageFormat::Png, 0), "chart.png");
        assert_eq!(object_name_at(b"", Some("chart.jpg"), ImageFormat::Png, 0), "chart.png");
        assert_eq!(object_name_at(b"", Some("chart.jpeg"), ImageFormat::Png, 0), "chart.png");
        assert_eq!(object_name_at(b"", Some("chart"), ImageFormat::Png, 0), "chart.png");
    }

    #[test]
    fn test_unknown_suffix_is_kept() {
        assert_eq!(object_name_at(b"", Some("report.gif"), ImageFormat::Png, 0), "report.gif.png");
    }

    #[tokio::test]
    async fn test_upload_png_applies_prefix_and_content_type() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_put_object()
            .with(eq("alerts/cpu.png"), eq(b"img".to_vec()), eq("image/png"))
            .times(1)
            .returning(|key, _, _| Ok(format!("https://cdn.example/{key}")));

        let service = UploadService::new(Arc::new(storage), Some("alerts/".to_string()));
        let url = service.upload_png(b"img".to_vec(), Some("cpu.png")).await.unwrap();

        assert_eq!(url, "https://cdn.example/alerts/cpu.png");
    }

    #[tokio::test]
    async fn test_upload_without_storage_fails() {
        let service = UploadService::disabled();
        let result = service.upload_png(b"img".to_vec(), None).await;
        assert!(matches!(result, Err(UploadError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_storage_error_is_propagated() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_put_object()
            .returning(|_, _, _| Err(UploadError::Status { status: 403, body: "denied".into() }));

        let service = UploadService::new(Arc::new(storage), None);
        let result = service.upload_png(b"img".to_vec(), None).await;

        assert!(matches!(result, Err(UploadError::Status { status: 403, .. })));
    }
}
