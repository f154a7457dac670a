//! Error types for the notification service.

use thiserror::Error;

use crate::http_client::HttpClientPoolError;

/// Defines the possible errors that can occur within the notification service.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No channel with this name is configured.
    #[error("channel '{0}' not found")]
    UnknownChannel(String),

    /// Two channels share a name.
    #[error("channel '{0}' is configured more than once")]
    DuplicateChannel(String),

    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The notification could not be delivered.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    /// An internal error that should not occur under normal circumstances.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] HttpClientPoolError),

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),
}
