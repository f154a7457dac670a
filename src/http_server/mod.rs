//! HTTP server module
//!
//! `POST /run/{name}` runs a script once per request:
//! - no name: 400 with body `empty name\n`, the runner is not called;
//! - runner error: 400 with the error text and a trailing newline;
//! - success: 200 with an empty body.

mod error;
mod health;
mod run;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
pub use error::ApiError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{config::ServerConfig, runner::ScriptRunner};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct ApiState {
    /// The execution funnel.
    pub runner: Arc<dyn ScriptRunner>,
}

/// Errors that stop the HTTP server.
#[derive(Debug, Error)]
pub enum HttpServerError {
    /// `listen_address` is not a socket address.
    #[error("Invalid server.listen_address '{0}'")]
    InvalidAddress(String),

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that failed.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("Server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Builds the application router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/run", post(run::run_without_name))
        .route("/run/", post(run::run_without_name))
        .route("/run/{name}", post(run::run_script))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    runner: Arc<dyn ScriptRunner>,
    shutdown: CancellationToken,
) -> Result<(), HttpServerError> {
    let app = router(ApiState { runner });
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(HttpServerError::Serve)
}

/// Runs the HTTP server based on the provided server configuration.
pub async fn run_server_from_config(
    config: &ServerConfig,
    runner: Arc<dyn ScriptRunner>,
    shutdown: CancellationToken,
) -> Result<(), HttpServerError> {
    let addr: SocketAddr = config
        .listen_address
        .parse()
        .map_err(|_| HttpServerError::InvalidAddress(config.listen_address.clone()))?;

    let listener =
        TcpListener::bind(addr).await.map_err(|source| HttpServerError::Bind { addr, source })?;
    tracing::info!(address = %addr, "HTTP server listening.");

    serve(listener, runner, shutdown).await
}
