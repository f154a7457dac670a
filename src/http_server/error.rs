//! Defines the custom `ApiError` type for the HTTP server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::runner::RunnerError;

/// Errors returned by the run endpoint. Every variant is a client error whose
/// body is the plain error text followed by a newline.
#[derive(Debug)]
pub enum ApiError {
    /// The path carried no script name.
    EmptyName,

    /// The script run failed.
    Runner(RunnerError),
}

impl From<RunnerError> for ApiError {
    fn from(err: RunnerError) -> Self {
        ApiError::Runner(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self {
            ApiError::EmptyName => "empty name".to_string(),
            ApiError::Runner(err) => err.to_string(),
        };

        (StatusCode::BAD_REQUEST, format!("{message}\n")).into_response()
    }
}
