//! Handler for the `/run/{name}` endpoint.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
};

use super::{ApiError, ApiState};
use crate::runner::RunRequest;

/// Runs the named script once and waits for it to finish.
pub async fn run_script(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if name.is_empty() {
        return Err(ApiError::EmptyName);
    }

    let request = RunRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers: flatten_headers(&headers),
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    state.runner.run_script(&name, Some(request)).await?;
    Ok(StatusCode::OK)
}

/// `POST /run` and `POST /run/`.
pub async fn run_without_name() -> ApiError {
    ApiError::EmptyName
}

fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    flat
}
