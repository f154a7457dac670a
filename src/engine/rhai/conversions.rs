//! Conversions between host values and Rhai values.
//!
//! Host functions follow a two-value convention: they hand scripts a map
//! `#{ value, error }` where exactly one side is set. In Rust the same thing
//! is a [`HostResult`]; the map only exists at the registration edge.

use rhai::{Blob, Dynamic, Map};
use serde::Serialize;

use crate::{datasource::QueryResult, runner::RunRequest};

/// Result of a host function before it is handed to a script.
pub type HostResult<T> = Result<T, String>;

/// Converts a host result into the `#{ value, error }` map scripts receive.
pub fn host_result_to_dynamic<T: Into<Dynamic>>(result: HostResult<T>) -> Dynamic {
    let (value, error) = match result {
        Ok(value) => (value.into(), Dynamic::UNIT),
        Err(error) => (Dynamic::UNIT, error.into()),
    };

    let mut map = Map::new();
    map.insert("value".into(), value);
    map.insert("error".into(), error);
    map.into()
}

/// Reads binary payload out of a script value. Strings are taken as their
/// UTF-8 bytes; anything other than a string or a blob is rejected.
pub fn dynamic_to_bytes(value: Dynamic) -> HostResult<Vec<u8>> {
    if value.is_blob() {
        return value.try_cast::<Blob>().ok_or_else(|| "blob payload is unreadable".to_string());
    }
    if value.is_string() {
        return value
            .into_immutable_string()
            .map(|s| s.as_bytes().to_vec())
            .map_err(|type_name| format!("expected a string, got {type_name}"));
    }
    Err(format!("data must be a string or blob, got {}", value.type_name()))
}

/// Reads a required string argument named `what`.
pub fn dynamic_to_string(value: Dynamic, what: &str) -> HostResult<String> {
    value
        .into_immutable_string()
        .map(|s| s.to_string())
        .map_err(|type_name| format!("{what} must be a string, got {type_name}"))
}

/// Reads an optional string argument; `()` means absent.
pub fn dynamic_to_optional_string(value: Dynamic) -> HostResult<Option<String>> {
    if value.is_unit() {
        return Ok(None);
    }
    value
        .into_immutable_string()
        .map(|s| Some(s.to_string()))
        .map_err(|type_name| format!("expected a string, got {type_name}"))
}

/// Serializes any host value into a Rhai value.
pub fn to_dynamic<T: Serialize>(value: &T) -> HostResult<Dynamic> {
    rhai::serde::to_dynamic(value).map_err(|e| e.to_string())
}

/// Exposes a decoded query result to scripts. Streams become an array of
/// `#{ labels, entries: [#{ timestamp, line }] }`.
pub fn query_result_to_dynamic(result: &QueryResult) -> HostResult<Dynamic> {
    match result {
        QueryResult::Streams(streams) => to_dynamic(streams),
    }
}

/// Builds the `request` variable; `()` when the trigger was not an HTTP call.
pub fn request_to_dynamic(request: Option<&RunRequest>) -> HostResult<Dynamic> {
    match request {
        Some(request) => to_dynamic(request),
        None => Ok(Dynamic::UNIT),
    }
}
