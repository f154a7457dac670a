//! Decoding of datasource query responses.
//!
//! Responses carry a `resultType` discriminator next to a raw `result`
//! payload. Decoding happens in two passes: the envelope is read first with
//! the payload left as raw JSON, then the payload is decoded into the shape
//! the discriminator selects. A new result shape only needs a new
//! [`QueryResult`] variant and one arm in [`decode_result`].

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

/// Errors produced while decoding a query response.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The envelope itself is not valid JSON or misses required fields.
    #[error("malformed response envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The backend reported a failed query.
    #[error("query failed ({error_type}): {message}")]
    QueryFailed {
        /// Backend error class, e.g. `bad_data`.
        error_type: String,
        /// Backend error message.
        message: String,
    },

    /// The discriminator names a shape this decoder does not implement.
    #[error("unknown result type '{0}'")]
    UnknownType(String),

    /// The payload does not match the shape selected by the discriminator.
    #[error("malformed '{result_type}' payload: {source}")]
    Payload {
        /// The discriminator that selected the shape.
        result_type: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An entry timestamp is not an integer nanosecond value.
    #[error("invalid entry timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Discriminator values a datasource may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    /// Labeled log streams.
    Streams,
    /// Single numeric sample.
    Scalar,
    /// Instant vector.
    Vector,
    /// Range vector.
    Matrix,
}

impl ResultType {
    /// Wire name of the discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::Streams => "streams",
            ResultType::Scalar => "scalar",
            ResultType::Vector => "vector",
            ResultType::Matrix => "matrix",
        }
    }
}

impl FromStr for ResultType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streams" => Ok(ResultType::Streams),
            "scalar" => Ok(ResultType::Scalar),
            "vector" => Ok(ResultType::Vector),
            "matrix" => Ok(ResultType::Matrix),
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Unix timestamp in nanoseconds.
    pub timestamp: i64,
    /// The log line.
    pub line: String,
}

/// A label set with its entries, in the order the backend returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    /// Stream labels.
    pub labels: BTreeMap<String, String>,
    /// Entries of this stream.
    pub entries: Vec<Entry>,
}

/// A decoded query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// `resultType: "streams"`.
    Streams(Vec<Stream>),
}

impl QueryResult {
    /// The discriminator this result was decoded from.
    pub fn result_type(&self) -> ResultType {
        match self {
            QueryResult::Streams(_) => ResultType::Streams,
        }
    }
}

/// A decoded response: status plus typed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    /// Backend status string (`"success"`).
    pub status: String,
    /// Typed result.
    pub result: QueryResult,
}

#[derive(Deserialize)]
struct Envelope<'a> {
    status: String,
    #[serde(borrow, default)]
    data: Option<EnvelopeData<'a>>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct EnvelopeData<'a> {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(borrow)]
    result: &'a RawValue,
}

#[derive(Deserialize)]
struct RawStream {
    #[serde(default)]
    stream: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(String, String)>,
}

/// Decodes a full response body.
pub fn decode_response(body: &[u8]) -> Result<QueryResponse, DecodeError> {
    let envelope: Envelope<'_> = serde_json::from_slice(body).map_err(DecodeError::Envelope)?;

    if envelope.status != "success" {
        return Err(DecodeError::QueryFailed {
            error_type: envelope.error_type.unwrap_or_else(|| envelope.status.clone()),
            message: envelope.error.unwrap_or_default(),
        });
    }

    let data = envelope.data.ok_or_else(|| {
        DecodeError::Envelope(<serde_json::Error as serde::de::Error>::missing_field("data"))
    })?;

    let result = decode_result(&data.result_type, data.result)?;
    Ok(QueryResponse { status: envelope.status, result })
}

/// Second pass: decodes `raw` into the shape selected by `result_type`.
pub fn decode_result(result_type: &str, raw: &RawValue) -> Result<QueryResult, DecodeError> {
    match result_type.parse::<ResultType>()? {
        ResultType::Streams => decode_streams(raw).map(QueryResult::Streams),
        unsupported @ (ResultType::Scalar | ResultType::Vector | ResultType::Matrix) =>
            Err(DecodeError::UnknownType(unsupported.as_str().to_string())),
    }
}

fn decode_streams(raw: &RawValue) -> Result<Vec<Stream>, DecodeError> {
    let streams: Vec<RawStream> = serde_json::from_str(raw.get()).map_err(|source| {
        DecodeError::Payload { result_type: ResultType::Streams.as_str().to_string(), source }
    })?;

    streams
        .into_iter()
        .map(|stream| {
            let entries = stream
                .values
                .into_iter()
                .map(|(ts, line)| {
                    let timestamp =
                        ts.parse::<i64>().map_err(|_| DecodeError::InvalidTimestamp(ts.clone()))?;
                    Ok(Entry { timestamp, line })
                })
                .collect::<Result<Vec<_>, DecodeError>>()?;
            Ok(Stream { labels: stream.stream, entries })
        })
        .collect()
}
