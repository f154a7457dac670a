//! Retrying HTTP clients shared by datasources, notification channels and
//! workflow task gateways.

mod client;
mod pool;

pub use client::create_retryable_http_client;
pub use pool::{HttpClientPool, HttpClientPoolError};
