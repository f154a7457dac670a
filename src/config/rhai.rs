use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_ms;

/// Sandbox limits applied to every script execution.
#[derive(Debug, Deserialize, Clone)]
pub struct RhaiConfig {
    /// Maximum number of operations a script can perform
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    /// Maximum function call nesting depth
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    /// Maximum size of strings in characters
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,

    /// Maximum number of array elements
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,

    /// Maximum number of object map properties
    #[serde(default = "default_max_map_size")]
    pub max_map_size: usize,

    /// Maximum wall-clock time a single script may run
    #[serde(
        default = "default_execution_timeout",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub execution_timeout: Duration,
}

impl Default for RhaiConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_array_size(),
            max_map_size: default_max_map_size(),
            execution_timeout: default_execution_timeout(),
        }
    }
}

// Alert scripts walk log streams, so the limits are looser than a pure
// filter expression would need.
fn default_max_operations() -> u64 {
    1_000_000
}

fn default_max_call_levels() -> usize {
    32
}

fn default_max_string_size() -> usize {
    4 * 1024 * 1024
}

fn default_max_array_size() -> usize {
    100_000
}

fn default_max_map_size() -> usize {
    10_000
}

fn default_execution_timeout() -> Duration {
    Duration::from_millis(30_000)
}
