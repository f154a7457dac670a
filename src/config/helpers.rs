use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de};

/// Custom deserializer for Duration from milliseconds
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Custom serializer for Duration to milliseconds
pub fn serialize_duration_to_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Deserializes a duration written either as a plain number of milliseconds
/// or as a string with a unit suffix (`"250ms"`, `"10s"`, `"5m"`, `"1h"`).
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
        Raw::Text(text) => parse_duration(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid duration '{text}'"))),
    }
}

/// Parses a duration string such as `"30s"`, `"5m"`, `"1h"` or `"250ms"`.
///
/// A bare number is read as milliseconds, matching the numeric form accepted
/// by [`deserialize_duration`] (environment overrides always arrive as text).
/// Returns `None` for anything else.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input.find(|c: char| !c.is_ascii_digit()).unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    match unit.trim() {
        "" | "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(value.checked_mul(3_600)?)),
        _ => None,
    }
}
