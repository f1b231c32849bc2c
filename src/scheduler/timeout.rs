//! Item Timeout Parsing
//!
//! Servers send the per-item timeout as a string. The accepted forms are:
//!
//! - `""` - use the agent default
//! - `"5"` - seconds
//! - `"30s"`, `"2m"` - seconds/minutes/hours with a suffix
//!
//! The resulting value must lie within 1..=600 seconds.

use std::time::Duration;
use thiserror::Error;

/// Shortest timeout an item may request
pub const MIN_ITEM_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest timeout an item may request
pub const MAX_ITEM_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors that can occur while parsing an item timeout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("invalid timeout value: {0:?}")]
    Invalid(String),

    #[error("unknown time suffix in timeout: {0:?}")]
    UnknownSuffix(String),

    #[error("timeout {0} is out of range (1-600 seconds)")]
    OutOfRange(String),
}

/// Parses an item timeout, returning `default` for an empty string.
pub fn parse_item_timeout(raw: &str, default: Duration) -> Result<Duration, TimeoutError> {
    if raw.is_empty() {
        return Ok(default);
    }

    let (digits, multiplier) = match raw.as_bytes()[raw.len() - 1] {
        b's' => (&raw[..raw.len() - 1], 1),
        b'm' => (&raw[..raw.len() - 1], 60),
        b'h' => (&raw[..raw.len() - 1], 3600),
        b'0'..=b'9' => (raw, 1),
        _ => return Err(TimeoutError::UnknownSuffix(raw.to_string())),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeoutError::Invalid(raw.to_string()));
    }

    let secs = digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| TimeoutError::OutOfRange(raw.to_string()))?;

    let timeout = Duration::from_secs(secs);
    if timeout < MIN_ITEM_TIMEOUT || timeout > MAX_ITEM_TIMEOUT {
        return Err(TimeoutError::OutOfRange(raw.to_string()));
    }

    Ok(timeout)
}
