//! Passive Check Protocol Types
//!
//! This module defines the messages exchanged during a passive check.
//! Two dialects share a single connection format:
//!
//! ## Structured (JSON) Dialect
//!
//! Request:
//!
//! ```text
//! {"request":"passive checks","data":[{"key":"agent.ping","timeout":"3"}]}
//! ```
//!
//! Response (exactly one of `value` / `error` per element):
//!
//! ```text
//! {"version":"7.0.0","data":[{"value":"1"}]}
//! {"version":"7.0.0","data":[{"error":"Unsupported item key."}]}
//! ```
//!
//! ## Legacy (Plaintext) Dialect
//!
//! The request is the literal item key. A successful response is the value,
//! verbatim. A failed check is reported as:
//!
//! ```text
//! ZBX_NOTSUPPORTED\0<message>
//! ```
//!
//! with no trailing terminator.

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Marker that opens every legacy error response.
pub const NOT_SUPPORTED: &str = "ZBX_NOTSUPPORTED";

/// The `request` tag servers send with structured passive checks.
pub const PASSIVE_CHECKS_REQUEST: &str = "passive checks";

/// One requested metric and the timeout the server asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckItem {
    /// Item key, e.g. `system.localtime[utc]`
    pub key: String,

    /// Raw timeout string ("" means "use the agent default")
    pub timeout: String,
}

impl CheckItem {
    pub fn new(key: impl Into<String>, timeout: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timeout: timeout.into(),
        }
    }
}

/// The structured-dialect request envelope.
///
/// Missing fields decode to their defaults, so `{}` is a valid (but empty)
/// request. An empty `data` list is not served by the structured path.
///
/// Decoding is lenient the way servers expect: field names match without
/// regard to case, `null` leaves a field at its current value, unknown
/// fields are skipped and a repeated field keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckBatchRequest {
    pub request: String,

    #[serde(rename = "data")]
    pub items: Vec<CheckItem>,
}

/// Matches a JSON member name against a field name, ignoring case.
fn field_is(name: &str, field: &str) -> bool {
    name.eq_ignore_ascii_case(field)
}

impl<'de> Deserialize<'de> for CheckItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CheckItemVisitor;

        impl<'de> Visitor<'de> for CheckItemVisitor {
            type Value = CheckItem;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a check item object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut item = CheckItem::default();
                while let Some(name) = map.next_key::<String>()? {
                    if field_is(&name, "key") {
                        if let Some(key) = map.next_value::<Option<String>>()? {
                            item.key = key;
                        }
                    } else if field_is(&name, "timeout") {
                        if let Some(timeout) = map.next_value::<Option<String>>()? {
                            item.timeout = timeout;
                        }
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(item)
            }
        }

        deserializer.deserialize_map(CheckItemVisitor)
    }
}

impl<'de> Deserialize<'de> for CheckBatchRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CheckBatchRequestVisitor;

        impl<'de> Visitor<'de> for CheckBatchRequestVisitor {
            type Value = CheckBatchRequest;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a passive checks request object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut request = CheckBatchRequest::default();
                while let Some(name) = map.next_key::<String>()? {
                    if field_is(&name, "request") {
                        if let Some(tag) = map.next_value::<Option<String>>()? {
                            request.request = tag;
                        }
                    } else if field_is(&name, "data") {
                        if let Some(items) = map.next_value::<Option<Vec<CheckItem>>>()? {
                            request.items = items;
                        }
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(request)
            }
        }

        deserializer.deserialize_map(CheckBatchRequestVisitor)
    }
}

impl CheckBatchRequest {
    /// Creates a `passive checks` request for a single item.
    pub fn single(key: impl Into<String>, timeout: impl Into<String>) -> Self {
        Self {
            request: PASSIVE_CHECKS_REQUEST.to_string(),
            items: vec![CheckItem::new(key, timeout)],
        }
    }

    /// Serializes the request to its wire form.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Outcome of a single check.
///
/// Serialized as `{"value":"..."}` or `{"error":"..."}`. Being an enum, a
/// result can never carry both fields or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResult {
    Value(String),
    Error(String),
}

impl CheckResult {
    pub fn value(s: impl Into<String>) -> Self {
        CheckResult::Value(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        CheckResult::Error(s.into())
    }

    /// Returns true if this result reports a failed check.
    pub fn is_error(&self) -> bool {
        matches!(self, CheckResult::Error(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            CheckResult::Value(s) | CheckResult::Error(s) => s,
        }
    }
}

impl<E: fmt::Display> From<Result<String, E>> for CheckResult {
    fn from(outcome: Result<String, E>) -> Self {
        match outcome {
            Ok(value) => CheckResult::Value(value),
            Err(e) => CheckResult::Error(e.to_string()),
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckResult::Value(s) => write!(f, "{}", s),
            CheckResult::Error(s) => write!(f, "{}: {}", NOT_SUPPORTED, s),
        }
    }
}

/// The structured-dialect reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckBatchResponse {
    /// Agent version string
    pub version: String,

    #[serde(rename = "data")]
    pub results: Vec<CheckResult>,
}

impl CheckBatchResponse {
    /// Creates a response carrying a single result.
    pub fn single(version: impl Into<String>, result: CheckResult) -> Self {
        Self {
            version: version.into(),
            results: vec![result],
        }
    }

    /// Serializes the response to its wire form.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parses a response from its wire form.
    pub fn decode(buf: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(buf)
    }
}

/// Formats a legacy error response: `ZBX_NOTSUPPORTED`, one zero byte, then
/// the message bytes. Nothing follows the message.
pub fn format_error(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(NOT_SUPPORTED.len() + 1 + message.len());
    buf.extend_from_slice(NOT_SUPPORTED.as_bytes());
    buf.push(0);
    buf.extend_from_slice(message.as_bytes());
    buf
}
