//! Dialect Detection
//!
//! A passive check request carries no marker saying which dialect it uses.
//! The rule is:
//!
//! 1. Try to decode the payload as a [`CheckBatchRequest`].
//! 2. If that works and the request has at least one item, it is structured.
//! 3. Otherwise (not JSON, wrong shape, or no items) the whole payload is a
//!    legacy item key.
//!
//! A payload that fails to decode is not an error. It is simply the legacy
//! dialect, so the result is an enum with two ordinary variants.

use crate::protocol::types::{CheckBatchRequest, CheckItem};
use bytes::Bytes;
use std::fmt;

/// Which dialect a request was served in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Structured,
    Legacy,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Structured => write!(f, "structured"),
            Dialect::Legacy => write!(f, "legacy"),
        }
    }
}

/// A decoded passive check request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// JSON envelope. Only its first item is served; `ignored` counts the
    /// items that followed it.
    Structured { item: CheckItem, ignored: usize },

    /// The raw payload, to be used verbatim as the item key
    Legacy(Bytes),
}

impl Request {
    pub fn dialect(&self) -> Dialect {
        match self {
            Request::Structured { .. } => Dialect::Structured,
            Request::Legacy(_) => Dialect::Legacy,
        }
    }
}

/// Decides the dialect of `raw` and decodes it accordingly.
pub fn decode_request(raw: &[u8]) -> Request {
    let request = match serde_json::from_slice::<CheckBatchRequest>(raw) {
        Ok(request) => request,
        Err(_) => return Request::Legacy(Bytes::copy_from_slice(raw)),
    };

    let ignored = request.items.len().saturating_sub(1);
    match request.items.into_iter().next() {
        Some(item) => Request::Structured { item, ignored },
        None => Request::Legacy(Bytes::copy_from_slice(raw)),
    }
}

/// Interprets a legacy payload as an item key.
///
/// Item keys are text; invalid UTF-8 sequences are replaced rather than
/// rejected so the scheduler can still report the key as unsupported.
pub fn legacy_key(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured_item(raw: &[u8]) -> CheckItem {
        match decode_request(raw) {
            Request::Structured { item, .. } => item,
            other => panic!("expected structured request, got {:?}", other),
        }
    }

    #[test]
    fn test_structured_request() {
        let raw = br#"{"request":"passive checks","data":[{"key":"agent.ping","timeout":"3"}]}"#;
        assert_eq!(
            decode_request(raw),
            Request::Structured {
                item: CheckItem::new("agent.ping", "3"),
                ignored: 0,
            }
        );
    }

    #[test]
    fn test_plain_key_is_legacy() {
        let raw = b"agent.ping";
        assert_eq!(
            decode_request(raw),
            Request::Legacy(Bytes::from_static(b"agent.ping"))
        );
    }

    #[test]
    fn test_bracketed_key_is_legacy() {
        let raw = b"vfs.fs.size[/,free]";
        assert_eq!(decode_request(raw).dialect(), Dialect::Legacy);
    }

    #[test]
    fn test_empty_items_is_legacy_with_whole_payload() {
        let raw = br#"{"request":"passive checks","data":[]}"#;
        assert_eq!(
            decode_request(raw),
            Request::Legacy(Bytes::copy_from_slice(raw))
        );
    }

    #[test]
    fn test_missing_data_is_legacy() {
        assert_eq!(decode_request(b"{}").dialect(), Dialect::Legacy);
        assert_eq!(
            decode_request(br#"{"request":"passive checks"}"#).dialect(),
            Dialect::Legacy
        );
    }

    #[test]
    fn test_json_of_wrong_shape_is_legacy() {
        assert_eq!(decode_request(b"42").dialect(), Dialect::Legacy);
        assert_eq!(decode_request(br#""agent.ping""#).dialect(), Dialect::Legacy);
        assert_eq!(decode_request(br#"{"data":"x"}"#).dialect(), Dialect::Legacy);
        assert_eq!(decode_request(br#"{"data":[{"key":1}]}"#).dialect(), Dialect::Legacy);
    }

    #[test]
    fn test_truncated_json_is_legacy() {
        let raw = br#"{"request":"passive checks","data":[{"key":"agent.ping""#;
        assert_eq!(decode_request(raw).dialect(), Dialect::Legacy);
    }

    #[test]
    fn test_multiple_items_first_served() {
        let raw = br#"{"request":"passive checks","data":[{"key":"a"},{"key":"b"},{"key":"c"}]}"#;
        assert_eq!(
            decode_request(raw),
            Request::Structured {
                item: CheckItem::new("a", ""),
                ignored: 2,
            }
        );
    }

    #[test]
    fn test_null_fields_are_empty() {
        let raw = br#"{"request":"passive checks","data":[{"key":"agent.ping","timeout":null}]}"#;
        assert_eq!(structured_item(raw), CheckItem::new("agent.ping", ""));

        let raw = br#"{"request":null,"data":[{"key":"agent.ping"}]}"#;
        assert_eq!(structured_item(raw), CheckItem::new("agent.ping", ""));
    }

    #[test]
    fn test_null_data_is_legacy() {
        let raw = br#"{"request":"passive checks","data":null}"#;
        assert_eq!(
            decode_request(raw),
            Request::Legacy(Bytes::copy_from_slice(raw))
        );
    }

    #[test]
    fn test_field_names_ignore_case() {
        let raw = br#"{"Request":"passive checks","Data":[{"Key":"agent.ping","Timeout":"3"}]}"#;
        assert_eq!(structured_item(raw), CheckItem::new("agent.ping", "3"));

        let raw = br#"{"DATA":[{"KEY":"agent.version","timeOut":"5s"}]}"#;
        assert_eq!(structured_item(raw), CheckItem::new("agent.version", "5s"));
    }

    #[test]
    fn test_repeated_field_keeps_last_value() {
        let raw = br#"{"data":[{"key":"first"}],"data":[{"key":"agent.ping","key":"second"}]}"#;
        assert_eq!(structured_item(raw), CheckItem::new("second", ""));
    }

    #[test]
    fn test_null_after_value_keeps_value() {
        let raw = br#"{"data":[{"key":"agent.ping","key":null}]}"#;
        assert_eq!(structured_item(raw), CheckItem::new("agent.ping", ""));
    }

    #[test]
    fn test_legacy_key_lossy() {
        assert_eq!(legacy_key(b"agent.ping"), "agent.ping");
        assert_eq!(legacy_key(b"bad\xffkey"), "bad\u{fffd}key");
    }
}
