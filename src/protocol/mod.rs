//! Passive Check Protocol
//!
//! This module implements the wire side of a passive check exchange.
//!
//! ## Overview
//!
//! A server opens a connection, sends one request and reads one response.
//! The request payload is either a JSON envelope (structured dialect) or a
//! bare item key (legacy dialect); the response mirrors the dialect of the
//! request. Both travel inside the same transport header.
//!
//! ## Modules
//!
//! - `types`: request/response messages and the legacy error format
//! - `parser`: dialect detection
//! - `frame`: incremental transport header codec
//!
//! ## Example
//!
//! ```
//! use checkd::protocol::{decode_request, format_error, Dialect};
//!
//! let request = decode_request(b"agent.ping");
//! assert_eq!(request.dialect(), Dialect::Legacy);
//!
//! let reply = format_error("Unsupported item key.");
//! assert!(reply.starts_with(b"ZBX_NOTSUPPORTED\0"));
//! ```

pub mod frame;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use frame::{encode_frame, FrameDecoder, FrameError, FrameResult};
pub use parser::{decode_request, legacy_key, Dialect, Request};
pub use types::{
    format_error, CheckBatchRequest, CheckBatchResponse, CheckItem, CheckResult, NOT_SUPPORTED,
};
