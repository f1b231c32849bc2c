//! Passive Check Handler
//!
//! Serves exactly one passive check request:
//!
//! ```text
//!            raw request bytes
//!                   │
//!                   ▼
//!           decode_request()
//!          ┌────────┴─────────┐
//!          │                  │
//!     Structured            Legacy
//!          │                  │
//!   first item only     whole payload = key
//!   parse item timeout  fixed 60s timeout
//!          │                  │
//!          └───────┬──────────┘
//!                  ▼
//!     TaskScheduler::perform_task(key, timeout, Passive)
//!          ┌───────┴──────────┐
//!          ▼                  ▼
//!   {"version":..,      value bytes, or
//!    "data":[{..}]}     ZBX_NOTSUPPORTED\0<message>
//!          │                  │
//!          └───────┬──────────┘
//!                  ▼
//!        ConnectionHandle::write()
//! ```
//!
//! A failed check is a normal outcome and is always reported to the server.
//! Only failures to encode or write the response are local problems, and
//! those are logged and dropped.

use crate::connection::ConnectionHandle;
use crate::protocol::{
    decode_request, format_error, legacy_key, CheckBatchResponse, CheckItem, CheckResult,
    Dialect, Request, NOT_SUPPORTED,
};
use crate::scheduler::{CallerClass, TaskScheduler};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Timeout for legacy requests, long enough that a slow check shows up as a
/// real timeout instead of being cut short.
pub const LEGACY_CHECK_TIMEOUT: Duration = Duration::from_secs(60);

/// Answers passive check requests using an injected scheduler.
///
/// The handler holds no per-request state and is cheap to clone, so each
/// connection task gets its own copy.
#[derive(Clone)]
pub struct PassiveCheckHandler {
    scheduler: Arc<dyn TaskScheduler>,
    version: Arc<str>,
}

impl PassiveCheckHandler {
    /// Creates a handler that runs checks on `scheduler` and reports
    /// `version` in structured responses.
    pub fn new(scheduler: Arc<dyn TaskScheduler>, version: impl Into<String>) -> Self {
        Self {
            scheduler,
            version: Arc::from(version.into()),
        }
    }

    /// Version string sent in structured responses.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Serves one request and writes the response to `conn`.
    ///
    /// Returns the dialect the request was served in. Errors never escape:
    /// check failures become responses, write failures are logged.
    pub async fn handle<C>(&self, conn: &mut C, raw: &[u8]) -> Dialect
    where
        C: ConnectionHandle + ?Sized,
    {
        match decode_request(raw) {
            Request::Structured { item, ignored } => {
                self.handle_structured(conn, item, ignored).await;
                Dialect::Structured
            }
            Request::Legacy(payload) => {
                self.handle_legacy(conn, &payload).await;
                Dialect::Legacy
            }
        }
    }

    async fn handle_structured<C>(&self, conn: &mut C, item: CheckItem, ignored: usize)
    where
        C: ConnectionHandle + ?Sized,
    {
        let peer = conn.peer_addr();

        if ignored > 0 {
            debug!(
                peer = %peer,
                ignored,
                "Only the first item of a passive check request is served"
            );
        }

        // a bad timeout does not fail the request
        let timeout = match self.scheduler.parse_timeout(&item.timeout) {
            Ok(timeout) => timeout,
            Err(e) => {
                let fallback = self.scheduler.default_timeout();
                debug!(
                    peer = %peer,
                    key = %item.key,
                    error = %e,
                    fallback = ?fallback,
                    "Cannot parse item timeout"
                );
                fallback
            }
        };

        let outcome = self
            .scheduler
            .perform_task(&item.key, timeout, CallerClass::Passive)
            .await;

        let response = CheckBatchResponse::single(&*self.version, CheckResult::from(outcome));
        let out = match response.encode() {
            Ok(out) => out,
            Err(e) => {
                debug!(peer = %peer, error = %e, "Could not encode passive check response");
                return;
            }
        };

        debug!(
            peer = %peer,
            response = %String::from_utf8_lossy(&out),
            "Sending passive check response"
        );
        if let Err(e) = conn.write(&out).await {
            debug!(peer = %peer, error = %e, "Could not send response to server");
        }
    }

    async fn handle_legacy<C>(&self, conn: &mut C, payload: &[u8])
    where
        C: ConnectionHandle + ?Sized,
    {
        let peer = conn.peer_addr();
        let key = legacy_key(payload);

        let out = match self
            .scheduler
            .perform_task(&key, LEGACY_CHECK_TIMEOUT, CallerClass::Passive)
            .await
        {
            Ok(value) => {
                debug!(peer = %peer, key = %key, value = %value, "Sending passive check response");
                value.into_bytes()
            }
            Err(e) => {
                let message = e.to_string();
                debug!(
                    peer = %peer,
                    key = %key,
                    "Sending passive check response: {}: '{}'",
                    NOT_SUPPORTED,
                    message
                );
                format_error(&message)
            }
        };

        if let Err(e) = conn.write(&out).await {
            debug!(peer = %peer, error = %e, "Could not send response to server");
        }
    }
}
