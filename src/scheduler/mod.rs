//! Task Scheduler Module
//!
//! The scheduler is the component that actually runs checks. Request
//! handlers never call check code directly; they ask a [`TaskScheduler`] to
//! perform a task and get back either a value or a [`CheckError`] whose
//! message can be shown to the server as-is.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ PassiveCheckHandler  │
//! └──────────┬───────────┘
//!            │ perform_task(key, timeout, caller)
//!            ▼
//! ┌──────────────────────┐     ┌─────────────────────────────┐
//! │   TaskScheduler      │────>│ Check plugins               │
//! │  (LocalScheduler)    │     │  agent.ping, agent.version, │
//! │                      │     │  system.localtime, ...      │
//! │  - key parsing       │     └─────────────────────────────┘
//! │  - capacity limits   │
//! │  - timeouts          │
//! └──────────────────────┘
//! ```
//!
//! The handler receives the scheduler as an `Arc<dyn TaskScheduler>` at
//! construction time, which keeps it testable with a fake implementation.

pub mod builtin;
pub mod key;
pub mod local;
pub mod timeout;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// Re-export commonly used types
pub use builtin::register_builtin_checks;
pub use key::{parse_item_key, ItemKey, KeyError};
pub use local::{Check, LocalScheduler, LocalSchedulerConfig};
pub use timeout::{parse_item_timeout, TimeoutError, MAX_ITEM_TIMEOUT, MIN_ITEM_TIMEOUT};

/// Identifies who asked for a task, for scheduling and accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerClass {
    /// A server-initiated passive check
    Passive,

    /// A check run from the command line (`--test`)
    Local,
}

impl fmt::Display for CallerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerClass::Passive => write!(f, "passive"),
            CallerClass::Local => write!(f, "local"),
        }
    }
}

/// Why a check produced no value.
///
/// The `Display` output is sent to the server verbatim, in either dialect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// No check is registered under this key name
    #[error("Unknown metric {0}")]
    UnknownMetric(String),

    /// The key could not be parsed
    #[error("Invalid item key format.")]
    InvalidKey(#[source] KeyError),

    /// The check rejected its parameters
    #[error("{0}")]
    InvalidParams(String),

    /// The check did not finish within its timeout
    #[error("Timeout occurred while gathering data.")]
    Timeout,

    /// The check ran and failed
    #[error("{0}")]
    Failed(String),
}

impl CheckError {
    pub fn failed(message: impl Into<String>) -> Self {
        CheckError::Failed(message.into())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        CheckError::InvalidParams(message.into())
    }
}

/// Executes checks on behalf of request handlers.
///
/// Implementations own all execution policy: concurrency limits per key,
/// admission control and timeout enforcement. Callers only pass the timeout
/// they want applied.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Runs the check named by `key` and returns its value.
    async fn perform_task(
        &self,
        key: &str,
        timeout: Duration,
        caller: CallerClass,
    ) -> Result<String, CheckError>;

    /// Timeout used when an item does not ask for one.
    fn default_timeout(&self) -> Duration;

    /// Parses an item timeout string; `""` yields [`default_timeout`].
    ///
    /// [`default_timeout`]: TaskScheduler::default_timeout
    fn parse_timeout(&self, raw: &str) -> Result<Duration, TimeoutError> {
        parse_item_timeout(raw, self.default_timeout())
    }
}
