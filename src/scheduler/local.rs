//! Local Task Scheduler
//!
//! `LocalScheduler` runs checks in-process. Each check is registered under
//! an item key name together with a capacity: the maximum number of
//! executions of that check allowed at once. The default capacity of 1 means
//! a key never runs concurrently with itself.
//!
//! ## Execution
//!
//! ```text
//! perform_task("system.localtime[utc]", 3s, Passive)
//!        │
//!        ▼
//! 1. parse key ─────────────── invalid ──> "Invalid item key format."
//!        │
//!        ▼
//! 2. look up "system.localtime" ─ none ──> "Unknown metric ..."
//!        │
//!        ▼
//! 3. ┌─ timeout(3s) ────────────────────┐
//!    │  acquire capacity slot           │
//!    │  run check on blocking pool      │ ── elapsed ──> "Timeout occurred..."
//!    └──────────────────────────────────┘
//!        │
//!        ▼
//!    value / check error
//! ```
//!
//! The capacity slot is owned by the blocking task, so a check that overruns
//! its timeout keeps its slot until it really finishes.

use crate::scheduler::key::{parse_item_key, ItemKey};
use crate::scheduler::{CallerClass, CheckError, TaskScheduler};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

/// Default item timeout (3 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// A check that can be registered with the scheduler.
pub trait Check: Send + Sync {
    /// Produces the value for `key`.
    fn export(&self, key: &ItemKey) -> Result<String, CheckError>;

    /// Maximum concurrent executions of this check.
    fn capacity(&self) -> usize {
        1
    }
}

impl<F> Check for F
where
    F: Fn(&ItemKey) -> Result<String, CheckError> + Send + Sync,
{
    fn export(&self, key: &ItemKey) -> Result<String, CheckError> {
        self(key)
    }
}

/// Configuration for the local scheduler.
#[derive(Debug, Clone)]
pub struct LocalSchedulerConfig {
    /// Timeout for items that do not request one
    pub default_timeout: Duration,
}

impl Default for LocalSchedulerConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

struct Registration {
    check: Arc<dyn Check>,
    slots: Arc<Semaphore>,
}

/// Scheduler counters
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub tasks_performed: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub tasks_timed_out: AtomicU64,
}

/// Runs registered checks in-process.
pub struct LocalScheduler {
    config: LocalSchedulerConfig,
    checks: HashMap<String, Registration>,
    stats: SchedulerStats,
}

impl LocalScheduler {
    /// Creates a scheduler with no checks registered.
    pub fn new(config: LocalSchedulerConfig) -> Self {
        Self {
            config,
            checks: HashMap::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Registers `check` under the key name `name`, replacing any previous
    /// check with that name.
    pub fn register(&mut self, name: impl Into<String>, check: impl Check + 'static) {
        let name = name.into();
        let capacity = check.capacity().max(1);
        trace!(metric = %name, capacity, "Registered check");
        self.checks.insert(
            name,
            Registration {
                check: Arc::new(check),
                slots: Arc::new(Semaphore::new(capacity)),
            },
        );
    }

    /// Returns true if a check is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    /// Returns the registered key names, sorted.
    pub fn metrics(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.checks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    async fn run(&self, item: ItemKey, timeout: Duration) -> Result<String, CheckError> {
        let registration = self
            .checks
            .get(&item.name)
            .ok_or_else(|| CheckError::UnknownMetric(item.name.clone()))?;

        let check = Arc::clone(&registration.check);
        let slots = Arc::clone(&registration.slots);

        let execution = async move {
            let permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Err(CheckError::failed("Check is no longer available.")),
            };

            let outcome = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                check.export(&item)
            })
            .await;

            match outcome {
                Ok(result) => result,
                Err(e) => Err(CheckError::failed(format!(
                    "Check terminated unexpectedly: {}",
                    e
                ))),
            }
        };

        match tokio::time::timeout(timeout, execution).await {
            Ok(result) => result,
            Err(_) => {
                self.stats.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
                Err(CheckError::Timeout)
            }
        }
    }
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new(LocalSchedulerConfig::default())
    }
}

#[async_trait]
impl TaskScheduler for LocalScheduler {
    async fn perform_task(
        &self,
        key: &str,
        timeout: Duration,
        caller: CallerClass,
    ) -> Result<String, CheckError> {
        debug!(key, caller = %caller, timeout = ?timeout, "Performing task");
        self.stats.tasks_performed.fetch_add(1, Ordering::Relaxed);

        let result = match parse_item_key(key) {
            Ok(item) => self.run(item, timeout).await,
            Err(e) => {
                debug!(key, error = %e, "Cannot parse item key");
                Err(CheckError::InvalidKey(e))
            }
        };

        if let Err(ref e) = result {
            self.stats.tasks_failed.fetch_add(1, Ordering::Relaxed);
            if matches!(e, CheckError::Timeout) {
                warn!(key, caller = %caller, timeout = ?timeout, "Check timed out");
            }
        }

        result
    }

    fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }
}
