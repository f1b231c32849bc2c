//! Built-in Checks
//!
//! The checks every agent answers without any plugin configuration:
//!
//! - `agent.ping` - always `1`
//! - `agent.version` - agent version string
//! - `agent.variant` - `2`
//! - `agent.hostname` - configured host name
//! - `system.localtime[utc|local]` - Unix seconds (`utc`, default) or a
//!   local timestamp `YYYY-MM-DD,hh:mm:ss.nnn,+hh:mm` (`local`)

use crate::scheduler::key::ItemKey;
use crate::scheduler::local::{Check, LocalScheduler};
use crate::scheduler::CheckError;
use chrono::{Local, Utc};

fn no_params(key: &ItemKey) -> Result<(), CheckError> {
    if key.params.is_empty() {
        Ok(())
    } else {
        Err(CheckError::invalid_params("Too many parameters."))
    }
}

fn agent_ping(key: &ItemKey) -> Result<String, CheckError> {
    no_params(key)?;
    Ok("1".to_string())
}

fn agent_version(key: &ItemKey) -> Result<String, CheckError> {
    no_params(key)?;
    Ok(crate::VERSION.to_string())
}

fn agent_variant(key: &ItemKey) -> Result<String, CheckError> {
    no_params(key)?;
    Ok("2".to_string())
}

fn system_localtime(key: &ItemKey) -> Result<String, CheckError> {
    if key.params.len() > 1 {
        return Err(CheckError::invalid_params("Too many parameters."));
    }

    match key.param(0) {
        "" | "utc" => Ok(Utc::now().timestamp().to_string()),
        "local" => Ok(Local::now()
            .format("%Y-%m-%d,%H:%M:%S%.3f,%:z")
            .to_string()),
        _ => Err(CheckError::invalid_params("Invalid first parameter.")),
    }
}

/// Answers `agent.hostname`.
struct Hostname(String);

impl Check for Hostname {
    fn export(&self, key: &ItemKey) -> Result<String, CheckError> {
        no_params(key)?;
        Ok(self.0.clone())
    }

    fn capacity(&self) -> usize {
        64
    }
}

/// Registers the built-in checks with `scheduler`.
pub fn register_builtin_checks(scheduler: &mut LocalScheduler, hostname: &str) {
    scheduler.register("agent.ping", agent_ping);
    scheduler.register("agent.version", agent_version);
    scheduler.register("agent.variant", agent_variant);
    scheduler.register("agent.hostname", Hostname(hostname.to_string()));
    scheduler.register("system.localtime", system_localtime);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::key::parse_item_key;
    use crate::scheduler::{CallerClass, TaskScheduler};
    use std::time::Duration;

    fn key(s: &str) -> ItemKey {
        parse_item_key(s).unwrap()
    }

    #[test]
    fn test_agent_ping() {
        assert_eq!(agent_ping(&key("agent.ping")), Ok("1".to_string()));
        assert_eq!(
            agent_ping(&key("agent.ping[x]")),
            Err(CheckError::invalid_params("Too many parameters."))
        );
    }

    #[test]
    fn test_agent_version() {
        assert_eq!(
            agent_version(&key("agent.version")),
            Ok(crate::VERSION.to_string())
        );
    }

    #[test]
    fn test_localtime_utc() {
        let before = Utc::now().timestamp();
        let value: i64 = system_localtime(&key("system.localtime"))
            .unwrap()
            .parse()
            .unwrap();
        assert!(value >= before);

        assert!(system_localtime(&key("system.localtime[utc]")).is_ok());
    }

    #[test]
    fn test_localtime_local_format() {
        let value = system_localtime(&key("system.localtime[local]")).unwrap();
        let parts: Vec<&str> = value.split(',').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), "2024-01-01".len());
        assert_eq!(parts[1].len(), "00:00:00.000".len());
        assert!(parts[2].starts_with('+') || parts[2].starts_with('-'));
    }

    #[test]
    fn test_localtime_bad_params() {
        assert_eq!(
            system_localtime(&key("system.localtime[gmt]")),
            Err(CheckError::invalid_params("Invalid first parameter."))
        );
        assert_eq!(
            system_localtime(&key("system.localtime[utc,x]")),
            Err(CheckError::invalid_params("Too many parameters."))
        );
    }

    #[tokio::test]
    async fn test_registered_checks() {
        let mut scheduler = LocalScheduler::default();
        register_builtin_checks(&mut scheduler, "web-01");

        assert_eq!(
            scheduler.metrics(),
            vec![
                "agent.hostname",
                "agent.ping",
                "agent.variant",
                "agent.version",
                "system.localtime"
            ]
        );

        let hostname = scheduler
            .perform_task("agent.hostname", Duration::from_secs(1), CallerClass::Passive)
            .await;
        assert_eq!(hostname, Ok("web-01".to_string()));
    }
}
