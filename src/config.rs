use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{LinkError, Result};


/// Tunables of a link session. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Fixes kept per telemetry source.
    pub history_capacity: usize,
    /// Heartbeat silence after which the link is considered lost.
    pub watchdog_timeout_ms: u64,
    /// How often the watchdog evaluates.
    pub watchdog_period_ms: u64,
    /// Capacity of the ingress queue between delivery threads and the dispatcher.
    pub queue_capacity: usize,
    /// Reports kept per contact; unbounded if unset.
    pub contact_history_limit: Option<usize>,
    /// Contacts silent for longer than this are dropped; never if unset.
    pub contact_max_age_s: Option<i64>,
}


impl Default for LinkConfig {
    fn default() -> LinkConfig {
        LinkConfig {
            history_capacity: 1000,
            watchdog_timeout_ms: 2000,
            watchdog_period_ms: 500,
            queue_capacity: 256,
            contact_history_limit: None,
            contact_max_age_s: None,
        }
    }
}


impl LinkConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<LinkConfig> {
        let reader = BufReader::new(File::open(path)?);
        let config: LinkConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the link could not run with.
    pub fn validate(&self) -> Result<()> {
        if self.watchdog_timeout_ms == 0 {
            return Err(LinkError::Config("watchdog_timeout_ms must be positive".to_string()));
        }
        self.contact_max_age()?;
        Ok(())
    }

    pub fn watchdog_timeout(&self) -> time::Duration {
        time::Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn watchdog_period(&self) -> time::Duration {
        time::Duration::from_millis(self.watchdog_period_ms.max(1))
    }

    pub fn contact_max_age(&self) -> Result<Option<Duration>> {
        let seconds = match self.contact_max_age_s {
            Some(seconds) => seconds,
            None => return Ok(None),
        };
        if seconds < 0 {
            return Err(LinkError::Config(format!("contact_max_age_s {} is negative", seconds)));
        }
        Duration::try_seconds(seconds)
            .map(Some)
            .ok_or_else(|| LinkError::Config(format!("contact_max_age_s {} is out of range", seconds)))
    }
}


#[cfg(test)]
mod tests {
    use std::time;

    use rstest::rstest;

    use super::LinkConfig;
    use crate::errors::LinkError;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LinkConfig = serde_json::from_str(r#"{"watchdog_timeout_ms": 750}"#).unwrap();
        assert_eq!(config.watchdog_timeout_ms, 750);
        assert_eq!(config.history_capacity, LinkConfig::default().history_capacity);
        assert_eq!(config.contact_max_age().unwrap(), None);
        assert_eq!(config.watchdog_timeout(), time::Duration::from_millis(750));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(LinkConfig::load("/nonexistent/vehicle-link.json").is_err());
    }

    #[test]
    fn test_huge_timeout_stays_positive() {
        let config = LinkConfig { watchdog_timeout_ms: u64::MAX, ..LinkConfig::default() };
        assert!(config.validate().is_ok());
        assert_eq!(config.watchdog_timeout(), time::Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_max_age_seconds() {
        let config = LinkConfig { contact_max_age_s: Some(90), ..LinkConfig::default() };
        assert_eq!(config.contact_max_age().unwrap().unwrap().num_seconds(), 90);
    }

    #[rstest]
    #[case(r#"{"contact_max_age_s": 9223372036854775807}"#)]
    #[case(r#"{"contact_max_age_s": -1}"#)]
    #[case(r#"{"watchdog_timeout_ms": 0}"#)]
    fn test_rejected_on_load(#[case] text: &str) {
        let tag: String = text.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let path = std::env::temp_dir().join(format!("vehicle-link-config-{}-{}.json", std::process::id(), tag));
        std::fs::write(&path, text).unwrap();
        let loaded = LinkConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        match loaded {
            Err(LinkError::Config(_)) => (),
            other => panic!("expected config error for {}, got {:?}", text, other),
        }
    }
}
