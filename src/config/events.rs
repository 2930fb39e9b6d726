use std::time::Duration;

use ::config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Timing parameters for the event-synchronization engine
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventConfig {
    /// Default wait deadline when the caller does not pass one (seconds)
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Sleep between scan passes over the per-host event streams (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl EventConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "default_timeout_secs must be greater than 0".into(),
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "poll_interval_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    50
}
