//! Driver configuration module.
//!
//! Provides layered configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional config file
//! 3. Environment variables (highest priority, prefix `REPLD_`)
//!
//! There is deliberately no global mutable state: a [`Settings`] value is
//! constructed once and threaded through the cluster driver, the event
//! tracker and the configuration generator at construction time.

mod driver;
mod events;
pub use driver::*;
pub use events::*;


//---
use ::config::Config;
use ::config::Environment;
use ::config::File;
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Test-run identity, local artifact paths and allocator bases
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Event-wait timing parameters
    #[serde(default)]
    pub events: EventConfig,
}

impl Settings {
    /// Load configuration from defaults, an optional file and the
    /// environment.
    ///
    /// # Arguments
    /// * `path` - Optional path to a TOML config file
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config = builder
            .add_source(Environment::with_prefix("REPLD").separator("__"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates all driver configuration sections
    pub fn validate(&self) -> Result<()> {
        self.harness.validate()?;
        self.events.validate()?;
        Ok(())
    }
}
