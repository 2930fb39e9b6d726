use std::path::PathBuf;

use ::config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HarnessConfig {
    /// Name of the test run. Remote configuration files are namespaced by
    /// this value so concurrent runs do not clobber each other.
    #[serde(default = "default_job")]
    pub job: String,

    /// Directory for local artifacts: event streams, rendered configs,
    /// read-position markers
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Directory on the remote hosts where generated configuration files
    /// are pushed
    #[serde(default = "default_remote_config_dir")]
    pub remote_config_dir: String,

    /// First network port handed out by each host's port allocator
    #[serde(default = "default_first_port")]
    pub first_port: u16,

    /// First minor device number handed out by each host's minor allocator
    #[serde(default = "default_first_minor")]
    pub first_minor: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            job: default_job(),
            log_dir: default_log_dir(),
            remote_config_dir: default_remote_config_dir(),
            first_port: default_first_port(),
            first_minor: default_first_minor(),
        }
    }
}

impl HarnessConfig {
    /// Validates harness configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.job.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "job name cannot be empty".into(),
            )));
        }
        if self.job.contains('/') || self.job.contains(char::is_whitespace) {
            return Err(Error::Config(ConfigError::Message(format!(
                "job name '{}' must not contain '/' or whitespace",
                self.job
            ))));
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "log_dir path cannot be empty".into(),
            )));
        }
        if self.remote_config_dir.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "remote_config_dir path cannot be empty".into(),
            )));
        }
        if self.first_port == 0 {
            return Err(Error::Config(ConfigError::Message(
                "first_port must be non-zero".into(),
            )));
        }
        Ok(())
    }

    /// Path of the global configuration file on a remote host
    pub fn remote_global_config_path(&self) -> String {
        format!("{}/{}.conf", self.remote_config_dir, self.job)
    }

    /// Path of a resource configuration file on a remote host
    pub fn remote_resource_config_path(&self, resource_name: &str) -> String {
        format!("{}/{}-{}.res", self.remote_config_dir, self.job, resource_name)
    }
}

fn default_job() -> String {
    "repld-test".to_string()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}
fn default_remote_config_dir() -> String {
    "/var/lib/repld-test".to_string()
}
fn default_first_port() -> u16 {
    7789
}
fn default_first_minor() -> u32 {
    1
}
