//! Remote command execution boundary.
//!
//! Everything the driver does to a remote host goes through
//! [`CommandExecutor`]. The transport itself (SSH or otherwise) lives
//! outside this crate; tests substitute a scripted implementation.


#[cfg(test)]
use mockall::automock;
use tracing::warn;

use crate::CommandError;
use crate::Result;

/// Options for one remote command invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Standard input injected into the command (used to push generated
    /// configuration files).
    pub stdin: Option<String>,
    /// Report a non-zero exit on the log instead of raising it.
    pub catch: bool,
    /// Environment variables exported to the command.
    pub env: Vec<(String, String)>,
}

impl ExecOptions {
    pub fn with_stdin(stdin: impl Into<String>) -> Self {
        Self {
            stdin: Some(stdin.into()),
            ..Default::default()
        }
    }

    pub fn catching() -> Self {
        Self {
            catch: true,
            ..Default::default()
        }
    }
}

/// Exit status and captured output of one remote command.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub status: i32,
    pub stdout: String,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// The sole mechanism by which topology operations take effect on remote
/// hosts.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, host: &str, argv: &[String], options: &ExecOptions) -> Result<ExecOutcome>;
}

/// Run a command and apply the error policy: non-zero exit raises unless
/// the caller opted into catch semantics, in which case it is logged and
/// execution continues.
pub(crate) fn run_checked(
    executor: &dyn CommandExecutor,
    host: &str,
    argv: &[String],
    options: &ExecOptions,
) -> Result<ExecOutcome> {
    let outcome = executor.execute(host, argv, options)?;
    if !outcome.success() {
        if options.catch {
            warn!(
                host,
                command = argv.join(" "),
                status = outcome.status,
                "command failed (caught)"
            );
        } else {
            return Err(CommandError::Failed {
                host: host.to_string(),
                command: argv.join(" "),
                status: outcome.status,
            }
            .into());
        }
    }
    Ok(outcome)
}

/// Convenience for building an argv from mixed string types.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}
