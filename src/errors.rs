//! Test Driver Error Hierarchy
//!
//! Defines the error types raised while driving a replicated block-device
//! cluster under test, categorized by subsystem: topology manipulation,
//! remote command execution, and event-stream synchronization.

use std::time::Duration;

use ::config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Topology lookups and mutations that reference unknown entities
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Remote command execution failures
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Event-wait failures (forbidden pattern, timeout, bad pattern)
    #[error(transparent)]
    Event(#[from] EventError),

    /// Driver configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local artifact I/O failures (config files, event streams, positions)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feature requested on a node whose protocol version cannot support it
    #[error("'{feature}' is not implemented for protocol version {major}.{minor}.{patch}")]
    Unsupported {
        feature: &'static str,
        major: u32,
        minor: u32,
        patch: u32,
    },

    /// Unrecoverable failures requiring the test to abort
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("no host named '{0}' in the cluster")]
    UnknownHost(String),

    #[error("resource '{0}' already exists")]
    DuplicateResource(String),

    #[error("node {node} has no volume with number {vnr}")]
    NoSuchVolume { node: String, vnr: u32 },

    #[error("node {0} is not an active member of its resource")]
    InactiveNode(String),

    #[error("resource '{0}' has no nodes")]
    EmptyResource(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Non-zero exit without catch semantics
    #[error("command '{command}' failed on {host} with status {status}")]
    Failed {
        host: String,
        command: String,
        status: i32,
    },

    /// The execution transport itself broke down
    #[error("could not execute '{command}' on {host}: {reason}")]
    Transport {
        host: String,
        command: String,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A globally-forbidden pattern appeared while waiting. Short-circuits
    /// any required-pattern matching still in flight.
    #[error("forbidden pattern '{pattern}' matched on {host}: {line}")]
    ForbiddenPattern {
        host: String,
        pattern: String,
        line: String,
    },

    /// Required patterns were not fully satisfied in time. Carries the
    /// unsatisfied (entity, pattern) cells for diagnostics.
    #[error("timed out after {elapsed:?} waiting for events; missing: {missing:?}")]
    Timeout {
        elapsed: Duration,
        missing: Vec<String>,
    },

    #[error("invalid event pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no event stream registered for host '{0}'")]
    StreamMissing(String),
}
