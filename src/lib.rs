//! Integration-test driver for a replicated block-device cluster.
//!
//! The crate models the cluster topology (hosts, resources, nodes, volumes,
//! connections, peer devices) as arena-owned state addressed through small
//! copyable handles, generates and pushes the device's configuration files,
//! issues admin commands over a pluggable remote-execution boundary, and
//! synchronizes on the per-host event streams the device emits: every
//! state-changing operation is followed by a wait for the events that prove
//! the change took effect.
//!
//! ```no_run
//! use repld_harness::{Cluster, ProtocolVersion, Settings, Transport};
//! # fn executor() -> Box<dyn repld_harness::CommandExecutor> { unimplemented!() }
//! # fn main() -> repld_harness::Result<()> {
//! let settings = Settings::load(None)?;
//! let mut cluster = Cluster::new(settings, executor())?;
//! cluster.add_host("alpha", "192.168.100.1", ProtocolVersion(9, 1, 0))?;
//! cluster.add_host("beta", "192.168.100.2", ProtocolVersion(9, 1, 0))?;
//! cluster.listen_to_events()?;
//!
//! let resource = cluster.create_resource("r0", Transport::Tcp, false)?;
//! cluster.add_disk(resource, None, None)?;
//! cluster.up(resource)?;
//! let primary = cluster.nodes(resource).first().unwrap();
//! cluster.primary(primary, true)?;
//! # Ok(())
//! # }
//! ```

mod confgen;
mod config;
mod constants;
mod driver;
mod errors;
mod events;
mod exec;
mod topology;

pub use confgen::ConfigWriter;
pub use self::config::*;
pub use errors::*;
pub use events::*;
pub use exec::*;
pub use topology::*;

#[cfg(test)]
pub mod test_utils;
