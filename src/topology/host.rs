//! Host machines the device under test runs on.

use std::fmt;

/// Version of the replication protocol a host speaks, as reported by the
/// device under test. Ordered so version cut-offs read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion(pub u32, pub u32, pub u32);

impl ProtocolVersion {
    /// Newer-protocol hosts get explicit connection/path blocks in the
    /// generated configuration and peer-scoped event filters. Legacy hosts
    /// embed addresses directly in per-host declarations instead.
    pub fn supports_connection_blocks(&self) -> bool {
        *self >= ProtocolVersion(9, 0, 0)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// One machine in the test cluster. A host can carry one node per resource;
/// the port and minor allocators are host-wide so concurrent resources never
/// collide.
#[derive(Debug, Clone)]
pub struct Host {
    pub name: String,
    pub address: String,
    /// Additional addresses for multi-path setups; `address` is always
    /// `addresses[0]`.
    pub addresses: Vec<String>,
    pub volume_group: String,
    pub protocol: ProtocolVersion,
    next_port: u16,
    next_minor: u32,
}

impl Host {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        protocol: ProtocolVersion,
        first_port: u16,
        first_minor: u32,
    ) -> Self {
        let address = address.into();
        Self {
            name: name.into(),
            addresses: vec![address.clone()],
            address,
            volume_group: "scratch".to_string(),
            protocol,
            next_port: first_port,
            next_minor: first_minor,
        }
    }

    pub fn add_address(&mut self, address: impl Into<String>) {
        self.addresses.push(address.into());
    }

    pub fn next_port(&mut self) -> u16 {
        let port = self.next_port;
        self.next_port += 1;
        port
    }

    pub fn next_minor(&mut self) -> u32 {
        let minor = self.next_minor;
        self.next_minor += 1;
        minor
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
