//! Surrogate handles for topology entities.
//!
//! Every entity is identified by a stable arena-style index assigned at
//! creation. Equality and hashing go through these surrogates, never through
//! names, so a renamed resource or node remains distinguishable from any
//! other entity for the whole run.

use std::fmt;

/// Index into the cluster's resource arena. Resources are never removed,
/// so the index is stable for the life of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

/// Index into the cluster's host arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub(crate) u32);

/// One instance of a resource on one host. `index` doubles as the node's
/// small integer id, unique within its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub resource: ResourceId,
    pub index: u32,
}

/// One data/meta-data device pair at one volume number on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId {
    pub node: NodeId,
    pub vnr: u32,
}

/// A directed link between two nodes of the same resource. Distinct from
/// its reverse pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    pub from: NodeId,
    pub to: NodeId,
}

/// One volume's replication relationship across one connection. Always
/// derived on demand, never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerDeviceId {
    pub connection: ConnectionId,
    pub vnr: u32,
}

impl ConnectionId {
    /// Both endpoints must belong to the same resource and differ.
    pub fn new(from: NodeId, to: NodeId) -> Self {
        assert_eq!(
            from.resource, to.resource,
            "connection endpoints must belong to the same resource"
        );
        assert_ne!(from, to, "connection endpoints must differ");
        Self { from, to }
    }

    /// The opposite direction of this link.
    pub fn reverse(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

impl PeerDeviceId {
    pub fn new(connection: ConnectionId, volume: VolumeId) -> Self {
        assert_eq!(
            connection.from, volume.node,
            "peer-device volume must belong to the connection's local node"
        );
        Self {
            connection,
            vnr: volume.vnr,
        }
    }

    /// The local volume this peer device replicates.
    pub fn volume(&self) -> VolumeId {
        VolumeId {
            node: self.connection.from,
            vnr: self.vnr,
        }
    }
}

/// The four entity kinds the event engine tracks read positions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Node,
    Volume,
    Connection,
    PeerDevice,
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityClass::Node => "node",
            EntityClass::Volume => "volume",
            EntityClass::Connection => "connection",
            EntityClass::PeerDevice => "peer-device",
        };
        write!(f, "{}", s)
    }
}

/// Common surface of all topology handles. The `Display` form is stable,
/// filesystem-safe and unique per entity; the position store uses it as the
/// on-disk label.
pub trait Entity: Copy + Eq + std::hash::Hash + fmt::Display + fmt::Debug {
    fn resource(&self) -> ResourceId;
    fn class() -> EntityClass;
}

impl Entity for NodeId {
    fn resource(&self) -> ResourceId {
        self.resource
    }
    fn class() -> EntityClass {
        EntityClass::Node
    }
}

impl Entity for VolumeId {
    fn resource(&self) -> ResourceId {
        self.node.resource
    }
    fn class() -> EntityClass {
        EntityClass::Volume
    }
}

impl Entity for ConnectionId {
    fn resource(&self) -> ResourceId {
        self.from.resource
    }
    fn class() -> EntityClass {
        EntityClass::Connection
    }
}

impl Entity for PeerDeviceId {
    fn resource(&self) -> ResourceId {
        self.connection.from.resource
    }
    fn class() -> EntityClass {
        EntityClass::PeerDevice
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.n{}", self.resource, self.index)
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.v{}", self.node, self.vnr)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.n{}-n{}", self.from.resource, self.from.index, self.to.index)
    }
}

impl fmt::Display for PeerDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.v{}", self.connection, self.vnr)
    }
}
