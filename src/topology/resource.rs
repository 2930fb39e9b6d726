//! The resource arena: per-resource state, node state, volume state and the
//! forbidden-pattern set.

use crate::constants::DEFAULT_FORBIDDEN_PATTERNS;
use crate::topology::Collection;
use crate::topology::ConnectionId;
use crate::topology::HostId;

/// Wire transport of a resource's connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Tcp,
    Rdma,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Rdma => "rdma",
        }
    }
}

/// Ordered, duplicate-free set of event patterns that fail any in-flight
/// wait. Orchestration operations lift patterns around commands that
/// legitimately produce them and restore them afterwards.
#[derive(Debug, Clone)]
pub struct ForbiddenPatterns {
    patterns: Vec<String>,
}

impl ForbiddenPatterns {
    pub fn with_defaults() -> Self {
        Self {
            patterns: DEFAULT_FORBIDDEN_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn add(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|p| p == pattern)
    }

    /// Remove the given patterns where present, returning the ones that
    /// were actually removed so they can be restored later.
    pub fn lift(&mut self, patterns: &[&str]) -> Vec<String> {
        let mut lifted = Vec::new();
        for pattern in patterns {
            if let Some(pos) = self.patterns.iter().position(|p| p == pattern) {
                lifted.push(self.patterns.remove(pos));
            }
        }
        lifted
    }

    pub fn restore(&mut self, patterns: Vec<String>) {
        for pattern in patterns {
            self.add(pattern);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.as_str())
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.patterns.clone()
    }
}

/// One data/meta-data device pair at one volume number on one node.
/// Diskless when `disk` is `None`.
#[derive(Debug, Clone)]
pub struct VolumeState {
    pub vnr: u32,
    /// Minor device number, unique within the host's allocator and stable
    /// for the volume's lifetime.
    pub minor: u32,
    pub disk: Option<String>,
    pub meta: Option<String>,
}

impl VolumeState {
    pub fn diskless(&self) -> bool {
        self.disk.is_none()
    }

    /// Path of the replicated device exposed by the device under test.
    pub fn device(&self) -> String {
        format!("/dev/drbd{}", self.minor)
    }
}

/// One host's instance of a resource. Owned exclusively by the resource
/// arena; referenced elsewhere through [`crate::topology::NodeId`].
#[derive(Debug, Clone)]
pub struct NodeState {
    pub host: HostId,
    pub port: u16,
    /// Set whenever a topology mutation invalidates the rendered
    /// configuration; cleared by `update_config`.
    pub config_stale: bool,
    /// Nodes are never removed from the arena; teardown deactivates them so
    /// surrogate indices stay stable.
    pub active: bool,
    pub volumes: Vec<VolumeState>,
    pub connections: Collection<ConnectionId>,
}

impl NodeState {
    pub(crate) fn new(host: HostId, port: u16) -> Self {
        Self {
            host,
            port,
            config_stale: true,
            active: true,
            volumes: Vec::new(),
            connections: Collection::new(),
        }
    }

    pub fn volume(&self, vnr: u32) -> Option<&VolumeState> {
        self.volumes.iter().find(|v| v.vnr == vnr)
    }

    pub fn diskful(&self) -> bool {
        self.volumes.iter().any(|v| !v.diskless())
    }
}

/// A named logical replicated-device definition shared by a set of nodes.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub transport: Transport,
    pub tls: bool,
    pub(crate) net_options: String,
    pub(crate) disk_options: String,
    pub(crate) resource_options: String,
    pub(crate) handlers: String,
    pub forbidden_patterns: ForbiddenPatterns,
    pub(crate) num_volumes: u32,
    pub(crate) nodes: Vec<NodeState>,
}

impl Resource {
    pub(crate) fn new(name: impl Into<String>, transport: Transport, tls: bool) -> Self {
        Self {
            name: name.into(),
            transport,
            tls,
            net_options: String::new(),
            disk_options: String::new(),
            resource_options: String::new(),
            handlers: String::new(),
            forbidden_patterns: ForbiddenPatterns::with_defaults(),
            num_volumes: 0,
            nodes: Vec::new(),
        }
    }

    pub(crate) fn next_volume(&mut self) -> u32 {
        let vnr = self.num_volumes;
        self.num_volumes += 1;
        vnr
    }

    /// Mark every node's rendered configuration as out of date.
    pub(crate) fn touch_config(&mut self) {
        for node in &mut self.nodes {
            node.config_stale = true;
        }
    }

    pub fn net_options(&self) -> &str {
        &self.net_options
    }

    pub fn disk_options(&self) -> &str {
        &self.disk_options
    }

    pub fn resource_options(&self) -> &str {
        &self.resource_options
    }

    pub fn handlers(&self) -> &str {
        &self.handlers
    }
}
