//! The cluster: owner of hosts, resources, the execution interface and the
//! event tracker. All topology mutation and command issuance happen
//! synchronously on the caller's thread.

use std::fs;
use std::time::Duration;

use tracing::debug;
use tracing::info;

use crate::confgen::render_global_config;
use crate::confgen::render_node_config;
use crate::constants::CONFIG_ARTIFACT_PREFIX;
use crate::constants::EVENTS_FILE_PREFIX;
use crate::constants::INITIAL_EVENTS_MARKER;
use crate::constants::POSITIONS_SUBDIR;
use crate::events::EventFilter;
use crate::events::EventMatch;
use crate::events::EventTracker;
use crate::events::WaitSpec;
use crate::events::WaitTarget;
use crate::exec::argv;
use crate::exec::run_checked;
use crate::exec::CommandExecutor;
use crate::exec::ExecOptions;
use crate::exec::ExecOutcome;
use crate::topology::Collection;
use crate::topology::ConnectionId;
use crate::topology::Entity;
use crate::topology::EntityClass;
use crate::topology::Host;
use crate::topology::HostId;
use crate::topology::NodeId;
use crate::topology::NodeState;
use crate::topology::PeerDeviceId;
use crate::topology::ProtocolVersion;
use crate::topology::Resource;
use crate::topology::ResourceId;
use crate::topology::Transport;
use crate::topology::VolumeId;
use crate::topology::VolumeState;
use crate::Settings;
use crate::TopologyError;
use crate::{Error, Result};

/// Per-wait options; everything defaults to "plain wait with the
/// resource's forbidden set in force".
#[derive(Debug, Clone)]
pub struct EventOpts {
    pub timeout: Option<Duration>,
    /// Forbidden patterns acceptable for the duration of this wait only.
    pub suppressed: Vec<String>,
    pub word_boundary: bool,
}

impl Default for EventOpts {
    fn default() -> Self {
        Self {
            timeout: None,
            suppressed: Vec::new(),
            word_boundary: true,
        }
    }
}

impl EventOpts {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

/// An entity a wait can be scoped to: knows which host stream its events
/// appear in and which filter tokens select them.
pub trait Waitable: Entity {
    fn wait_target(&self, cluster: &Cluster) -> WaitTarget;
}

pub struct Cluster {
    settings: Settings,
    executor: Box<dyn CommandExecutor>,
    hosts: Vec<Host>,
    resources: Vec<Resource>,
    tracker: EventTracker,
}

impl Cluster {
    pub fn new(settings: Settings, executor: Box<dyn CommandExecutor>) -> Result<Self> {
        settings.validate()?;
        fs::create_dir_all(&settings.harness.log_dir)?;
        let tracker = EventTracker::new(
            settings.harness.log_dir.join(POSITIONS_SUBDIR),
            settings.events.default_timeout(),
            settings.events.poll_interval(),
        )?;
        Ok(Self {
            settings,
            executor,
            hosts: Vec::new(),
            resources: Vec::new(),
            tracker,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn executor_ref(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    // -
    // Hosts

    /// Register a host and push the cluster-wide configuration to it.
    pub fn add_host(
        &mut self,
        name: impl Into<String>,
        address: impl Into<String>,
        protocol: ProtocolVersion,
    ) -> Result<HostId> {
        let host = Host::new(
            name,
            address,
            protocol,
            self.settings.harness.first_port,
            self.settings.harness.first_minor,
        );
        let global = render_global_config(
            &self.settings.harness.job,
            &self.settings.harness.remote_config_dir,
        );
        let path = self.settings.harness.remote_global_config_path();
        run_checked(
            self.executor.as_ref(),
            &host.name,
            &argv([
                "bash".to_string(),
                "-c".to_string(),
                format!(
                    "mkdir -p {} && cat > {}",
                    self.settings.harness.remote_config_dir, path
                ),
            ]),
            &ExecOptions::with_stdin(global),
        )?;
        info!(host = host.name, version = %host.protocol, "host registered");
        self.hosts.push(host);
        Ok(HostId(self.hosts.len() as u32 - 1))
    }

    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id.0 as usize]
    }

    pub fn host_mut(&mut self, id: HostId) -> &mut Host {
        &mut self.hosts[id.0 as usize]
    }

    pub fn host_of(&self, node: NodeId) -> &Host {
        let state = self.node_state(node);
        &self.hosts[state.host.0 as usize]
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn find_host(&self, name: &str) -> Result<HostId> {
        self.hosts
            .iter()
            .position(|h| h.name == name)
            .map(|i| HostId(i as u32))
            .ok_or_else(|| TopologyError::UnknownHost(name.to_string()).into())
    }

    // -
    // Resources and nodes

    /// Create a resource with one node per registered host and all-pairs
    /// directed connections.
    pub fn create_resource(
        &mut self,
        name: impl Into<String>,
        transport: Transport,
        tls: bool,
    ) -> Result<ResourceId> {
        let name = name.into();
        if self.resources.iter().any(|r| r.name == name) {
            return Err(TopologyError::DuplicateResource(name).into());
        }
        let mut resource = Resource::new(name, transport, tls);
        for (index, host) in self.hosts.iter_mut().enumerate() {
            let port = host.next_port();
            resource.nodes.push(NodeState::new(HostId(index as u32), port));
        }
        self.resources.push(resource);
        let id = ResourceId(self.resources.len() as u32 - 1);

        let nodes = self.nodes(id);
        for n0 in nodes.iter() {
            for n1 in nodes.iter() {
                if n0 != n1 {
                    self.node_mut(n0).connections.add(ConnectionId::new(n0, n1));
                }
            }
        }
        Ok(id)
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0 as usize]
    }

    pub fn resource_mut(&mut self, id: ResourceId) -> &mut Resource {
        &mut self.resources[id.0 as usize]
    }

    pub fn node_state(&self, node: NodeId) -> &NodeState {
        &self.resource(node.resource).nodes[node.index as usize]
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> &mut NodeState {
        &mut self.resources[node.resource.0 as usize].nodes[node.index as usize]
    }

    /// Add a node for `host` to an existing resource.
    pub fn add_node(&mut self, resource: ResourceId, host: HostId) -> NodeId {
        let port = self.hosts[host.0 as usize].next_port();
        let res = &mut self.resources[resource.0 as usize];
        res.nodes.push(NodeState::new(host, port));
        let node = NodeId {
            resource,
            index: res.nodes.len() as u32 - 1,
        };
        res.touch_config();
        node
    }

    /// Deactivate a node. The arena slot is kept so surrogate indices stay
    /// stable.
    pub fn remove_node(&mut self, node: NodeId) {
        let res = &mut self.resources[node.resource.0 as usize];
        res.nodes[node.index as usize].active = false;
        res.touch_config();
    }

    /// Create and add a new disk on some or all nodes. Nodes outside
    /// `diskful_nodes` get a diskless volume at the same volume number.
    /// Returns the new volume number.
    pub fn add_disk(
        &mut self,
        resource: ResourceId,
        meta_size: Option<&str>,
        diskful_nodes: Option<&Collection<NodeId>>,
    ) -> Result<u32> {
        let vnr = self.resources[resource.0 as usize].next_volume();
        let nodes = self.nodes(resource);
        for node in nodes.iter() {
            let diskful = diskful_nodes.map(|c| c.contains(node)).unwrap_or(true);
            let minor = {
                let host = self.node_state(node).host;
                self.hosts[host.0 as usize].next_minor()
            };
            let resource_name = self.resource(resource).name.clone();
            let volume_group = self.host_of(node).volume_group.clone();
            let state = self.node_mut(node);
            let (disk, meta) = if diskful {
                let disk = format!("/dev/{}/{}-disk{}", volume_group, resource_name, vnr);
                let meta = meta_size
                    .map(|_| format!("/dev/{}/{}-meta{}", volume_group, resource_name, vnr));
                (Some(disk), meta)
            } else {
                (None, None)
            };
            state.volumes.push(VolumeState {
                vnr,
                minor,
                disk,
                meta,
            });
        }
        self.resources[resource.0 as usize].touch_config();
        debug!(resource = self.resource(resource).name, vnr, "disk added");
        Ok(vnr)
    }

    // -
    // Option strings. Every setter invalidates the rendered configuration
    // of all the resource's nodes.

    pub fn set_net_options(&mut self, resource: ResourceId, options: impl Into<String>) {
        let res = self.resource_mut(resource);
        res.net_options = options.into();
        res.touch_config();
    }

    pub fn set_disk_options(&mut self, resource: ResourceId, options: impl Into<String>) {
        let res = self.resource_mut(resource);
        res.disk_options = options.into();
        res.touch_config();
    }

    pub fn set_resource_options(&mut self, resource: ResourceId, options: impl Into<String>) {
        let res = self.resource_mut(resource);
        res.resource_options = options.into();
        res.touch_config();
    }

    pub fn set_handlers(&mut self, resource: ResourceId, options: impl Into<String>) {
        let res = self.resource_mut(resource);
        res.handlers = options.into();
        res.touch_config();
    }

    // -
    // Derived collections

    /// Active nodes of a resource, in arena order.
    pub fn nodes(&self, resource: ResourceId) -> Collection<NodeId> {
        self.resource(resource)
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.active)
            .map(|(index, _)| NodeId {
                resource,
                index: index as u32,
            })
            .collect()
    }

    pub fn node_volumes(&self, node: NodeId) -> Collection<VolumeId> {
        self.node_state(node)
            .volumes
            .iter()
            .map(|v| VolumeId { node, vnr: v.vnr })
            .collect()
    }

    pub fn node_connections(&self, node: NodeId) -> Collection<ConnectionId> {
        self.node_state(node).connections.clone()
    }

    pub fn node_peer_devices(&self, node: NodeId) -> Collection<PeerDeviceId> {
        let mut result = Collection::new();
        for connection in self.node_state(node).connections.iter() {
            for volume in self.node_volumes(node).iter() {
                result.add(PeerDeviceId::new(connection, volume));
            }
        }
        result
    }

    pub fn volumes(&self, resource: ResourceId) -> Collection<VolumeId> {
        self.volumes_of(&self.nodes(resource))
    }

    pub fn connections(&self, resource: ResourceId) -> Collection<ConnectionId> {
        self.connections_of(&self.nodes(resource))
    }

    pub fn peer_devices(&self, resource: ResourceId) -> Collection<PeerDeviceId> {
        self.peer_devices_of(&self.nodes(resource))
    }

    /// Union of the member nodes' volumes.
    pub fn volumes_of(&self, nodes: &Collection<NodeId>) -> Collection<VolumeId> {
        nodes.union_map(|n| self.node_volumes(n))
    }

    /// Union of the member nodes' outbound connections.
    pub fn connections_of(&self, nodes: &Collection<NodeId>) -> Collection<ConnectionId> {
        nodes.union_map(|n| self.node_connections(n))
    }

    pub fn peer_devices_of(&self, nodes: &Collection<NodeId>) -> Collection<PeerDeviceId> {
        nodes.union_map(|n| self.node_peer_devices(n))
    }

    pub fn is_diskless(&self, volume: VolumeId) -> bool {
        self.node_state(volume.node)
            .volume(volume.vnr)
            .map(|v| v.diskless())
            .unwrap_or(true)
    }

    pub fn diskful_volumes(&self, volumes: &Collection<VolumeId>) -> Collection<VolumeId> {
        volumes.filtered(|v| !self.is_diskless(v))
    }

    pub fn diskless_volumes(&self, volumes: &Collection<VolumeId>) -> Collection<VolumeId> {
        volumes.filtered(|v| self.is_diskless(v))
    }

    /// Nodes that have at least one backed volume.
    pub fn diskful_nodes(&self, resource: ResourceId) -> Collection<NodeId> {
        self.nodes(resource).filtered(|n| self.node_state(n).diskful())
    }

    pub fn diskless_nodes(&self, resource: ResourceId) -> Collection<NodeId> {
        self.nodes(resource).filtered(|n| !self.node_state(n).diskful())
    }

    pub fn volumes_by_vnr(&self, resource: ResourceId, vnr: u32) -> Collection<VolumeId> {
        self.volumes(resource).filtered(|v| v.vnr == vnr)
    }

    pub fn peer_devices_by_vnr(&self, resource: ResourceId, vnr: u32) -> Collection<PeerDeviceId> {
        self.peer_devices(resource).filtered(|pd| pd.vnr == vnr)
    }

    /// All directed pairs from `from_nodes` to `to_nodes`; with `bidir`
    /// also the reverse of each pair.
    pub fn connections_between(
        &self,
        from_nodes: &Collection<NodeId>,
        to_nodes: &Collection<NodeId>,
        bidir: bool,
    ) -> Collection<ConnectionId> {
        let mut result = Collection::new();
        for from in from_nodes.iter() {
            for to in to_nodes.iter() {
                if from == to {
                    continue;
                }
                result.add(ConnectionId::new(from, to));
                if bidir {
                    result.add(ConnectionId::new(to, from));
                }
            }
        }
        result
    }

    // -
    // Configuration generation

    /// Regenerate and push the node's configuration when the topology
    /// changed since the last push; otherwise a no-op.
    pub fn update_config(&mut self, node: NodeId) -> Result<()> {
        if !self.node_state(node).config_stale {
            return Ok(());
        }
        let resource = self.resource(node.resource);
        let text = render_node_config(resource, &self.hosts, node.index);

        let host_name = self.host_of(node).name.clone();
        let artifact = self.settings.harness.log_dir.join(format!(
            "{}{}-{}",
            CONFIG_ARTIFACT_PREFIX,
            resource.name.replace('/', "_"),
            host_name
        ));
        fs::write(&artifact, &text)?;

        let remote_path = self
            .settings
            .harness
            .remote_resource_config_path(&resource.name);
        run_checked(
            self.executor.as_ref(),
            &host_name,
            &argv([
                "bash".to_string(),
                "-c".to_string(),
                format!("cat > {}", remote_path),
            ]),
            &ExecOptions::with_stdin(text),
        )?;
        self.node_mut(node).config_stale = false;
        debug!(host = host_name, "configuration pushed");
        Ok(())
    }

    // -
    // Command issuance

    /// Run a command on the node's host, refreshing its configuration
    /// first so no dependent command ever sees a stale config.
    pub fn run_on(&mut self, node: NodeId, command: &[String], options: &ExecOptions) -> Result<ExecOutcome> {
        self.update_config(node)?;
        let host = self.host_of(node).name.clone();
        run_checked(self.executor.as_ref(), &host, command, options)
    }

    /// Run the admin tool of the device under test on one node.
    pub fn admin(&mut self, node: NodeId, args: &[&str]) -> Result<ExecOutcome> {
        let global = self.settings.harness.remote_global_config_path();
        let mut command = argv(["drbdadm", "-c", global.as_str(), "-v"]);
        command.extend(args.iter().map(|a| a.to_string()));
        self.run_on(node, &command, &ExecOptions::default())
    }

    // -
    // Event streams

    /// Register the per-host event stream files and consume each stream's
    /// initial state dump up to its end marker.
    pub fn listen_to_events(&mut self) -> Result<()> {
        let mut targets = Vec::new();
        for host in &self.hosts {
            let path = self
                .settings
                .harness
                .log_dir
                .join(format!("{}{}", EVENTS_FILE_PREFIX, host.name));
            self.tracker.register_stream(&host.name, path);
            targets.push(WaitTarget {
                host: host.name.clone(),
                label: host.name.clone(),
                filter: EventFilter::new(),
            });
        }
        let mut spec = WaitSpec::new(
            EntityClass::Node,
            targets,
            vec![INITIAL_EVENTS_MARKER.to_string()],
        );
        spec.word_boundary = false;
        self.tracker.wait(&spec, &[])?;
        Ok(())
    }

    pub fn events_path(&self, host: HostId) -> std::path::PathBuf {
        self.settings
            .harness
            .log_dir
            .join(format!("{}{}", EVENTS_FILE_PREFIX, self.hosts[host.0 as usize].name))
    }

    /// Wait until the required patterns have matched once per entity, or
    /// fail on a forbidden pattern or the deadline.
    pub fn event<T: Waitable>(
        &mut self,
        entities: &Collection<T>,
        required: &[&str],
        opts: EventOpts,
    ) -> Result<Vec<EventMatch>> {
        let Some(first) = entities.first() else {
            return Ok(Vec::new());
        };
        let resource = first.resource();
        let targets: Vec<WaitTarget> = entities.iter().map(|e| e.wait_target(self)).collect();
        let spec = WaitSpec {
            class: T::class(),
            targets,
            required: required.iter().map(|p| p.to_string()).collect(),
            suppressed: opts.suppressed,
            timeout: opts.timeout,
            word_boundary: opts.word_boundary,
        };
        let forbidden = self.resource(resource).forbidden_patterns.to_vec();
        self.tracker.wait(&spec, &forbidden)
    }

    /// Scope filters by resource name only when more than one resource
    /// shares the event streams, to keep the single-resource logs clean.
    pub(crate) fn resource_name_filter(&self, resource: ResourceId) -> Option<String> {
        if self.resources.len() > 1 {
            Some(format!("name:{}", self.resource(resource).name))
        } else {
            None
        }
    }

    /// The smallest protocol version among the given nodes' hosts.
    pub fn min_protocol(&self, nodes: &Collection<NodeId>) -> Result<ProtocolVersion> {
        nodes
            .iter()
            .map(|n| self.host_of(n).protocol)
            .min()
            .ok_or_else(|| Error::Fatal("protocol version of an empty node set".into()))
    }
}

impl Waitable for NodeId {
    fn wait_target(&self, cluster: &Cluster) -> WaitTarget {
        let mut filter = EventFilter::new();
        if let Some(token) = cluster.resource_name_filter(self.resource) {
            filter.push(token);
        }
        WaitTarget {
            host: cluster.host_of(*self).name.clone(),
            label: self.to_string(),
            filter,
        }
    }
}

impl Waitable for VolumeId {
    fn wait_target(&self, cluster: &Cluster) -> WaitTarget {
        let mut target = self.node.wait_target(cluster);
        target.label = self.to_string();
        target.filter.push(format!("volume:{}", self.vnr));
        target
    }
}

impl Waitable for ConnectionId {
    fn wait_target(&self, cluster: &Cluster) -> WaitTarget {
        let mut target = self.from.wait_target(cluster);
        target.label = self.to_string();
        if cluster.host_of(self.from).protocol.supports_connection_blocks() {
            target.filter.push(format!("peer-node-id:{}", self.to.index));
        }
        target
    }
}

impl Waitable for PeerDeviceId {
    fn wait_target(&self, cluster: &Cluster) -> WaitTarget {
        let mut target = self.connection.from.wait_target(cluster);
        target.label = self.to_string();
        target.filter.push(format!("volume:{}", self.vnr));
        if cluster
            .host_of(self.connection.from)
            .protocol
            .supports_connection_blocks()
        {
            target
                .filter
                .push(format!("peer-node-id:{}", self.connection.to.index));
        }
        target
    }
}
