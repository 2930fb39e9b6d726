//! Resource-lifecycle operations: each one is a fixed composition of
//! command issuance and the event-wait for the expected resulting state.
//! The command shapes and event patterns mirror the admin tool of the
//! device under test.

use std::time::Duration;

use tracing::info;

use crate::events::EventMatch;
use crate::exec::argv;
use crate::exec::run_checked;
use crate::exec::ExecOptions;
use crate::topology::Collection;
use crate::topology::Cluster;
use crate::topology::ConnectionId;
use crate::topology::EventOpts;
use crate::topology::NodeId;
use crate::topology::ProtocolVersion;
use crate::topology::ResourceId;
use crate::topology::VolumeId;
use crate::Result;

/// Protocol cut-off below which shutdown and detach can legitimately emit
/// `disk:Failed`.
const LEGACY_CUTOFF: ProtocolVersion = ProtocolVersion(9, 0, 0);

impl Cluster {
    // -
    // Bring-up / teardown

    /// Bring the resource up on every node: one "create resource" event
    /// per node, then a disk-state transition for every backed volume.
    /// Once all nodes are up, connection interruptions become forbidden.
    pub fn up(&mut self, resource: ResourceId) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        nodes.for_each_try(|node| self.admin(node, &["up", &name]).map(|_| ()))?;

        self.event(&nodes, &[r"create resource"], EventOpts::default())?;

        let diskful = self.diskful_volumes(&self.volumes(resource));
        self.event(
            &diskful,
            &[r"device .* disk:(Attaching|Inconsistent|Outdated|Consistent|UpToDate)"],
            EventOpts::default(),
        )?;

        // Interrupted connections are tolerated while connecting; from here
        // on they indicate a real failure.
        let forbidden = &mut self.resource_mut(resource).forbidden_patterns;
        forbidden.add(r"connection:BrokenPipe");
        forbidden.add(r"connection:NetworkFailure");
        info!(resource = name, "resource up");
        Ok(())
    }

    /// Take the resource down on every node, serialized. A concurrent
    /// shutdown can legitimately break connections mid-flight, so those
    /// patterns are lifted for the duration; legacy nodes may also report
    /// `disk:Failed`.
    pub fn down(&mut self, resource: ResourceId) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);

        let mut lift = vec![r"connection:BrokenPipe", r"connection:NetworkFailure"];
        if self.min_protocol(&nodes)? < LEGACY_CUTOFF {
            lift.push(r"disk:Failed");
        }
        let lifted = self
            .resource_mut(resource)
            .forbidden_patterns
            .lift(&lift);

        let result = (|| -> Result<()> {
            for node in nodes.iter() {
                self.admin(node, &["down", &name])?;
                let one = Collection::from_members([node]);
                self.event(&one, &[r"destroy resource"], EventOpts::default())?;
            }
            Ok(())
        })();

        self.resource_mut(resource).forbidden_patterns.restore(lifted);
        result?;
        info!(resource = name, "resource down");
        Ok(())
    }

    /// Stepwise bring-up without connecting to any peer.
    pub fn up_unconnected(&mut self, resource: ResourceId) -> Result<()> {
        self.new_resource(resource)?;
        self.new_minor(resource)?;
        self.new_peer(resource)?;
        self.peer_device_options(resource, &[])?;
        self.new_path(resource)?;
        let diskful = self.diskful_volumes(&self.volumes(resource));
        self.attach(&diskful)?;
        self.event(
            &diskful,
            &[r"device .* disk:(Failed|Inconsistent|Outdated|Consistent|UpToDate)"],
            EventOpts::default(),
        )?;
        Ok(())
    }

    pub fn new_resource(&mut self, resource: ResourceId) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        nodes.for_each_try(|node| self.admin(node, &["new-resource", &name]).map(|_| ()))?;
        self.event(&nodes, &[r"create resource"], EventOpts::default())?;
        Ok(())
    }

    pub fn new_minor(&mut self, resource: ResourceId) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        nodes.for_each_try(|node| self.admin(node, &["new-minor", &name]).map(|_| ()))?;
        let volumes = self.volumes(resource);
        self.event(&volumes, &[r"create device"], EventOpts::default())?;
        Ok(())
    }

    pub fn new_peer(&mut self, resource: ResourceId) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        nodes.for_each_try(|node| self.admin(node, &["new-peer", &name]).map(|_| ()))?;
        let peer_devices = self.peer_devices(resource);
        self.event(&peer_devices, &[r"create peer-device"], EventOpts::default())?;
        Ok(())
    }

    pub fn new_path(&mut self, resource: ResourceId) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        nodes.for_each_try(|node| self.admin(node, &["new-path", &name]).map(|_| ()))?;
        let connections = self.connections(resource);
        self.event(&connections, &[r"create path"], EventOpts::default())?;
        Ok(())
    }

    pub fn peer_device_options(&mut self, resource: ResourceId, options: &[&str]) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        nodes.for_each_try(|node| {
            let mut args: Vec<&str> = vec!["peer-device-options", &name];
            args.extend_from_slice(options);
            self.admin(node, &args).map(|_| ())
        })
    }

    // -
    // Disk attachment

    /// Attach the backing disks of the given volumes.
    pub fn attach(&mut self, volumes: &Collection<VolumeId>) -> Result<()> {
        volumes.for_each_try(|volume| {
            let name = self.resource(volume.node.resource).name.clone();
            let target = format!("{}/{}", name, volume.vnr);
            self.admin(volume.node, &["attach", &target]).map(|_| ())
        })?;
        self.event(volumes, &[r"device .* disk:Attaching"], EventOpts::default())?;
        Ok(())
    }

    /// Detach the backing disks of the given volumes. Legacy nodes report
    /// a detach as `disk:Failed`, so that pattern is lifted around the
    /// operation for them.
    pub fn detach(&mut self, volumes: &Collection<VolumeId>) -> Result<()> {
        let Some(first) = volumes.first() else {
            return Ok(());
        };
        let resource = first.node.resource;
        let nodes: Collection<NodeId> = volumes.union_map(|v| Collection::from_members([v.node]));

        let mut lifted = Vec::new();
        if self.min_protocol(&nodes)? < LEGACY_CUTOFF {
            lifted = self
                .resource_mut(resource)
                .forbidden_patterns
                .lift(&[r"disk:Failed"]);
        }

        let result = (|| -> Result<()> {
            volumes.for_each_try(|volume| {
                let name = self.resource(resource).name.clone();
                let target = format!("{}/{}", name, volume.vnr);
                self.admin(volume.node, &["detach", &target]).map(|_| ())
            })?;
            self.event(volumes, &[r"device .* disk:(Failed|Detaching)"], EventOpts::default())?;
            self.event(volumes, &[r"device .* disk:Diskless"], EventOpts::default())?;
            Ok(())
        })();

        self.resource_mut(resource).forbidden_patterns.restore(lifted);
        result
    }

    // -
    // Connections

    /// The admin tool's name for a connection: peer-scoped on newer
    /// protocols, resource-wide on legacy ones.
    fn connection_context(&self, connection: ConnectionId) -> String {
        let name = &self.resource(connection.from.resource).name;
        if self.host_of(connection.from).protocol.supports_connection_blocks() {
            format!("{}:{}", name, self.host_of(connection.to).name)
        } else {
            name.clone()
        }
    }

    fn connection_command(
        &mut self,
        connections: &Collection<ConnectionId>,
        command: &str,
        state: &str,
        wait: bool,
        options: &[&str],
    ) -> Result<Vec<EventMatch>> {
        connections.for_each_try(|connection| {
            let context = self.connection_context(connection);
            let mut args = vec![command];
            args.extend_from_slice(options);
            args.push(&context);
            self.admin(connection.from, &args).map(|_| ())
        })?;
        if wait {
            let pattern = format!(r"connection .* connection:{}", state);
            return self.event(connections, &[&pattern], EventOpts::default());
        }
        Ok(Vec::new())
    }

    /// Establish the given directed connections and record them in each
    /// local node's connection set once the transition is observed.
    pub fn connect(&mut self, connections: &Collection<ConnectionId>) -> Result<()> {
        self.connection_command(connections, "connect", "Connecting", true, &[])?;
        for connection in connections.iter() {
            self.node_mut(connection.from).connections.add(connection);
        }
        Ok(())
    }

    /// Tear the given directed connections down; the topology is only
    /// mutated once StandAlone has been observed, keeping model and event
    /// outcome consistent.
    pub fn disconnect(&mut self, connections: &Collection<ConnectionId>, force: bool) -> Result<()> {
        let options: &[&str] = if force { &["--force"] } else { &[] };
        self.connection_command(connections, "disconnect", "StandAlone", true, options)?;
        for connection in connections.iter() {
            self.node_mut(connection.from).connections.remove(connection);
        }
        Ok(())
    }

    // -
    // Role transitions

    /// Promote a node. A forced promotion is only reported successful
    /// after every backed volume has confirmed up-to-date data, before the
    /// role transition is awaited.
    pub fn primary(&mut self, node: NodeId, force: bool) -> Result<()> {
        let name = self.resource(node.resource).name.clone();
        if force {
            self.admin(node, &["primary", "--force", &name])?;
            let diskful = self.diskful_volumes(&self.node_volumes(node));
            if !diskful.is_empty() {
                self.event(&diskful, &[r"device .* disk:UpToDate"], EventOpts::default())?;
            }
        } else {
            self.admin(node, &["primary", &name])?;
        }
        let one = Collection::from_members([node]);
        self.event(&one, &[r"resource .* role:Primary"], EventOpts::default())?;
        Ok(())
    }

    /// Demote a node back to secondary.
    pub fn secondary(&mut self, node: NodeId) -> Result<()> {
        let name = self.resource(node.resource).name.clone();
        self.admin(node, &["secondary", &name])?;
        let one = Collection::from_members([node]);
        self.event(&one, &[r"resource .* role:Secondary"], EventOpts::default())?;
        Ok(())
    }

    // -
    // Maintenance

    /// Re-apply the current configuration on one node.
    pub fn adjust(&mut self, node: NodeId) -> Result<()> {
        let name = self.resource(node.resource).name.clone();
        self.update_config(node)?;
        self.admin(node, &["adjust", &name])?;
        Ok(())
    }

    /// Wait until every node sees every backed peer volume as up to date.
    pub fn initial_resync(&mut self, resource: ResourceId, timeout: Duration) -> Result<()> {
        let diskful = self.diskful_nodes(resource);
        let diskless = self.diskless_nodes(resource);
        let Some(reference) = diskful.first() else {
            return Ok(());
        };
        let vnrs: Vec<u32> = self.node_volumes(reference).iter().map(|v| v.vnr).collect();

        let mut peer_devices = Collection::new();
        for observer in diskless.iter().chain(diskful.iter()) {
            for peer in diskful.iter() {
                if observer == peer {
                    continue;
                }
                for &vnr in &vnrs {
                    let connection = ConnectionId::new(observer, peer);
                    peer_devices.add(crate::topology::PeerDeviceId { connection, vnr });
                }
            }
        }
        self.event(
            &peer_devices,
            &[r"peer-device .* peer-disk:UpToDate"],
            EventOpts::timeout(timeout),
        )?;
        Ok(())
    }

    /// Rename the resource on every node. The model is only renamed after
    /// the rename event has been observed, because event filters may be
    /// scoped by resource name.
    pub fn rename(&mut self, resource: ResourceId, new_name: &str) -> Result<()> {
        let old_name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        nodes.for_each_try(|node| {
            let command = argv(["drbdsetup", "rename-resource", old_name.as_str(), new_name]);
            self.run_on(node, &command, &ExecOptions::default()).map(|_| ())
        })?;
        let pattern = format!(r"rename resource name:{} new_name:{}", old_name, new_name);
        self.event(&nodes, &[&pattern], EventOpts::default())?;
        let res = self.resource_mut(resource);
        res.name = new_name.to_string();
        res.touch_config();
        Ok(())
    }

    /// Best-effort teardown of a resource's remote state, without config
    /// refresh and with catch semantics so cleanup continues past broken
    /// nodes.
    pub fn cleanup(&mut self, resource: ResourceId) -> Result<()> {
        let name = self.resource(resource).name.clone();
        let nodes = self.nodes(resource);
        for node in nodes.iter() {
            let host = self.host_of(node).name.clone();
            let command = argv([
                "bash".to_string(),
                "-c".to_string(),
                format!("! [ -e /proc/drbd ] || drbdsetup down {}", name),
            ]);
            run_checked(
                self.executor_ref(),
                &host,
                &command,
                &ExecOptions::catching(),
            )?;
        }
        Ok(())
    }
}
