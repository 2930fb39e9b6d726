use super::*;
use crate::topology::Host;
use crate::topology::HostId;
use crate::topology::NodeState;
use crate::topology::ProtocolVersion;
use crate::topology::Resource;
use crate::topology::Transport;
use crate::topology::VolumeState;

fn hosts(protocol: ProtocolVersion) -> Vec<Host> {
    vec![
        Host::new("alpha", "10.0.0.1", protocol, 7789, 1),
        Host::new("beta", "10.0.0.2", protocol, 7789, 1),
    ]
}

fn resource_with_disk() -> Resource {
    let mut resource = Resource::new("r0", Transport::Tcp, false);
    for host_index in 0..2 {
        let mut node = NodeState::new(HostId(host_index), 7789);
        node.volumes.push(VolumeState {
            vnr: 0,
            minor: 1,
            disk: Some("/dev/scratch/r0-disk0".to_string()),
            meta: None,
        });
        resource.nodes.push(node);
    }
    resource
}

#[test]
fn test_modern_config_uses_node_ids_and_connection_blocks() {
    let resource = resource_with_disk();
    let text = render_node_config(&resource, &hosts(ProtocolVersion(9, 1, 0)), 0);

    assert!(text.contains("resource r0 {"));
    assert!(text.contains("on alpha {"));
    assert!(text.contains("node-id 0;"));
    assert!(text.contains("node-id 1;"));
    // addresses live in path blocks, not in the on blocks
    assert!(!text.contains("\n     address "));
    assert!(text.contains("connection {"));
    assert!(text.contains("host alpha address 10.0.0.1:7789;"));
    assert!(text.contains("host beta address 10.0.0.2:7789;"));
}

#[test]
fn test_legacy_config_embeds_addresses() {
    let resource = resource_with_disk();
    let text = render_node_config(&resource, &hosts(ProtocolVersion(8, 4, 11)), 0);

    assert!(text.contains("address 10.0.0.1:7789;"));
    assert!(text.contains("address 10.0.0.2:7789;"));
    assert!(!text.contains("node-id"));
    assert!(!text.contains("connection {"));
    assert!(!text.contains("path {"));
}

#[test]
fn test_volume_block_with_backing_disk() {
    let resource = resource_with_disk();
    let text = render_node_config(&resource, &hosts(ProtocolVersion(9, 1, 0)), 0);

    assert!(text.contains("volume 0 {"));
    assert!(text.contains("device /dev/drbd1;"));
    assert!(text.contains("disk /dev/scratch/r0-disk0;"));
    assert!(text.contains("meta-disk internal;"));
}

#[test]
fn test_diskless_volume_has_no_meta_disk() {
    let mut resource = Resource::new("r0", Transport::Tcp, false);
    let mut node = NodeState::new(HostId(0), 7789);
    node.volumes.push(VolumeState {
        vnr: 0,
        minor: 1,
        disk: None,
        meta: None,
    });
    resource.nodes.push(node);

    let text = render_node_config(&resource, &hosts(ProtocolVersion(9, 1, 0)), 0);
    assert!(text.contains("disk none;"));
    assert!(!text.contains("meta-disk"));
}

#[test]
fn test_flush_suppression_is_always_emitted() {
    let resource = resource_with_disk();
    let text = render_node_config(&resource, &hosts(ProtocolVersion(9, 1, 0)), 0);
    assert!(text.contains("disk-flushes no;"));
    assert!(text.contains("md-flushes no;"));
}

#[test]
fn test_transport_and_tls_lines() {
    let mut resource = resource_with_disk();
    resource.transport = Transport::Rdma;
    resource.tls = true;
    let text = render_node_config(&resource, &hosts(ProtocolVersion(9, 1, 0)), 0);
    assert!(text.contains("transport \"rdma\";"));
    assert!(text.contains("tls yes;"));

    let plain = render_node_config(&resource_with_disk(), &hosts(ProtocolVersion(9, 1, 0)), 0);
    assert!(!plain.contains("transport"));
    assert!(!plain.contains("tls"));
}

#[test]
fn test_multipath_hosts_get_one_path_block_per_address_pair() {
    let mut hosts = hosts(ProtocolVersion(9, 1, 0));
    hosts[0].add_address("10.1.0.1");
    hosts[1].add_address("10.1.0.2");

    let text = render_node_config(&resource_with_disk(), &hosts, 0);
    assert_eq!(text.matches("path {").count(), 2);
    assert!(text.contains("host alpha address 10.1.0.1:7789;"));
    assert!(text.contains("host beta address 10.1.0.2:7789;"));
}

#[test]
fn test_inactive_nodes_are_omitted() {
    let mut resource = resource_with_disk();
    resource.nodes[1].active = false;
    let text = render_node_config(&resource, &hosts(ProtocolVersion(9, 1, 0)), 0);
    assert!(!text.contains("on beta"));
    assert!(!text.contains("connection {"));
}

#[test]
fn test_option_strings_land_in_their_sections() {
    let mut resource = resource_with_disk();
    resource.net_options = "protocol C;".to_string();
    resource.handlers = "fence-peer \"true\";".to_string();
    let text = render_node_config(&resource, &hosts(ProtocolVersion(9, 1, 0)), 0);
    assert!(text.contains("protocol C;"));
    assert!(text.contains("fence-peer \"true\";"));
}

#[test]
fn test_global_config() {
    assert_eq!(
        render_global_config("repld-test", "/var/lib/repld-test"),
        "global { usage-count no; }\ninclude \"/var/lib/repld-test/repld-test*\";\n"
    );
}

#[test]
fn test_writer_indents_with_five_spaces() {
    let mut w = ConfigWriter::new();
    w.block("resource r0", |w| {
        w.block("volume 0", |w| {
            w.line("device /dev/drbd1;");
        });
    });
    let text = w.finish();
    assert!(text.contains("\n     volume 0 {"));
    assert!(text.contains("\n          device /dev/drbd1;"));
}

#[test]
fn test_writer_skips_empty_lines_and_splits_multiline_input() {
    let mut w = ConfigWriter::new();
    w.block("net", |w| {
        w.line("");
        w.line("ping-int 5;\nping-timeout 30;");
    });
    let text = w.finish();
    assert_eq!(text, "net {\n     ping-int 5;\n     ping-timeout 30;\n}\n\n");
}
