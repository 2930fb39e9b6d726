use super::*;
use crate::test_utils::cluster_with_hosts;
use crate::test_utils::two_node_cluster;
use crate::Error;
use crate::TopologyError;

#[test]
fn test_add_host_pushes_global_config() {
    let fixture = two_node_cluster();
    let issued = fixture.exec.issued_on("alpha");
    let push = issued
        .iter()
        .find(|c| c.joined().contains("cat >"))
        .expect("global config push");
    let stdin = push.stdin.as_deref().expect("config on stdin");
    assert!(stdin.contains("global { usage-count no; }"));
    assert!(stdin.contains("include \"/var/lib/repld-test/repld-test*\";"));
}

#[test]
fn test_create_resource_builds_all_pairs_connections() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");

    let nodes = fixture.cluster.nodes(resource);
    assert_eq!(nodes.len(), 2);
    let connections = fixture.cluster.connections(resource);
    assert_eq!(connections.len(), 2);
    for connection in connections.iter() {
        assert!(connections.contains(connection.reverse()));
    }
}

#[test]
fn test_duplicate_resource_name_is_rejected() {
    let mut fixture = two_node_cluster();
    fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");
    assert!(matches!(
        fixture.cluster.create_resource("r0", Transport::Tcp, false),
        Err(Error::Topology(TopologyError::DuplicateResource(_)))
    ));
}

#[test]
fn test_add_disk_on_all_nodes() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");

    let vnr = fixture.cluster.add_disk(resource, None, None).expect("disk");
    assert_eq!(vnr, 0);
    assert_eq!(fixture.cluster.add_disk(resource, None, None).expect("disk"), 1);

    let volumes = fixture.cluster.volumes(resource);
    assert_eq!(volumes.len(), 4);
    assert!(fixture.cluster.diskless_volumes(&volumes).is_empty());
    assert_eq!(fixture.cluster.diskful_nodes(resource).len(), 2);
}

#[test]
fn test_add_disk_with_diskless_nodes() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");

    let nodes = fixture.cluster.nodes(resource);
    let diskful = Collection::from_members([nodes.first().expect("first node")]);
    fixture
        .cluster
        .add_disk(resource, Some("10M"), Some(&diskful))
        .expect("disk");

    assert_eq!(fixture.cluster.diskful_nodes(resource).len(), 1);
    assert_eq!(fixture.cluster.diskless_nodes(resource).len(), 1);
    let volumes = fixture.cluster.volumes(resource);
    assert_eq!(fixture.cluster.diskful_volumes(&volumes).len(), 1);
    assert_eq!(fixture.cluster.diskless_volumes(&volumes).len(), 1);
}

#[test]
fn test_peer_devices_derive_from_connections_and_volumes() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");
    fixture.cluster.add_disk(resource, None, None).expect("disk");

    // one outbound connection and one volume per node
    let peer_devices = fixture.cluster.peer_devices(resource);
    assert_eq!(peer_devices.len(), 2);
    for pd in peer_devices.iter() {
        assert_eq!(pd.volume().node, pd.connection.from);
    }
}

#[test]
fn test_update_config_is_idempotent_until_touched() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");
    fixture.cluster.add_disk(resource, None, None).expect("disk");

    let node = fixture.cluster.nodes(resource).first().expect("node");
    fixture.cluster.update_config(node).expect("first push");
    fixture.cluster.update_config(node).expect("second push");

    let pushes = |fixture: &crate::test_utils::TestCluster| {
        fixture
            .exec
            .issued_on("alpha")
            .iter()
            .filter(|c| c.joined().contains("repld-test-r0.res"))
            .count()
    };
    assert_eq!(pushes(&fixture), 1);

    // any option change invalidates the rendered config
    fixture.cluster.set_net_options(resource, "protocol C;");
    fixture.cluster.update_config(node).expect("third push");
    assert_eq!(pushes(&fixture), 2);
}

#[test]
fn test_admin_invokes_tool_with_global_config() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");
    let node = fixture.cluster.nodes(resource).first().expect("node");

    fixture.cluster.admin(node, &["up", "r0"]).expect("admin");
    let issued = fixture.exec.issued_on("alpha");
    let last = issued.last().expect("command");
    assert_eq!(
        last.argv,
        [
            "drbdadm",
            "-c",
            "/var/lib/repld-test/repld-test.conf",
            "-v",
            "up",
            "r0"
        ]
    );
}

#[test]
fn test_remove_node_deactivates_but_keeps_indices() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");

    let nodes = fixture.cluster.nodes(resource);
    let gone = nodes.get(0).expect("node");
    let kept = nodes.get(1).expect("node");
    fixture.cluster.remove_node(gone);

    let remaining = fixture.cluster.nodes(resource);
    assert_eq!(remaining.len(), 1);
    // the surviving node keeps its original surrogate index
    assert_eq!(remaining.first(), Some(kept));
}

#[test]
fn test_connections_between() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");

    let nodes = fixture.cluster.nodes(resource);
    let from = Collection::from_members([nodes.get(0).expect("node")]);
    let to = Collection::from_members([nodes.get(1).expect("node")]);

    let one_way = fixture.cluster.connections_between(&from, &to, false);
    assert_eq!(one_way.len(), 1);
    let both_ways = fixture.cluster.connections_between(&from, &to, true);
    assert_eq!(both_ways.len(), 2);
}

#[test]
fn test_min_protocol_over_mixed_hosts() {
    let mut fixture = cluster_with_hosts(&[
        ("alpha", ProtocolVersion(9, 1, 0)),
        ("beta", ProtocolVersion(8, 4, 11)),
    ]);
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");
    let nodes = fixture.cluster.nodes(resource);
    assert_eq!(
        fixture.cluster.min_protocol(&nodes).expect("min"),
        ProtocolVersion(8, 4, 11)
    );
}

#[test]
fn test_wait_targets_scope_by_resource_name_only_when_shared() {
    let mut fixture = two_node_cluster();
    let r0 = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");
    let node = fixture.cluster.nodes(r0).first().expect("node");

    let lone = node.wait_target(&fixture.cluster);
    assert!(lone.filter.is_empty());

    fixture
        .cluster
        .create_resource("r1", Transport::Tcp, false)
        .expect("resource");
    let shared = node.wait_target(&fixture.cluster);
    assert!(shared.filter.matches("create resource name:r0"));
    assert!(!shared.filter.matches("create resource name:r1"));
}

#[test]
fn test_connection_targets_carry_peer_node_id_on_modern_hosts() {
    let mut fixture = two_node_cluster();
    let resource = fixture
        .cluster
        .create_resource("r0", Transport::Tcp, false)
        .expect("resource");

    let connection = fixture
        .cluster
        .connections(resource)
        .first()
        .expect("connection");
    let target = connection.wait_target(&fixture.cluster);
    let peer = format!("peer-node-id:{}", connection.to.index);
    assert!(target.filter.matches(&format!("connection {} connection:Connected", peer)));
    assert!(!target.filter.matches("connection peer-node-id:7 connection:Connected"));
}

#[test]
fn test_find_host() {
    let fixture = two_node_cluster();
    assert!(fixture.cluster.find_host("beta").is_ok());
    assert!(matches!(
        fixture.cluster.find_host("ghost"),
        Err(Error::Topology(TopologyError::UnknownHost(_)))
    ));
}
