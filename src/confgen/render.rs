//! Deterministic rendering of the current topology into the configuration
//! text of the device under test.
//!
//! The emitted shape depends on the protocol version of the host the config
//! is rendered for: newer-protocol hosts get `node-id` lines plus explicit
//! pairwise `connection`/`path` blocks carrying address information, legacy
//! hosts embed the address directly in their `on` block and get no
//! connection blocks. This is a protocol-version branch, not an error
//! condition.

use crate::confgen::ConfigWriter;
use crate::topology::Host;
use crate::topology::NodeState;
use crate::topology::Resource;
use crate::topology::Transport;

/// Render the full configuration text for one node of a resource.
/// Deterministic in the current topology: node order, volume order and
/// connection order all follow arena order.
pub(crate) fn render_node_config(resource: &Resource, hosts: &[Host], node_index: u32) -> String {
    let node = &resource.nodes[node_index as usize];
    let host = &hosts[node.host.0 as usize];
    let modern = host.protocol.supports_connection_blocks();

    let mut w = ConfigWriter::new();
    w.block(&format!("resource {}", resource.name), |w| {
        w.block("handlers", |w| {
            w.line(resource.handlers());
        });

        w.block("options", |w| {
            w.line(resource.resource_options());
        });

        w.block("disk", |w| {
            w.line("disk-flushes no;");
            w.line("md-flushes no;");
            w.line(resource.disk_options());
        });

        w.block("net", |w| {
            if resource.transport != Transport::Tcp {
                w.line(&format!("transport \"{}\";", resource.transport.as_str()));
            }
            if resource.tls {
                w.line("tls yes;");
            }
            w.line(resource.net_options());
        });

        for (index, peer) in resource.nodes.iter().enumerate() {
            if !peer.active {
                continue;
            }
            render_host_block(w, hosts, peer, index as u32, modern);
        }

        if modern {
            render_connections(w, resource, hosts);
        }
    });

    w.finish()
}

fn render_host_block(w: &mut ConfigWriter, hosts: &[Host], node: &NodeState, node_id: u32, modern: bool) {
    let host = &hosts[node.host.0 as usize];
    w.block(&format!("on {}", host.name), |w| {
        if modern {
            w.line(&format!("node-id {};", node_id));
        } else {
            // legacy protocol: address embedded here, no connection blocks
            w.line(&format!("address {}:{};", host.address, node.port));
        }

        for volume in &node.volumes {
            w.block(&format!("volume {}", volume.vnr), |w| {
                w.line(&format!("device {};", volume.device()));
                w.line(&format!("disk {};", volume.disk.as_deref().unwrap_or("none")));
                if volume.disk.is_some() {
                    w.line(&format!(
                        "meta-disk {};",
                        volume.meta.as_deref().unwrap_or("internal")
                    ));
                }
            });
        }
    });
}

/// Pairwise connection declarations for the newer wire protocol. One `path`
/// block per matching address pair supports multi-path hosts.
fn render_connections(w: &mut ConfigWriter, resource: &Resource, hosts: &[Host]) {
    let active: Vec<(usize, &NodeState)> = resource
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.active)
        .collect();

    for (i, &(_, n1)) in active.iter().enumerate() {
        for &(_, n2) in active.iter().skip(i + 1) {
            let h1 = &hosts[n1.host.0 as usize];
            let h2 = &hosts[n2.host.0 as usize];
            w.block("connection", |w| {
                w.block("net", |_| {});
                for (a1, a2) in h1.addresses.iter().zip(h2.addresses.iter()) {
                    w.block("path", |w| {
                        w.line(&format!("host {} address {}:{};", h1.name, a1, n1.port));
                        w.line(&format!("host {} address {}:{};", h2.name, a2, n2.port));
                    });
                }
            });
        }
    }
}

/// The cluster-wide configuration pushed once per host; resource configs
/// are pulled in via the include glob.
pub(crate) fn render_global_config(job: &str, remote_config_dir: &str) -> String {
    format!(
        "global {{ usage-count no; }}\ninclude \"{}/{}*\";\n",
        remote_config_dir, job
    )
}
