//! Consistency checks for [`Network`].

use wd_core::{LinkType, NodeType};

use crate::error::{GraphError, GraphResult};
use crate::network::Network;

pub(crate) fn validate_network(net: &Network) -> GraphResult<()> {
    // Kind registries: same IDs as the supertype, pointing at the live key.
    for (id, node) in net.nodes().iter() {
        let key = net.nodes().key_of(id);
        if net.node_kind(node.node_type()).find(id).copied() != key {
            return Err(inconsistent(id, "node missing from its kind registry"));
        }
    }
    let kind_total: usize = [NodeType::Junction, NodeType::Reservoir, NodeType::Tank]
        .into_iter()
        .map(|ty| net.node_kind(ty).len())
        .sum();
    if kind_total != net.nodes().len() {
        return Err(inconsistent("", "node kind registries hold stale entries"));
    }

    for (id, link) in net.links().iter() {
        let key = net.links().key_of(id);
        if net.link_kind(link.link_type()).find(id).copied() != key {
            return Err(inconsistent(id, "link missing from its kind registry"));
        }
        let Some(key) = key else {
            return Err(inconsistent(id, "link without key"));
        };
        // Endpoints resolve and list the link back.
        for end in [link.from, link.to] {
            let node = net
                .nodes()
                .get(end)
                .ok_or_else(|| inconsistent(id, "dangling link endpoint"))?;
            if !node.links.contains(&key) {
                return Err(inconsistent(id, "endpoint lacks back-reference"));
            }
        }
    }
    let kind_total: usize = [LinkType::Pipe, LinkType::Pump]
        .into_iter()
        .map(|ty| net.link_kind(ty).len())
        .sum();
    if kind_total != net.links().len() {
        return Err(inconsistent("", "link kind registries hold stale entries"));
    }

    // Back-references point at live links that touch the node.
    for (id, node) in net.nodes().iter() {
        let Some(node_key) = net.nodes().key_of(id) else {
            return Err(inconsistent(id, "node without key"));
        };
        for &lk in &node.links {
            let link = net
                .links()
                .get(lk)
                .ok_or_else(|| inconsistent(id, "back-reference to erased link"))?;
            if link.from != node_key && link.to != node_key {
                return Err(inconsistent(id, "back-reference to unrelated link"));
            }
        }
    }

    Ok(())
}

fn inconsistent(id: &str, what: &'static str) -> GraphError {
    GraphError::Inconsistent {
        id: id.to_string(),
        what,
    }
}
