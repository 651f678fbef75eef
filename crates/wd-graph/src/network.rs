//! The in-process network: element registries kept mutually consistent.

use wd_core::{LinkStatus, LinkType, NodeType};

use crate::element::{
    Curve, Link, LinkKey, LinkKind, LinkResults, Node, NodeKey, Pattern, Pipe, Pump, Tank,
};
use crate::error::{GraphError, GraphResult};
use crate::registry::Registry;
use crate::view::RegistryViewMut;

/// Owns every element of one network.
///
/// Nodes and links live in their supertype registries; the per-kind registries
/// (junctions, pipes, ...) map the same IDs to the owning keys. Every insert
/// and erase goes through this type so that both sides, and the node → link
/// back-references, never disagree.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Registry<Node>,
    links: Registry<Link>,
    junctions: Registry<NodeKey>,
    reservoirs: Registry<NodeKey>,
    tanks: Registry<NodeKey>,
    pipes: Registry<LinkKey>,
    pumps: Registry<LinkKey>,
    patterns: Registry<Pattern>,
    curves: Registry<Curve>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, id: impl Into<String>, mut node: Node) -> GraphResult<NodeKey> {
        let id = id.into();
        node.links.clear();
        let ty = node.node_type();
        let key = self.nodes.insert(id.clone(), node)?;
        if let Err(e) = self.node_kind_mut(ty).insert(id.clone(), key) {
            self.nodes.erase(&id);
            return Err(e);
        }
        Ok(key)
    }

    /// Insert a link between two existing nodes and wire both back-references.
    pub fn insert_link(
        &mut self,
        id: impl Into<String>,
        from: &str,
        to: &str,
        initial_status: LinkStatus,
        kind: LinkKind,
    ) -> GraphResult<LinkKey> {
        let id = id.into();
        let from_key = self
            .nodes
            .key_of(from)
            .ok_or_else(|| GraphError::InvalidReference {
                id: from.to_string(),
                what: "link start node",
            })?;
        let to_key = self
            .nodes
            .key_of(to)
            .ok_or_else(|| GraphError::InvalidReference {
                id: to.to_string(),
                what: "link end node",
            })?;

        let ty = kind.link_type();
        let link = Link {
            from: from_key,
            to: to_key,
            initial_status,
            results: LinkResults::default(),
            kind,
        };
        let key = self.links.insert(id.clone(), link)?;
        if let Err(e) = self.link_kind_mut(ty).insert(id.clone(), key) {
            self.links.erase(&id);
            return Err(e);
        }

        for end in [from_key, to_key] {
            if let Some(node) = self.nodes.get_mut(end)
                && !node.links.contains(&key)
            {
                node.links.push(key);
            }
        }
        Ok(key)
    }

    /// Detach a link from its endpoints and erase it; 0 if absent.
    pub fn erase_link(&mut self, id: &str) -> usize {
        let Some((key, link)) = self.links.take(id) else {
            return 0;
        };
        self.link_kind_mut(link.link_type()).erase(id);
        for end in [link.from, link.to] {
            if let Some(node) = self.nodes.get_mut(end) {
                node.links.retain(|k| *k != key);
            }
        }
        1
    }

    /// Erase a node together with every incident link; 0 if absent.
    pub fn erase_node(&mut self, id: &str) -> usize {
        if !self.nodes.contains(id) {
            return 0;
        }
        for link_id in self.incident_link_ids(id) {
            self.erase_link(&link_id);
        }
        match self.nodes.take(id) {
            Some((_, node)) => {
                self.node_kind_mut(node.node_type()).erase(id);
                1
            }
            None => 0,
        }
    }

    /// IDs of the links touching a node (empty if the node is absent).
    pub fn incident_link_ids(&self, id: &str) -> Vec<String> {
        self.nodes
            .find(id)
            .map(|node| {
                node.links
                    .iter()
                    .filter_map(|&k| self.links.id_of(k))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node(&self, id: &str) -> GraphResult<&Node> {
        self.nodes.find(id).ok_or_else(|| GraphError::NotFound {
            id: id.to_string(),
            what: "node",
        })
    }

    pub fn node_mut(&mut self, id: &str) -> GraphResult<&mut Node> {
        self.nodes.find_mut(id).ok_or_else(|| GraphError::NotFound {
            id: id.to_string(),
            what: "node",
        })
    }

    pub fn link(&self, id: &str) -> GraphResult<&Link> {
        self.links.find(id).ok_or_else(|| GraphError::NotFound {
            id: id.to_string(),
            what: "link",
        })
    }

    pub fn link_mut(&mut self, id: &str) -> GraphResult<&mut Link> {
        self.links.find_mut(id).ok_or_else(|| GraphError::NotFound {
            id: id.to_string(),
            what: "link",
        })
    }

    pub fn pipe(&self, id: &str) -> GraphResult<&Pipe> {
        self.link(id)?.as_pipe().ok_or_else(|| GraphError::KindMismatch {
            id: id.to_string(),
            expected: "pipe",
        })
    }

    pub fn pump(&self, id: &str) -> GraphResult<&Pump> {
        self.link(id)?.as_pump().ok_or_else(|| GraphError::KindMismatch {
            id: id.to_string(),
            expected: "pump",
        })
    }

    pub fn tank(&self, id: &str) -> GraphResult<&Tank> {
        self.node(id)?.as_tank().ok_or_else(|| GraphError::KindMismatch {
            id: id.to_string(),
            expected: "tank",
        })
    }

    /// Endpoint IDs of a link.
    pub fn endpoints(&self, id: &str) -> GraphResult<(&str, &str)> {
        let link = self.link(id)?;
        let from = self.nodes.id_of(link.from);
        let to = self.nodes.id_of(link.to);
        match (from, to) {
            (Some(f), Some(t)) => Ok((f, t)),
            _ => Err(GraphError::Inconsistent {
                id: id.to_string(),
                what: "link endpoint no longer exists",
            }),
        }
    }

    pub fn node_id(&self, key: NodeKey) -> Option<&str> {
        self.nodes.id_of(key)
    }

    pub fn link_id(&self, key: LinkKey) -> Option<&str> {
        self.links.id_of(key)
    }

    pub fn nodes(&self) -> &Registry<Node> {
        &self.nodes
    }

    pub fn links(&self) -> &Registry<Link> {
        &self.links
    }

    /// Mutable access to node data (results, properties); structure stays fixed.
    pub fn nodes_view_mut(&mut self) -> RegistryViewMut<'_, Node> {
        RegistryViewMut::all(&mut self.nodes)
    }

    pub fn links_view_mut(&mut self) -> RegistryViewMut<'_, Link> {
        RegistryViewMut::all(&mut self.links)
    }

    pub fn node_kind(&self, ty: NodeType) -> &Registry<NodeKey> {
        match ty {
            NodeType::Junction => &self.junctions,
            NodeType::Reservoir => &self.reservoirs,
            NodeType::Tank => &self.tanks,
        }
    }

    pub fn link_kind(&self, ty: LinkType) -> &Registry<LinkKey> {
        match ty {
            LinkType::Pipe => &self.pipes,
            LinkType::Pump => &self.pumps,
        }
    }

    fn node_kind_mut(&mut self, ty: NodeType) -> &mut Registry<NodeKey> {
        match ty {
            NodeType::Junction => &mut self.junctions,
            NodeType::Reservoir => &mut self.reservoirs,
            NodeType::Tank => &mut self.tanks,
        }
    }

    fn link_kind_mut(&mut self, ty: LinkType) -> &mut Registry<LinkKey> {
        match ty {
            LinkType::Pipe => &mut self.pipes,
            LinkType::Pump => &mut self.pumps,
        }
    }

    pub fn junctions(&self) -> &Registry<NodeKey> {
        &self.junctions
    }

    pub fn reservoirs(&self) -> &Registry<NodeKey> {
        &self.reservoirs
    }

    pub fn tanks(&self) -> &Registry<NodeKey> {
        &self.tanks
    }

    pub fn pipes(&self) -> &Registry<LinkKey> {
        &self.pipes
    }

    pub fn pumps(&self) -> &Registry<LinkKey> {
        &self.pumps
    }

    pub fn patterns(&self) -> &Registry<Pattern> {
        &self.patterns
    }

    pub fn patterns_mut(&mut self) -> &mut Registry<Pattern> {
        &mut self.patterns
    }

    pub fn curves(&self) -> &Registry<Curve> {
        &self.curves
    }

    pub fn curves_mut(&mut self) -> &mut Registry<Curve> {
        &mut self.curves
    }

    /// Wipe every node and link result series.
    pub fn clear_results(&mut self) {
        for (_, node) in self.nodes.iter_mut() {
            node.results.clear();
        }
        for (_, link) in self.links.iter_mut() {
            link.results.clear();
        }
    }

    /// Check the derived-index and back-reference invariants.
    pub fn validate(&self) -> GraphResult<()> {
        crate::validate::validate_network(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Junction, NodeKind, Reservoir};

    fn pipe() -> LinkKind {
        LinkKind::Pipe(Pipe {
            length: 100.0,
            diameter: 0.2,
            roughness: 100.0,
        })
    }

    fn small() -> Network {
        let mut net = Network::new();
        net.insert_node("R", Node::new(50.0, NodeKind::Reservoir(Reservoir::default())))
            .unwrap();
        for id in ["A", "B"] {
            net.insert_node(id, Node::new(10.0, NodeKind::Junction(Junction::default())))
                .unwrap();
        }
        net.insert_link("1", "R", "A", LinkStatus::Open, pipe()).unwrap();
        net.insert_link("2", "A", "B", LinkStatus::Open, pipe()).unwrap();
        net
    }

    #[test]
    fn kind_registries_follow_supertype() {
        let net = small();
        assert_eq!(net.nodes().len(), 3);
        assert_eq!(net.junctions().len(), 2);
        assert_eq!(net.reservoirs().len(), 1);
        assert_eq!(net.pipes().len(), 2);
        net.validate().unwrap();
    }

    #[test]
    fn missing_endpoint_is_invalid_reference() {
        let mut net = small();
        let err = net
            .insert_link("3", "A", "nowhere", LinkStatus::Open, pipe())
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidReference { .. }));
        assert_eq!(net.links().len(), 2);
    }

    #[test]
    fn erase_link_detaches_back_references() {
        let mut net = small();
        assert_eq!(net.node("A").unwrap().links.len(), 2);
        assert_eq!(net.erase_link("2"), 1);
        assert_eq!(net.erase_link("2"), 0);
        assert_eq!(net.node("A").unwrap().links.len(), 1);
        assert!(net.node("B").unwrap().links.is_empty());
        assert!(!net.pipes().contains("2"));
        net.validate().unwrap();
    }

    #[test]
    fn erase_node_takes_incident_links() {
        let mut net = small();
        assert_eq!(net.erase_node("A"), 1);
        assert!(net.links().is_empty());
        assert!(net.pipes().is_empty());
        assert!(net.node("R").unwrap().links.is_empty());
        assert_eq!(net.erase_node("A"), 0);
        net.validate().unwrap();
    }

    #[test]
    fn kind_accessors_reject_wrong_kind() {
        let net = small();
        assert!(net.pipe("1").is_ok());
        assert!(matches!(
            net.pump("1"),
            Err(GraphError::KindMismatch { expected: "pump", .. })
        ));
        assert_eq!(net.endpoints("2").unwrap(), ("A", "B"));
    }
}
