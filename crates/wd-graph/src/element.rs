//! Network elements.
//!
//! Nodes and links carry their common fields plus a closed `kind` variant;
//! consumers match on it exhaustively. All values are in the internal unit
//! set (m, L/s, kW, m³).

use wd_core::{Key, LinkStatus, LinkType, NodeType, TimeSeries};

pub type NodeKey = Key<Node>;
pub type LinkKey = Key<Link>;
pub type PatternKey = Key<Pattern>;
pub type CurveKey = Key<Curve>;

/// Per-step node results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeResults {
    pub head: TimeSeries,
    pub pressure: TimeSeries,
    pub demand: TimeSeries,
    /// Tanks only.
    pub level: TimeSeries,
}

impl NodeResults {
    pub fn clear(&mut self) {
        self.head.clear();
        self.pressure.clear();
        self.demand.clear();
        self.level.clear();
    }
}

/// Per-step link results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkResults {
    pub flow: TimeSeries,
    pub velocity: TimeSeries,
    /// Pumps only, kW.
    pub energy: TimeSeries,
    /// Pumps only, 1 running / 0 off.
    pub status: TimeSeries,
}

impl LinkResults {
    pub fn clear(&mut self) {
        self.flow.clear();
        self.velocity.clear();
        self.energy.clear();
        self.status.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Junction {
    pub base_demand: f64,
    pub demand_pattern: Option<String>,
}

/// Fixed-head source; its head is the node elevation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reservoir {
    pub head_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tank {
    pub initial_level: f64,
    pub min_level: f64,
    pub max_level: f64,
    pub diameter: f64,
    pub min_volume: f64,
}

impl Tank {
    /// Volume between the bottom and the max level of a cylindrical tank.
    pub fn max_volume(&self) -> f64 {
        std::f64::consts::PI * self.diameter * self.diameter / 4.0 * self.max_level
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Junction(Junction),
    Reservoir(Reservoir),
    Tank(Tank),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Junction(_) => NodeType::Junction,
            NodeKind::Reservoir(_) => NodeType::Reservoir,
            NodeKind::Tank(_) => NodeType::Tank,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub elevation: f64,
    /// Incident links; maintained by [`crate::Network`], never by the node.
    pub links: Vec<LinkKey>,
    pub results: NodeResults,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(elevation: f64, kind: NodeKind) -> Self {
        Self {
            elevation,
            links: Vec::new(),
            results: NodeResults::default(),
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn as_junction(&self) -> Option<&Junction> {
        match &self.kind {
            NodeKind::Junction(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_tank(&self) -> Option<&Tank> {
        match &self.kind {
            NodeKind::Tank(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub length: f64,
    pub diameter: f64,
    /// Hazen-Williams C.
    pub roughness: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pump {
    /// Rated power, kW.
    pub power: f64,
    pub design_flow: f64,
    pub design_head: f64,
    pub speed_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    Pipe(Pipe),
    Pump(Pump),
}

impl LinkKind {
    pub fn link_type(&self) -> LinkType {
        match self {
            LinkKind::Pipe(_) => LinkType::Pipe,
            LinkKind::Pump(_) => LinkType::Pump,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub from: NodeKey,
    pub to: NodeKey,
    pub initial_status: LinkStatus,
    pub results: LinkResults,
    pub kind: LinkKind,
}

impl Link {
    pub fn link_type(&self) -> LinkType {
        self.kind.link_type()
    }

    pub fn as_pipe(&self) -> Option<&Pipe> {
        match &self.kind {
            LinkKind::Pipe(p) => Some(p),
            LinkKind::Pump(_) => None,
        }
    }

    pub fn as_pump(&self) -> Option<&Pump> {
        match &self.kind {
            LinkKind::Pump(p) => Some(p),
            LinkKind::Pipe(_) => None,
        }
    }
}

/// Piecewise-constant multipliers, one per pattern period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    pub multipliers: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    pub points: Vec<(f64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tank_volume_d_equals_h() {
        let t = Tank {
            diameter: 2.0,
            max_level: 2.0,
            ..Tank::default()
        };
        assert!((t.max_volume() - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn kinds_map_to_types() {
        let n = Node::new(0.0, NodeKind::Tank(Tank::default()));
        assert_eq!(n.node_type(), NodeType::Tank);
        assert!(n.as_junction().is_none());
        assert!(n.as_tank().is_some());
    }
}
