//! Deterministic in-process engine.
//!
//! Holds the network in engine order (junctions first, then reservoirs and
//! tanks, links in insertion order) and solves each period with a
//! steady-state head propagation: sources fix their heads, pipes lose
//! Hazen-Williams head at the total system demand, running pumps add their
//! design head, and every other node takes the best head reachable from a
//! source. It is exact enough for ranking designs and fully reproducible,
//! which is what the transaction and objective layers need.

use std::collections::HashMap;

use wd_core::units::{from_internal, to_internal};
use wd_core::{FlowUnits, LinkStatus, LinkType, NodeType, Quantity};
use wd_project::{
    CurveDef, LATEST_VERSION, LinkDef, LinkKindDef, NetworkDef, NodeDef, NodeKindDef, OptionsDef,
    PatternDef, ProjectError, validate_network,
};

use crate::engine::{
    CountKind, DeleteAction, HydraulicEngine, LinkProperty, NodeProperty, RawResult,
    TimeParameter,
};
use crate::error::{EngineError, EngineResult};
use crate::status::StatusCode;

const HW_COEFFICIENT: f64 = 10.67;
const HW_FLOW_EXPONENT: f64 = 1.852;
const HW_DIAMETER_EXPONENT: f64 = 4.87;
const MAX_ID_LEN: usize = 31;

#[derive(Debug, Clone)]
struct NodeState {
    id: String,
    ty: NodeType,
    elevation: f64,
    base_demand: f64,
    pattern: usize,
    init_level: f64,
    min_level: f64,
    max_level: f64,
    diameter: f64,
    min_volume: f64,
    head: f64,
    pressure: f64,
    demand: f64,
    level: f64,
}

impl NodeState {
    fn new(id: &str, ty: NodeType) -> Self {
        Self {
            id: id.to_string(),
            ty,
            elevation: 0.0,
            base_demand: 0.0,
            pattern: 0,
            init_level: 0.0,
            min_level: 0.0,
            max_level: 0.0,
            diameter: 0.0,
            min_volume: 0.0,
            head: 0.0,
            pressure: 0.0,
            demand: 0.0,
            level: 0.0,
        }
    }

    fn clear_results(&mut self) {
        self.head = 0.0;
        self.pressure = 0.0;
        self.demand = 0.0;
        self.level = self.init_level;
    }
}

#[derive(Debug, Clone)]
struct LinkState {
    id: String,
    ty: LinkType,
    from: String,
    to: String,
    length: f64,
    diameter: f64,
    roughness: f64,
    status: LinkStatus,
    power: f64,
    design_flow: f64,
    design_head: f64,
    pattern: usize,
    flow: f64,
    velocity: f64,
    energy: f64,
    running: f64,
}

impl LinkState {
    fn new(id: &str, ty: LinkType, from: &str, to: &str) -> Self {
        Self {
            id: id.to_string(),
            ty,
            from: from.to_string(),
            to: to.to_string(),
            length: 330.0,
            diameter: 10.0,
            roughness: 130.0,
            status: LinkStatus::Open,
            power: 0.0,
            design_flow: 0.0,
            design_head: 0.0,
            pattern: 0,
            flow: 0.0,
            velocity: 0.0,
            energy: 0.0,
            running: 0.0,
        }
    }

    fn clear_results(&mut self) {
        self.flow = 0.0;
        self.velocity = 0.0;
        self.energy = 0.0;
        self.running = 0.0;
    }
}

/// Results of one period, in engine units.
struct Solution {
    status: StatusCode,
    nodes: Vec<(f64, f64, f64)>,
    links: Vec<(f64, f64, f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct MemoryEngine {
    name: String,
    options: OptionsDef,
    nodes: Vec<NodeState>,
    links: Vec<LinkState>,
    patterns: Vec<PatternDef>,
    curves: Vec<CurveDef>,
    hydraulics_open: bool,
    clock: u64,
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && !id.chars().any(|c| c.is_whitespace() || c == ';' || c == '"')
}

fn pattern_code(value: f64, n_patterns: usize) -> RawResult<usize> {
    let code = value.round();
    if code < 0.0 || code as usize > n_patterns {
        return Err(StatusCode::UNDEFINED_PATTERN);
    }
    Ok(code as usize)
}

/// Hazen-Williams resistance, length and diameter in m, flow in m³/s.
fn hw_resistance(length: f64, diameter: f64, roughness: f64) -> f64 {
    HW_COEFFICIENT * length
        / (roughness.powf(HW_FLOW_EXPONENT) * diameter.powf(HW_DIAMETER_EXPONENT))
}

impl MemoryEngine {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn node_at(&self, index: usize) -> RawResult<&NodeState> {
        index
            .checked_sub(1)
            .and_then(|i| self.nodes.get(i))
            .ok_or(StatusCode::UNDEFINED_NODE)
    }

    fn node_at_mut(&mut self, index: usize) -> RawResult<&mut NodeState> {
        index
            .checked_sub(1)
            .and_then(|i| self.nodes.get_mut(i))
            .ok_or(StatusCode::UNDEFINED_NODE)
    }

    fn link_at(&self, index: usize) -> RawResult<&LinkState> {
        index
            .checked_sub(1)
            .and_then(|i| self.links.get(i))
            .ok_or(StatusCode::UNDEFINED_LINK)
    }

    fn link_at_mut(&mut self, index: usize) -> RawResult<&mut LinkState> {
        index
            .checked_sub(1)
            .and_then(|i| self.links.get_mut(i))
            .ok_or(StatusCode::UNDEFINED_LINK)
    }

    fn pattern_ref(&self, id: Option<&str>) -> RawResult<usize> {
        match id {
            Some(id) => self.pattern_index(id),
            None => Ok(0),
        }
    }

    fn pattern_name(&self, index: usize) -> Option<String> {
        index
            .checked_sub(1)
            .and_then(|i| self.patterns.get(i))
            .map(|p| p.id.clone())
    }

    fn multiplier(&self, pattern: usize, period: usize) -> f64 {
        match pattern.checked_sub(1).and_then(|i| self.patterns.get(i)) {
            Some(p) if !p.multipliers.is_empty() => p.multipliers[period % p.multipliers.len()],
            _ => 1.0,
        }
    }

    fn clear_results(&mut self) {
        self.nodes.iter_mut().for_each(NodeState::clear_results);
        self.links.iter_mut().for_each(LinkState::clear_results);
    }

    fn load_node(&mut self, def: &NodeDef) -> RawResult<()> {
        let (ty, pattern) = match &def.kind {
            NodeKindDef::Junction { pattern, .. } => (NodeType::Junction, pattern.as_deref()),
            NodeKindDef::Reservoir { pattern } => (NodeType::Reservoir, pattern.as_deref()),
            NodeKindDef::Tank { .. } => (NodeType::Tank, None),
        };
        let pattern = self.pattern_ref(pattern)?;
        let index = self.add_node(&def.id, ty)?;
        let node = self.node_at_mut(index)?;
        node.elevation = def.elevation;
        node.pattern = pattern;
        match def.kind {
            NodeKindDef::Junction { base_demand, .. } => node.base_demand = base_demand,
            NodeKindDef::Reservoir { .. } => {}
            NodeKindDef::Tank {
                initial_level,
                min_level,
                max_level,
                diameter,
                min_volume,
            } => {
                node.init_level = initial_level;
                node.level = initial_level;
                node.min_level = min_level;
                node.max_level = max_level;
                node.diameter = diameter;
                node.min_volume = min_volume;
            }
        }
        Ok(())
    }

    fn load_link(&mut self, def: &LinkDef) -> RawResult<()> {
        let ty = match def.kind {
            LinkKindDef::Pipe { .. } => LinkType::Pipe,
            LinkKindDef::Pump { .. } => LinkType::Pump,
        };
        let pattern = match &def.kind {
            LinkKindDef::Pump { pattern, .. } => self.pattern_ref(pattern.as_deref())?,
            LinkKindDef::Pipe { .. } => 0,
        };
        let index = self.add_link(&def.id, ty, &def.from, &def.to)?;
        let link = self.link_at_mut(index)?;
        link.status = def.status;
        link.pattern = pattern;
        match def.kind {
            LinkKindDef::Pipe {
                length,
                diameter,
                roughness,
            } => {
                link.length = length;
                link.diameter = diameter;
                link.roughness = roughness;
            }
            LinkKindDef::Pump {
                power,
                design_flow,
                design_head,
                ..
            } => {
                link.power = power;
                link.design_flow = design_flow;
                link.design_head = design_head;
            }
        }
        Ok(())
    }

    fn solve(&self, t: u64) -> Solution {
        let units = self.options.flow_units;
        let period = (t / self.options.pattern_step_s.max(1)) as usize;
        let metres = |v: f64| to_internal(v, Quantity::Length, units);

        let n = self.nodes.len();
        let mut fixed: Vec<Option<f64>> = vec![None; n];
        let mut demands = vec![0.0; n];
        let mut total_lps = 0.0;
        for (i, node) in self.nodes.iter().enumerate() {
            match node.ty {
                NodeType::Junction => {
                    demands[i] = node.base_demand * self.multiplier(node.pattern, period);
                    total_lps += to_internal(demands[i], Quantity::Flow, units);
                }
                NodeType::Reservoir => {
                    fixed[i] = Some(metres(node.elevation * self.multiplier(node.pattern, period)))
                }
                NodeType::Tank => fixed[i] = Some(metres(node.elevation + node.init_level)),
            }
        }
        if fixed.iter().all(Option::is_none) {
            return Solution {
                status: StatusCode::UNSOLVABLE,
                nodes: Vec::new(),
                links: Vec::new(),
            };
        }
        let total_flow = total_lps.max(0.0) / 1000.0;

        let position: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect();
        let ends: Vec<(usize, usize)> = self
            .links
            .iter()
            .map(|l| (position[l.from.as_str()], position[l.to.as_str()]))
            .collect();

        // Directed arcs with the head change along them.
        let mut arcs = Vec::new();
        let mut resistance = vec![0.0; self.links.len()];
        let mut running = vec![false; self.links.len()];
        for (k, link) in self.links.iter().enumerate() {
            let (a, b) = ends[k];
            match link.ty {
                LinkType::Pipe => {
                    let d = to_internal(link.diameter, Quantity::Diameter, units);
                    if link.status == LinkStatus::Closed || d <= 0.0 {
                        continue;
                    }
                    resistance[k] = hw_resistance(metres(link.length), d, link.roughness);
                    let loss = resistance[k] * total_flow.powf(HW_FLOW_EXPONENT);
                    arcs.push((a, b, -loss));
                    arcs.push((b, a, -loss));
                }
                LinkType::Pump => {
                    running[k] = link.status == LinkStatus::Open
                        && self.multiplier(link.pattern, period) > 0.0;
                    if running[k] {
                        arcs.push((a, b, metres(link.design_head)));
                    }
                }
            }
        }

        let mut heads = fixed.clone();
        for _ in 0..n {
            let mut changed = false;
            for &(u, v, gain) in &arcs {
                if fixed[v].is_some() {
                    continue;
                }
                if let Some(hu) = heads[u] {
                    let candidate = hu + gain;
                    if heads[v].is_none_or(|hv| candidate > hv + 1e-12) {
                        heads[v] = Some(candidate);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        // Link results in internal units: flow (L/s), velocity (m/s), energy (kW), running.
        let internal: Vec<(f64, f64, f64, f64)> = self
            .links
            .iter()
            .enumerate()
            .map(|(k, link)| {
                let (a, b) = ends[k];
                match link.ty {
                    LinkType::Pump if running[k] => (
                        to_internal(link.design_flow, Quantity::Flow, units),
                        0.0,
                        to_internal(link.power, Quantity::Power, units),
                        1.0,
                    ),
                    LinkType::Pump => (0.0, 0.0, 0.0, 0.0),
                    LinkType::Pipe => {
                        let open = if link.status == LinkStatus::Open { 1.0 } else { 0.0 };
                        let (Some(ha), Some(hb)) = (heads[a], heads[b]) else {
                            return (0.0, 0.0, 0.0, open);
                        };
                        if resistance[k] <= 0.0 {
                            return (0.0, 0.0, 0.0, open);
                        }
                        let dh = ha - hb;
                        let q = dh.signum() * (dh.abs() / resistance[k]).powf(1.0 / HW_FLOW_EXPONENT);
                        let d = to_internal(link.diameter, Quantity::Diameter, units);
                        let velocity = q.abs() / (std::f64::consts::PI * d * d / 4.0);
                        (q * 1000.0, velocity, 0.0, open)
                    }
                }
            })
            .collect();

        // Sources report their net inflow as demand (negative while supplying).
        let mut inflow = vec![0.0; n];
        for (k, &(q, ..)) in internal.iter().enumerate() {
            let (a, b) = ends[k];
            inflow[a] -= q;
            inflow[b] += q;
        }

        let mut status = StatusCode::OK;
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let head = heads[i].unwrap_or(0.0);
                let pressure = head - metres(node.elevation);
                if node.ty == NodeType::Junction && (heads[i].is_none() || pressure < 0.0) {
                    status = StatusCode::NEGATIVE_PRESSURE;
                }
                let demand = match node.ty {
                    NodeType::Junction => demands[i],
                    NodeType::Reservoir | NodeType::Tank => {
                        from_internal(inflow[i], Quantity::Flow, units)
                    }
                };
                (
                    from_internal(head, Quantity::Length, units),
                    from_internal(pressure, Quantity::Pressure, units),
                    demand,
                )
            })
            .collect();

        let links = internal
            .into_iter()
            .zip(&self.links)
            .map(|((q, velocity, energy, running), link)| {
                let flow = match link.ty {
                    // Pumps report their design flow exactly.
                    LinkType::Pump if running > 0.0 => link.design_flow,
                    _ => from_internal(q, Quantity::Flow, units),
                };
                (
                    flow,
                    from_internal(velocity, Quantity::Velocity, units),
                    energy,
                    running,
                )
            })
            .collect();

        Solution {
            status,
            nodes,
            links,
        }
    }
}

impl HydraulicEngine for MemoryEngine {
    fn open(def: &NetworkDef) -> EngineResult<Self> {
        validate_network(def).map_err(ProjectError::from)?;
        let mut engine = MemoryEngine {
            name: def.name.clone(),
            options: def.options.clone(),
            nodes: Vec::with_capacity(def.nodes.len()),
            links: Vec::with_capacity(def.links.len()),
            patterns: def.patterns.clone(),
            curves: def.curves.clone(),
            hydraulics_open: false,
            clock: 0,
        };
        for node in &def.nodes {
            engine
                .load_node(node)
                .map_err(|code| EngineError::Status { code, op: "open" })?;
        }
        for link in &def.links {
            engine
                .load_link(link)
                .map_err(|code| EngineError::Status { code, op: "open" })?;
        }
        tracing::debug!(
            name = %engine.name,
            nodes = engine.nodes.len(),
            links = engine.links.len(),
            "memory engine opened"
        );
        Ok(engine)
    }

    fn export(&self) -> RawResult<NetworkDef> {
        let nodes = self
            .nodes
            .iter()
            .map(|n| NodeDef {
                id: n.id.clone(),
                elevation: n.elevation,
                kind: match n.ty {
                    NodeType::Junction => NodeKindDef::Junction {
                        base_demand: n.base_demand,
                        pattern: self.pattern_name(n.pattern),
                    },
                    NodeType::Reservoir => NodeKindDef::Reservoir {
                        pattern: self.pattern_name(n.pattern),
                    },
                    NodeType::Tank => NodeKindDef::Tank {
                        initial_level: n.init_level,
                        min_level: n.min_level,
                        max_level: n.max_level,
                        diameter: n.diameter,
                        min_volume: n.min_volume,
                    },
                },
            })
            .collect();
        let links = self
            .links
            .iter()
            .map(|l| LinkDef {
                id: l.id.clone(),
                from: l.from.clone(),
                to: l.to.clone(),
                status: l.status,
                kind: match l.ty {
                    LinkType::Pipe => LinkKindDef::Pipe {
                        length: l.length,
                        diameter: l.diameter,
                        roughness: l.roughness,
                    },
                    LinkType::Pump => LinkKindDef::Pump {
                        power: l.power,
                        design_flow: l.design_flow,
                        design_head: l.design_head,
                        pattern: self.pattern_name(l.pattern),
                    },
                },
            })
            .collect();
        Ok(NetworkDef {
            version: LATEST_VERSION,
            name: self.name.clone(),
            options: self.options.clone(),
            nodes,
            links,
            patterns: self.patterns.clone(),
            curves: self.curves.clone(),
        })
    }

    fn flow_units(&self) -> FlowUnits {
        self.options.flow_units
    }

    fn count(&self, what: CountKind) -> usize {
        match what {
            CountKind::Nodes => self.nodes.len(),
            CountKind::Tanks => self.nodes.iter().filter(|n| n.ty.is_source()).count(),
            CountKind::Links => self.links.len(),
            CountKind::Patterns => self.patterns.len(),
            CountKind::Curves => self.curves.len(),
        }
    }

    fn node_index(&self, id: &str) -> RawResult<usize> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .map(|i| i + 1)
            .ok_or(StatusCode::UNDEFINED_NODE)
    }

    fn node_id(&self, index: usize) -> RawResult<String> {
        Ok(self.node_at(index)?.id.clone())
    }

    fn node_type(&self, index: usize) -> RawResult<NodeType> {
        Ok(self.node_at(index)?.ty)
    }

    fn link_index(&self, id: &str) -> RawResult<usize> {
        self.links
            .iter()
            .position(|l| l.id == id)
            .map(|i| i + 1)
            .ok_or(StatusCode::UNDEFINED_LINK)
    }

    fn link_id(&self, index: usize) -> RawResult<String> {
        Ok(self.link_at(index)?.id.clone())
    }

    fn link_type(&self, index: usize) -> RawResult<LinkType> {
        Ok(self.link_at(index)?.ty)
    }

    fn link_nodes(&self, index: usize) -> RawResult<(usize, usize)> {
        let link = self.link_at(index)?;
        Ok((self.node_index(&link.from)?, self.node_index(&link.to)?))
    }

    fn pattern_index(&self, id: &str) -> RawResult<usize> {
        self.patterns
            .iter()
            .position(|p| p.id == id)
            .map(|i| i + 1)
            .ok_or(StatusCode::UNDEFINED_PATTERN)
    }

    fn pattern_id(&self, index: usize) -> RawResult<String> {
        self.pattern_name(index).ok_or(StatusCode::UNDEFINED_PATTERN)
    }

    fn pattern(&self, index: usize) -> RawResult<Vec<f64>> {
        index
            .checked_sub(1)
            .and_then(|i| self.patterns.get(i))
            .map(|p| p.multipliers.clone())
            .ok_or(StatusCode::UNDEFINED_PATTERN)
    }

    fn set_pattern(&mut self, index: usize, multipliers: &[f64]) -> RawResult<()> {
        if multipliers.is_empty() || multipliers.iter().any(|m| !m.is_finite()) {
            return Err(StatusCode::ILLEGAL_NUMERIC_VALUE);
        }
        let pattern = index
            .checked_sub(1)
            .and_then(|i| self.patterns.get_mut(i))
            .ok_or(StatusCode::UNDEFINED_PATTERN)?;
        pattern.multipliers = multipliers.to_vec();
        Ok(())
    }

    fn add_pattern(&mut self, id: &str) -> RawResult<usize> {
        if !valid_id(id) {
            return Err(StatusCode::INVALID_ID);
        }
        if self.pattern_index(id).is_ok() {
            return Err(StatusCode::DUPLICATE_ID);
        }
        self.patterns.push(PatternDef {
            id: id.to_string(),
            multipliers: vec![1.0],
        });
        Ok(self.patterns.len())
    }

    fn curve_index(&self, id: &str) -> RawResult<usize> {
        self.curves
            .iter()
            .position(|c| c.id == id)
            .map(|i| i + 1)
            .ok_or(StatusCode::UNDEFINED_CURVE)
    }

    fn curve_id(&self, index: usize) -> RawResult<String> {
        index
            .checked_sub(1)
            .and_then(|i| self.curves.get(i))
            .map(|c| c.id.clone())
            .ok_or(StatusCode::UNDEFINED_CURVE)
    }

    fn curve(&self, index: usize) -> RawResult<Vec<(f64, f64)>> {
        index
            .checked_sub(1)
            .and_then(|i| self.curves.get(i))
            .map(|c| c.points.clone())
            .ok_or(StatusCode::UNDEFINED_CURVE)
    }

    fn node_value(&self, index: usize, property: NodeProperty) -> RawResult<f64> {
        let node = self.node_at(index)?;
        let tank = |v: f64| {
            if node.ty == NodeType::Tank {
                Ok(v)
            } else {
                Err(StatusCode::ILLEGAL_PARAMETER)
            }
        };
        match property {
            NodeProperty::Elevation => Ok(node.elevation),
            NodeProperty::BaseDemand => Ok(node.base_demand),
            NodeProperty::Pattern => Ok(node.pattern as f64),
            NodeProperty::InitLevel => tank(node.init_level),
            NodeProperty::MinLevel => tank(node.min_level),
            NodeProperty::MaxLevel => tank(node.max_level),
            NodeProperty::TankDiameter => tank(node.diameter),
            NodeProperty::MinVolume => tank(node.min_volume),
            NodeProperty::Head => Ok(node.head),
            NodeProperty::Pressure => Ok(node.pressure),
            NodeProperty::Demand => Ok(node.demand),
            NodeProperty::Level => Ok(node.level),
        }
    }

    fn set_node_value(
        &mut self,
        index: usize,
        property: NodeProperty,
        value: f64,
    ) -> RawResult<()> {
        if !value.is_finite() {
            return Err(StatusCode::ILLEGAL_NUMERIC_VALUE);
        }
        if property.is_result() {
            return Err(StatusCode::ILLEGAL_PARAMETER);
        }
        let n_patterns = self.patterns.len();
        let node = self.node_at_mut(index)?;
        let is_tank = node.ty == NodeType::Tank;
        match property {
            NodeProperty::Elevation => node.elevation = value,
            NodeProperty::BaseDemand if node.ty == NodeType::Junction => node.base_demand = value,
            NodeProperty::Pattern if !is_tank => node.pattern = pattern_code(value, n_patterns)?,
            NodeProperty::InitLevel if is_tank => {
                node.init_level = value;
                node.level = value;
            }
            NodeProperty::MinLevel if is_tank => node.min_level = value,
            NodeProperty::MaxLevel if is_tank => node.max_level = value,
            NodeProperty::TankDiameter if is_tank => {
                if value <= 0.0 {
                    return Err(StatusCode::ILLEGAL_NUMERIC_VALUE);
                }
                node.diameter = value;
            }
            NodeProperty::MinVolume if is_tank => node.min_volume = value,
            _ => return Err(StatusCode::ILLEGAL_PARAMETER),
        }
        Ok(())
    }

    fn link_value(&self, index: usize, property: LinkProperty) -> RawResult<f64> {
        let link = self.link_at(index)?;
        let is_pump = link.ty == LinkType::Pump;
        match property {
            LinkProperty::Diameter if !is_pump => Ok(link.diameter),
            LinkProperty::Length if !is_pump => Ok(link.length),
            LinkProperty::Roughness if !is_pump => Ok(link.roughness),
            LinkProperty::InitStatus => Ok(link.status.as_value()),
            LinkProperty::PumpPower if is_pump => Ok(link.power),
            LinkProperty::DesignFlow if is_pump => Ok(link.design_flow),
            LinkProperty::DesignHead if is_pump => Ok(link.design_head),
            LinkProperty::PumpPattern if is_pump => Ok(link.pattern as f64),
            LinkProperty::Flow => Ok(link.flow),
            LinkProperty::Velocity => Ok(link.velocity),
            LinkProperty::Energy => Ok(link.energy),
            LinkProperty::Status => Ok(link.running),
            _ => Err(StatusCode::ILLEGAL_PARAMETER),
        }
    }

    fn set_link_value(
        &mut self,
        index: usize,
        property: LinkProperty,
        value: f64,
    ) -> RawResult<()> {
        if !value.is_finite() {
            return Err(StatusCode::ILLEGAL_NUMERIC_VALUE);
        }
        if property.is_result() {
            return Err(StatusCode::ILLEGAL_PARAMETER);
        }
        let n_patterns = self.patterns.len();
        let link = self.link_at_mut(index)?;
        let is_pump = link.ty == LinkType::Pump;
        match property {
            LinkProperty::Diameter | LinkProperty::Length | LinkProperty::Roughness
                if !is_pump && value <= 0.0 =>
            {
                return Err(StatusCode::ILLEGAL_LINK_VALUE);
            }
            LinkProperty::Diameter if !is_pump => link.diameter = value,
            LinkProperty::Length if !is_pump => link.length = value,
            LinkProperty::Roughness if !is_pump => link.roughness = value,
            LinkProperty::InitStatus => link.status = LinkStatus::from_value(value),
            LinkProperty::PumpPower | LinkProperty::DesignFlow | LinkProperty::DesignHead
                if is_pump && value < 0.0 =>
            {
                return Err(StatusCode::ILLEGAL_LINK_VALUE);
            }
            LinkProperty::PumpPower if is_pump => link.power = value,
            LinkProperty::DesignFlow if is_pump => link.design_flow = value,
            LinkProperty::DesignHead if is_pump => link.design_head = value,
            LinkProperty::PumpPattern if is_pump => link.pattern = pattern_code(value, n_patterns)?,
            _ => return Err(StatusCode::ILLEGAL_PARAMETER),
        }
        Ok(())
    }

    fn add_node(&mut self, id: &str, ty: NodeType) -> RawResult<usize> {
        if !valid_id(id) {
            return Err(StatusCode::INVALID_ID);
        }
        if self.node_index(id).is_ok() {
            return Err(StatusCode::DUPLICATE_ID);
        }
        // Junctions stay ahead of reservoirs and tanks.
        let position = match ty {
            NodeType::Junction => self
                .nodes
                .iter()
                .take_while(|n| n.ty == NodeType::Junction)
                .count(),
            NodeType::Reservoir | NodeType::Tank => self.nodes.len(),
        };
        self.nodes.insert(position, NodeState::new(id, ty));
        tracing::trace!(id, index = position + 1, "engine node added");
        Ok(position + 1)
    }

    fn add_link(&mut self, id: &str, ty: LinkType, from: &str, to: &str) -> RawResult<usize> {
        if !valid_id(id) {
            return Err(StatusCode::INVALID_ID);
        }
        if self.link_index(id).is_ok() {
            return Err(StatusCode::DUPLICATE_ID);
        }
        self.node_index(from)?;
        self.node_index(to)?;
        if from == to {
            return Err(StatusCode::SAME_END_NODES);
        }
        self.links.push(LinkState::new(id, ty, from, to));
        tracing::trace!(id, index = self.links.len(), "engine link added");
        Ok(self.links.len())
    }

    fn delete_node(&mut self, index: usize, action: DeleteAction) -> RawResult<()> {
        let id = self.node_at(index)?.id.clone();
        let attached = self.links.iter().any(|l| l.from == id || l.to == id);
        if attached && action == DeleteAction::Conditional {
            return Err(StatusCode::NODE_HAS_LINKS);
        }
        self.links.retain(|l| l.from != id && l.to != id);
        self.nodes.remove(index - 1);
        Ok(())
    }

    fn delete_link(&mut self, index: usize, _action: DeleteAction) -> RawResult<()> {
        self.link_at(index)?;
        self.links.remove(index - 1);
        Ok(())
    }

    fn time_parameter(&self, which: TimeParameter) -> u64 {
        match which {
            TimeParameter::Duration => self.options.duration_s,
            TimeParameter::HydraulicStep => self.options.hydraulic_step_s,
            TimeParameter::PatternStep => self.options.pattern_step_s,
            TimeParameter::ReportStep => self.options.report_step_s,
        }
    }

    fn set_time_parameter(&mut self, which: TimeParameter, value: u64) -> RawResult<()> {
        if value == 0 && which != TimeParameter::Duration {
            return Err(StatusCode::ILLEGAL_OPTION_VALUE);
        }
        match which {
            TimeParameter::Duration => self.options.duration_s = value,
            TimeParameter::HydraulicStep => self.options.hydraulic_step_s = value,
            TimeParameter::PatternStep => self.options.pattern_step_s = value,
            TimeParameter::ReportStep => self.options.report_step_s = value,
        }
        Ok(())
    }

    fn open_hydraulics(&mut self) -> StatusCode {
        self.hydraulics_open = true;
        StatusCode::OK
    }

    fn init_hydraulics(&mut self) -> StatusCode {
        if !self.hydraulics_open {
            return StatusCode::HYDRAULICS_NOT_OPEN;
        }
        self.clock = 0;
        self.clear_results();
        StatusCode::OK
    }

    fn run_hydraulics_step(&mut self) -> (StatusCode, u64) {
        if !self.hydraulics_open {
            return (StatusCode::HYDRAULICS_NOT_OPEN, 0);
        }
        let solution = self.solve(self.clock);
        if solution.status.is_fatal() {
            tracing::warn!(t = self.clock, code = %solution.status, "no source in network");
            return (solution.status, self.clock);
        }
        for (node, (head, pressure, demand)) in self.nodes.iter_mut().zip(solution.nodes) {
            node.head = head;
            node.pressure = pressure;
            node.demand = demand;
            node.level = node.init_level;
        }
        for (link, (flow, velocity, energy, running)) in self.links.iter_mut().zip(solution.links) {
            link.flow = flow;
            link.velocity = velocity;
            link.energy = energy;
            link.running = running;
        }
        (solution.status, self.clock)
    }

    fn next_hydraulics_step(&mut self) -> (StatusCode, u64) {
        if !self.hydraulics_open {
            return (StatusCode::HYDRAULICS_NOT_OPEN, 0);
        }
        let duration = self.options.duration_s;
        if self.clock >= duration {
            return (StatusCode::OK, 0);
        }
        let step = self.options.hydraulic_step_s.min(duration - self.clock);
        self.clock += step;
        (StatusCode::OK, step)
    }

    fn close_hydraulics(&mut self) -> StatusCode {
        self.hydraulics_open = false;
        StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> NetworkDef {
        let mut def = NetworkDef::new("fixture");
        def.patterns = vec![PatternDef {
            id: "PUMP1".into(),
            multipliers: vec![0.0; 24],
        }];
        let junction = |id: &str, elevation: f64, base_demand: f64| NodeDef {
            id: id.into(),
            elevation,
            kind: NodeKindDef::Junction {
                base_demand,
                pattern: None,
            },
        };
        def.nodes = vec![
            NodeDef {
                id: "R1".into(),
                elevation: 100.0,
                kind: NodeKindDef::Reservoir { pattern: None },
            },
            junction("J1", 95.0, 0.0),
            junction("J2", 90.0, 10.0),
            junction("J3", 92.0, 8.0),
            NodeDef {
                id: "TK1".into(),
                elevation: 110.0,
                kind: NodeKindDef::Tank {
                    initial_level: 4.0,
                    min_level: 1.0,
                    max_level: 8.0,
                    diameter: 15.0,
                    min_volume: 0.0,
                },
            },
        ];
        let pipe = |id: &str, from: &str, to: &str, length: f64, diameter: f64| LinkDef {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            status: LinkStatus::Open,
            kind: LinkKindDef::Pipe {
                length,
                diameter,
                roughness: 100.0,
            },
        };
        def.links = vec![
            LinkDef {
                id: "PU1".into(),
                from: "R1".into(),
                to: "J1".into(),
                status: LinkStatus::Open,
                kind: LinkKindDef::Pump {
                    power: 30.0,
                    design_flow: 18.0,
                    design_head: 40.0,
                    pattern: Some("PUMP1".into()),
                },
            },
            pipe("P1", "J1", "J2", 1000.0, 300.0),
            pipe("P2", "J2", "J3", 800.0, 250.0),
            pipe("P3", "J3", "TK1", 500.0, 300.0),
        ];
        def
    }

    fn solve_first_period(engine: &mut MemoryEngine) -> StatusCode {
        assert!(engine.open_hydraulics().is_ok());
        assert!(engine.init_hydraulics().is_ok());
        let (code, t) = engine.run_hydraulics_step();
        assert_eq!(t, 0);
        code
    }

    #[test]
    fn junctions_are_indexed_before_sources() {
        let engine = MemoryEngine::open(&fixture()).unwrap();
        let order: Vec<String> = (1..=engine.count(CountKind::Nodes))
            .map(|i| engine.node_id(i).unwrap())
            .collect();
        assert_eq!(order, ["J1", "J2", "J3", "R1", "TK1"]);
        assert_eq!(engine.count(CountKind::Tanks), 2);
    }

    #[test]
    fn added_junction_shifts_source_indices() {
        let mut engine = MemoryEngine::open(&fixture()).unwrap();
        assert_eq!(engine.node_index("TK1").unwrap(), 5);
        assert_eq!(engine.add_node("J4", NodeType::Junction).unwrap(), 4);
        assert_eq!(engine.node_index("TK1").unwrap(), 6);
        assert_eq!(engine.add_node("T2", NodeType::Tank).unwrap(), 7);
    }

    #[test]
    fn structural_errors_use_engine_codes() {
        let mut engine = MemoryEngine::open(&fixture()).unwrap();
        assert_eq!(
            engine.add_node("J1", NodeType::Junction),
            Err(StatusCode::DUPLICATE_ID)
        );
        assert_eq!(
            engine.add_link("X", LinkType::Pipe, "J1", "NOPE"),
            Err(StatusCode::UNDEFINED_NODE)
        );
        assert_eq!(
            engine.add_link("X", LinkType::Pipe, "J1", "J1"),
            Err(StatusCode::SAME_END_NODES)
        );
        let j2 = engine.node_index("J2").unwrap();
        assert_eq!(
            engine.delete_node(j2, DeleteAction::Conditional),
            Err(StatusCode::NODE_HAS_LINKS)
        );
        engine.delete_node(j2, DeleteAction::Unconditional).unwrap();
        assert_eq!(engine.count(CountKind::Links), 2);
        assert!(engine.link_index("P1").is_err());
    }

    #[test]
    fn tank_properties_are_refused_on_junctions() {
        let mut engine = MemoryEngine::open(&fixture()).unwrap();
        let j1 = engine.node_index("J1").unwrap();
        assert_eq!(
            engine.set_node_value(j1, NodeProperty::TankDiameter, 3.0),
            Err(StatusCode::ILLEGAL_PARAMETER)
        );
        assert_eq!(
            engine.set_node_value(j1, NodeProperty::Head, 3.0),
            Err(StatusCode::ILLEGAL_PARAMETER)
        );
    }

    #[test]
    fn pump_schedule_drives_heads() {
        let mut engine = MemoryEngine::open(&fixture()).unwrap();
        let j1 = engine.node_index("J1").unwrap();
        let p3 = engine.link_index("P3").unwrap();
        let pu1 = engine.link_index("PU1").unwrap();

        assert_eq!(solve_first_period(&mut engine), StatusCode::OK);
        assert!(engine.node_value(j1, NodeProperty::Head).unwrap() < 114.0);
        assert!(engine.link_value(p3, LinkProperty::Flow).unwrap() < 0.0);
        assert_eq!(engine.link_value(pu1, LinkProperty::Energy).unwrap(), 0.0);

        engine.set_pattern(1, &[1.0; 24]).unwrap();
        engine.init_hydraulics();
        engine.run_hydraulics_step();
        assert!((engine.node_value(j1, NodeProperty::Head).unwrap() - 140.0).abs() < 1e-9);
        assert!(engine.link_value(p3, LinkProperty::Flow).unwrap() > 0.0);
        assert_eq!(engine.link_value(pu1, LinkProperty::Energy).unwrap(), 30.0);
        assert_eq!(engine.link_value(pu1, LinkProperty::Status).unwrap(), 1.0);
    }

    #[test]
    fn negative_pressure_is_a_warning() {
        let mut engine = MemoryEngine::open(&fixture()).unwrap();
        let j2 = engine.node_index("J2").unwrap();
        engine
            .set_node_value(j2, NodeProperty::Elevation, 200.0)
            .unwrap();
        let code = solve_first_period(&mut engine);
        assert_eq!(code, StatusCode::NEGATIVE_PRESSURE);
        assert!(engine.node_value(j2, NodeProperty::Pressure).unwrap() < 0.0);
    }

    #[test]
    fn network_without_source_is_fatal() {
        let mut engine = MemoryEngine::open(&fixture()).unwrap();
        for id in ["R1", "TK1"] {
            let index = engine.node_index(id).unwrap();
            engine
                .delete_node(index, DeleteAction::Unconditional)
                .unwrap();
        }
        assert!(solve_first_period(&mut engine).is_fatal());
    }

    #[test]
    fn stepping_covers_the_horizon() {
        let mut engine = MemoryEngine::open(&fixture()).unwrap();
        engine.open_hydraulics();
        engine.init_hydraulics();
        let mut periods = 0;
        loop {
            engine.run_hydraulics_step();
            periods += 1;
            let (_, step) = engine.next_hydraulics_step();
            if step == 0 {
                break;
            }
        }
        assert_eq!(periods, 25);
        assert_eq!(engine.close_hydraulics(), StatusCode::OK);
        assert_eq!(
            engine.run_hydraulics_step().0,
            StatusCode::HYDRAULICS_NOT_OPEN
        );
    }

    #[test]
    fn export_matches_source_in_engine_order() {
        let def = fixture();
        let engine = MemoryEngine::open(&def).unwrap();
        let exported = engine.export().unwrap();
        let ids: Vec<&str> = exported.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["J1", "J2", "J3", "R1", "TK1"]);
        assert_eq!(exported.links, def.links);
        assert_eq!(exported.patterns, def.patterns);
        let reopened = MemoryEngine::open(&exported).unwrap();
        assert_eq!(reopened.export().unwrap(), exported);
    }
}
