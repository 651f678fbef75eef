//! The water distribution system: network model plus engine, kept in step.

use std::collections::BTreeMap;
use std::path::Path;

use wd_core::{FlowUnits, LinkStatus, LinkType, NodeType};
use wd_engine::{
    CountKind, DeleteAction, HydraulicEngine, LinkProperty, MemoryEngine, NodeProperty,
    SolverAdapter,
};
use wd_graph::{
    Curve, GraphError, IdSequence, Junction, LinkKey, LinkKind, Network, Node, NodeKey, NodeKind,
    Pattern, Pipe, Pump, RegistryView, Reservoir, Tank,
};
use wd_project::NetworkDef;

use crate::cache::IndexCache;
use crate::error::{SimError, SimResult};

/// Name of the sequence holding elements added by a transaction.
pub const TEMP_ELEMENTS: &str = "__temp_elems";

/// Network model and its engine.
///
/// Every structural edit goes to the engine first and is mirrored into the
/// registries only once the engine accepted it. Engine indices are cached per
/// structural epoch; index-keyed calls refresh the cache themselves.
///
/// Not `Clone`: each worker loads its own instance from the persisted description.
#[derive(Debug)]
pub struct WaterDistributionSystem<E: HydraulicEngine = MemoryEngine> {
    pub(crate) adapter: SolverAdapter<E>,
    pub(crate) network: Network,
    sequences: BTreeMap<String, IdSequence>,
    pub(crate) times: Vec<u64>,
    epoch: u64,
    pub(crate) cache: IndexCache,
}

fn pattern_name<E: HydraulicEngine>(
    adapter: &SolverAdapter<E>,
    code: f64,
) -> SimResult<Option<String>> {
    let index = code.round();
    if index < 1.0 {
        return Ok(None);
    }
    Ok(Some(adapter.pattern_id(index as usize)?))
}

fn pattern_code<E: HydraulicEngine>(
    adapter: &SolverAdapter<E>,
    name: Option<&str>,
) -> SimResult<f64> {
    match name {
        Some(name) => Ok(adapter.pattern_index(name)? as f64),
        None => Ok(0.0),
    }
}

/// Writable node properties that have a registry counterpart for `kind`.
fn mirrors_node(property: NodeProperty, kind: &NodeKind) -> bool {
    matches!(
        (property, kind),
        (NodeProperty::Elevation, _)
            | (NodeProperty::BaseDemand, NodeKind::Junction(_))
            | (NodeProperty::Pattern, NodeKind::Junction(_) | NodeKind::Reservoir(_))
            | (
                NodeProperty::InitLevel
                    | NodeProperty::MinLevel
                    | NodeProperty::MaxLevel
                    | NodeProperty::TankDiameter
                    | NodeProperty::MinVolume,
                NodeKind::Tank(_)
            )
    )
}

fn mirrors_link(property: LinkProperty, kind: &LinkKind) -> bool {
    matches!(
        (property, kind),
        (LinkProperty::InitStatus, _)
            | (
                LinkProperty::Length | LinkProperty::Diameter | LinkProperty::Roughness,
                LinkKind::Pipe(_)
            )
            | (
                LinkProperty::PumpPower
                    | LinkProperty::DesignFlow
                    | LinkProperty::DesignHead
                    | LinkProperty::PumpPattern,
                LinkKind::Pump(_)
            )
    )
}

fn read_network<E: HydraulicEngine>(adapter: &SolverAdapter<E>) -> SimResult<Network> {
    let mut network = Network::new();

    for i in 1..=adapter.count(CountKind::Patterns) {
        let multipliers = adapter.pattern(i)?;
        network
            .patterns_mut()
            .insert(adapter.pattern_id(i)?, Pattern { multipliers })?;
    }
    for i in 1..=adapter.count(CountKind::Curves) {
        let points = adapter.curve(i)?;
        network
            .curves_mut()
            .insert(adapter.curve_id(i)?, Curve { points })?;
    }

    for i in 1..=adapter.count(CountKind::Nodes) {
        let value = |p| adapter.node_value(i, p);
        let kind = match adapter.node_type(i)? {
            NodeType::Junction => NodeKind::Junction(Junction {
                base_demand: value(NodeProperty::BaseDemand)?,
                demand_pattern: pattern_name(adapter, value(NodeProperty::Pattern)?)?,
            }),
            NodeType::Reservoir => NodeKind::Reservoir(Reservoir {
                head_pattern: pattern_name(adapter, value(NodeProperty::Pattern)?)?,
            }),
            NodeType::Tank => NodeKind::Tank(Tank {
                initial_level: value(NodeProperty::InitLevel)?,
                min_level: value(NodeProperty::MinLevel)?,
                max_level: value(NodeProperty::MaxLevel)?,
                diameter: value(NodeProperty::TankDiameter)?,
                min_volume: value(NodeProperty::MinVolume)?,
            }),
        };
        let elevation = value(NodeProperty::Elevation)?;
        network.insert_node(adapter.node_id(i)?, Node::new(elevation, kind))?;
    }

    for i in 1..=adapter.count(CountKind::Links) {
        let value = |p| adapter.link_value(i, p);
        let (a, b) = adapter.link_nodes(i)?;
        let from = adapter.node_id(a)?;
        let to = adapter.node_id(b)?;
        let kind = match adapter.link_type(i)? {
            LinkType::Pipe => LinkKind::Pipe(Pipe {
                length: value(LinkProperty::Length)?,
                diameter: value(LinkProperty::Diameter)?,
                roughness: value(LinkProperty::Roughness)?,
            }),
            LinkType::Pump => LinkKind::Pump(Pump {
                power: value(LinkProperty::PumpPower)?,
                design_flow: value(LinkProperty::DesignFlow)?,
                design_head: value(LinkProperty::DesignHead)?,
                speed_pattern: pattern_name(adapter, value(LinkProperty::PumpPattern)?)?,
            }),
        };
        let status = LinkStatus::from_value(value(LinkProperty::InitStatus)?);
        network.insert_link(adapter.link_id(i)?, &from, &to, status, kind)?;
    }

    Ok(network)
}

impl<E: HydraulicEngine> WaterDistributionSystem<E> {
    /// Open the engine from a persisted description (YAML or JSON) and mirror it.
    pub fn load(path: &Path) -> SimResult<Self> {
        Self::from_adapter(SolverAdapter::open_path(path)?)
    }

    pub fn from_def(def: &NetworkDef) -> SimResult<Self> {
        Self::from_adapter(SolverAdapter::open(def)?)
    }

    pub fn from_adapter(adapter: SolverAdapter<E>) -> SimResult<Self> {
        let network = read_network(&adapter)?;
        let mut sequences = BTreeMap::new();
        sequences.insert(TEMP_ELEMENTS.to_string(), IdSequence::new());
        let mut wds = Self {
            adapter,
            network,
            sequences,
            times: Vec::new(),
            epoch: 0,
            cache: IndexCache::default(),
        };
        wds.cache_indices()?;
        tracing::info!(
            nodes = wds.network.nodes().len(),
            links = wds.network.links().len(),
            patterns = wds.network.patterns().len(),
            "water distribution system loaded"
        );
        Ok(wds)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn adapter(&self) -> &SolverAdapter<E> {
        &self.adapter
    }

    pub fn units(&self) -> FlowUnits {
        self.adapter.units()
    }

    /// Times (seconds) of the recorded steps of the last run.
    pub fn times(&self) -> &[u64] {
        &self.times
    }

    /// Structural epoch; bumped by every successful structural edit.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn touch_structure(&mut self) {
        self.epoch += 1;
    }

    // ---- index cache -------------------------------------------------------

    pub fn cache_indices(&mut self) -> SimResult<()> {
        self.cache
            .rebuild(&self.adapter, &self.network, self.epoch)?;
        tracing::trace!(epoch = self.epoch, "engine indices cached");
        Ok(())
    }

    pub fn is_cache_fresh(&self) -> bool {
        self.cache.is_fresh(self.epoch)
    }

    /// Cached engine index of a node; fails if the structure changed since caching.
    pub fn cached_node_index(&self, id: &str) -> SimResult<usize> {
        if !self.is_cache_fresh() {
            return Err(SimError::StaleIndex {
                id: id.to_string(),
                op: "cached_node_index",
            });
        }
        self.cache.node(id).ok_or_else(|| not_found(id, "node"))
    }

    pub fn cached_link_index(&self, id: &str) -> SimResult<usize> {
        if !self.is_cache_fresh() {
            return Err(SimError::StaleIndex {
                id: id.to_string(),
                op: "cached_link_index",
            });
        }
        self.cache.link(id).ok_or_else(|| not_found(id, "link"))
    }

    pub(crate) fn refresh_indices(&mut self) -> SimResult<()> {
        if !self.is_cache_fresh() {
            self.cache_indices()?;
        }
        Ok(())
    }

    fn fresh_node_index(&mut self, id: &str) -> SimResult<usize> {
        self.refresh_indices()?;
        self.cached_node_index(id)
    }

    fn fresh_link_index(&mut self, id: &str) -> SimResult<usize> {
        self.refresh_indices()?;
        self.cached_link_index(id)
    }

    // ---- properties --------------------------------------------------------

    /// Read a node property or result straight from the engine.
    pub fn node_property(&mut self, id: &str, property: NodeProperty) -> SimResult<f64> {
        let index = self.fresh_node_index(id)?;
        Ok(self.adapter.node_value(index, property)?)
    }

    pub fn set_node_property(
        &mut self,
        id: &str,
        property: NodeProperty,
        value: f64,
    ) -> SimResult<()> {
        if !mirrors_node(property, &self.network.node(id)?.kind) {
            return Err(SimError::property_mismatch(id, property));
        }
        let index = self.fresh_node_index(id)?;
        self.adapter.set_node_value(index, property, value)?;
        let pattern = match property {
            NodeProperty::Pattern => pattern_name(&self.adapter, value)?,
            _ => None,
        };

        let node = self.network.node_mut(id)?;
        match (property, &mut node.kind) {
            (NodeProperty::Elevation, _) => node.elevation = value,
            (NodeProperty::BaseDemand, NodeKind::Junction(j)) => j.base_demand = value,
            (NodeProperty::Pattern, NodeKind::Junction(j)) => j.demand_pattern = pattern,
            (NodeProperty::Pattern, NodeKind::Reservoir(r)) => r.head_pattern = pattern,
            (NodeProperty::InitLevel, NodeKind::Tank(t)) => t.initial_level = value,
            (NodeProperty::MinLevel, NodeKind::Tank(t)) => t.min_level = value,
            (NodeProperty::MaxLevel, NodeKind::Tank(t)) => t.max_level = value,
            (NodeProperty::TankDiameter, NodeKind::Tank(t)) => t.diameter = value,
            (NodeProperty::MinVolume, NodeKind::Tank(t)) => t.min_volume = value,
            _ => return Err(SimError::property_mismatch(id, property)),
        }
        Ok(())
    }

    pub fn link_property(&mut self, id: &str, property: LinkProperty) -> SimResult<f64> {
        let index = self.fresh_link_index(id)?;
        Ok(self.adapter.link_value(index, property)?)
    }

    pub fn set_link_property(
        &mut self,
        id: &str,
        property: LinkProperty,
        value: f64,
    ) -> SimResult<()> {
        if !mirrors_link(property, &self.network.link(id)?.kind) {
            return Err(SimError::property_mismatch(id, property));
        }
        let index = self.fresh_link_index(id)?;
        self.adapter.set_link_value(index, property, value)?;
        let pattern = match property {
            LinkProperty::PumpPattern => pattern_name(&self.adapter, value)?,
            _ => None,
        };

        let link = self.network.link_mut(id)?;
        match (property, &mut link.kind) {
            (LinkProperty::InitStatus, _) => link.initial_status = LinkStatus::from_value(value),
            (LinkProperty::Length, LinkKind::Pipe(p)) => p.length = value,
            (LinkProperty::Diameter, LinkKind::Pipe(p)) => p.diameter = value,
            (LinkProperty::Roughness, LinkKind::Pipe(p)) => p.roughness = value,
            (LinkProperty::PumpPower, LinkKind::Pump(p)) => p.power = value,
            (LinkProperty::DesignFlow, LinkKind::Pump(p)) => p.design_flow = value,
            (LinkProperty::DesignHead, LinkKind::Pump(p)) => p.design_head = value,
            (LinkProperty::PumpPattern, LinkKind::Pump(p)) => p.speed_pattern = pattern,
            _ => return Err(SimError::property_mismatch(id, property)),
        }
        Ok(())
    }

    pub fn pattern(&self, id: &str) -> SimResult<&[f64]> {
        Ok(&self.network.patterns().at(id)?.multipliers)
    }

    pub fn set_pattern(&mut self, id: &str, multipliers: &[f64]) -> SimResult<()> {
        let index = self.adapter.pattern_index(id)?;
        self.adapter.set_pattern(index, multipliers)?;
        self.network.patterns_mut().at_mut(id)?.multipliers = multipliers.to_vec();
        Ok(())
    }

    // ---- structure ---------------------------------------------------------

    /// Add a node to the engine and the registries. Incident links and results
    /// of `node` are ignored.
    pub fn insert_node(&mut self, id: &str, node: Node) -> SimResult<()> {
        if self.network.nodes().contains(id) {
            return Err(GraphError::DuplicateKey { id: id.to_string() }.into());
        }
        let index = self.adapter.add_node(id, node.node_type())?;
        self.touch_structure();
        if let Err(e) = self.push_node(index, &node) {
            self.rollback_node(id);
            return Err(e);
        }
        if let Err(e) = self.network.insert_node(id, Node::new(node.elevation, node.kind)) {
            self.rollback_node(id);
            return Err(e.into());
        }
        tracing::debug!(id, index, "node inserted");
        Ok(())
    }

    fn push_node(&mut self, index: usize, node: &Node) -> SimResult<()> {
        let mut values = vec![(NodeProperty::Elevation, node.elevation)];
        match &node.kind {
            NodeKind::Junction(j) => {
                values.push((NodeProperty::BaseDemand, j.base_demand));
                let code = pattern_code(&self.adapter, j.demand_pattern.as_deref())?;
                values.push((NodeProperty::Pattern, code));
            }
            NodeKind::Reservoir(r) => {
                let code = pattern_code(&self.adapter, r.head_pattern.as_deref())?;
                values.push((NodeProperty::Pattern, code));
            }
            NodeKind::Tank(t) => values.extend([
                (NodeProperty::TankDiameter, t.diameter),
                (NodeProperty::MinLevel, t.min_level),
                (NodeProperty::MaxLevel, t.max_level),
                (NodeProperty::InitLevel, t.initial_level),
                (NodeProperty::MinVolume, t.min_volume),
            ]),
        }
        for (property, value) in values {
            self.adapter.set_node_value(index, property, value)?;
        }
        Ok(())
    }

    fn rollback_node(&mut self, id: &str) {
        if let Ok(index) = self.adapter.node_index(id)
            && let Err(e) = self.adapter.delete_node(index, DeleteAction::Unconditional)
        {
            tracing::error!(id, error = %e, "could not roll back engine node");
        }
    }

    /// Add a link between two existing nodes.
    pub fn install_link(
        &mut self,
        id: &str,
        from: &str,
        to: &str,
        status: LinkStatus,
        kind: LinkKind,
    ) -> SimResult<()> {
        for end in [from, to] {
            if !self.network.nodes().contains(end) {
                return Err(GraphError::InvalidReference {
                    id: end.to_string(),
                    what: "link endpoint",
                }
                .into());
            }
        }
        if self.network.links().contains(id) {
            return Err(GraphError::DuplicateKey { id: id.to_string() }.into());
        }
        let index = self.adapter.add_link(id, kind.link_type(), from, to)?;
        self.touch_structure();
        if let Err(e) = self.push_link(index, status, &kind) {
            self.rollback_link(id);
            return Err(e);
        }
        if let Err(e) = self.network.insert_link(id, from, to, status, kind) {
            self.rollback_link(id);
            return Err(e.into());
        }
        tracing::debug!(id, from, to, index, "link installed");
        Ok(())
    }

    fn push_link(&mut self, index: usize, status: LinkStatus, kind: &LinkKind) -> SimResult<()> {
        let mut values = vec![(LinkProperty::InitStatus, status.as_value())];
        match kind {
            LinkKind::Pipe(p) => values.extend([
                (LinkProperty::Length, p.length),
                (LinkProperty::Diameter, p.diameter),
                (LinkProperty::Roughness, p.roughness),
            ]),
            LinkKind::Pump(p) => {
                let code = pattern_code(&self.adapter, p.speed_pattern.as_deref())?;
                values.extend([
                    (LinkProperty::PumpPower, p.power),
                    (LinkProperty::DesignFlow, p.design_flow),
                    (LinkProperty::DesignHead, p.design_head),
                    (LinkProperty::PumpPattern, code),
                ]);
            }
        }
        for (property, value) in values {
            self.adapter.set_link_value(index, property, value)?;
        }
        Ok(())
    }

    fn rollback_link(&mut self, id: &str) {
        if let Ok(index) = self.adapter.link_index(id)
            && let Err(e) = self.adapter.delete_link(index, DeleteAction::Unconditional)
        {
            tracing::error!(id, error = %e, "could not roll back engine link");
        }
    }

    /// Take out a link, or a node that no link touches; 0 if absent.
    pub fn uninstall(&mut self, id: &str) -> SimResult<usize> {
        self.delete(id, DeleteAction::Conditional)
    }

    /// Take out a link, or a node together with its incident links; 0 if absent.
    pub fn remove(&mut self, id: &str) -> SimResult<usize> {
        self.delete(id, DeleteAction::Unconditional)
    }

    fn delete(&mut self, id: &str, action: DeleteAction) -> SimResult<usize> {
        if self.network.links().contains(id) {
            let index = self.fresh_link_index(id)?;
            self.adapter.delete_link(index, action)?;
            self.touch_structure();
            tracing::debug!(id, "link removed");
            return Ok(self.network.erase_link(id));
        }
        if self.network.nodes().contains(id) {
            let index = self.fresh_node_index(id)?;
            self.adapter.delete_node(index, action)?;
            self.touch_structure();
            let incident = self.network.incident_link_ids(id);
            tracing::debug!(id, links = incident.len(), "node removed");
            return Ok(self.network.erase_node(id));
        }
        Ok(0)
    }

    /// Copy an existing node or link (properties, endpoints, status) under a new ID.
    pub fn duplicate(&mut self, existing: &str, new_id: &str) -> SimResult<()> {
        if let Ok(link) = self.network.link(existing) {
            let status = link.initial_status;
            let kind = link.kind.clone();
            let (from, to) = self.network.endpoints(existing)?;
            let (from, to) = (from.to_string(), to.to_string());
            return self.install_link(new_id, &from, &to, status, kind);
        }
        let node = self.network.node(existing)?;
        let copy = Node::new(node.elevation, node.kind.clone());
        self.insert_node(new_id, copy)
    }

    /// Persist the engine's current description (YAML or JSON by extension).
    pub fn save(&self, path: &Path) -> SimResult<()> {
        self.adapter.save(path)?;
        tracing::info!(path = %path.display(), "network description saved");
        Ok(())
    }

    // ---- ID sequences ------------------------------------------------------

    pub fn id_sequence(&self, name: &str) -> Option<&IdSequence> {
        self.sequences.get(name)
    }

    pub fn id_sequence_mut(&mut self, name: &str) -> Option<&mut IdSequence> {
        self.sequences.get_mut(name)
    }

    /// Store a sequence as-is, returning the one it replaces.
    pub fn insert_id_sequence(
        &mut self,
        name: impl Into<String>,
        sequence: IdSequence,
    ) -> Option<IdSequence> {
        self.sequences.insert(name.into(), sequence)
    }

    /// Store a subnetwork after checking every ID names a live node or link.
    pub fn insert_subnetwork(&mut self, name: &str, sequence: IdSequence) -> SimResult<()> {
        if let Some(id) = sequence
            .iter()
            .find(|id| !self.network.nodes().contains(id) && !self.network.links().contains(id))
        {
            return Err(GraphError::InvalidReference {
                id: id.to_string(),
                what: "subnetwork member",
            }
            .into());
        }
        tracing::debug!(name, len = sequence.len(), "subnetwork loaded");
        self.sequences.insert(name.to_string(), sequence);
        Ok(())
    }

    pub fn sequence_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sequences.keys().map(String::as_str)
    }

    pub fn temp_elements(&self) -> &IdSequence {
        static EMPTY: IdSequence = IdSequence::new();
        self.sequences.get(TEMP_ELEMENTS).unwrap_or(&EMPTY)
    }

    pub fn temp_elements_mut(&mut self) -> &mut IdSequence {
        self.sequences.entry(TEMP_ELEMENTS.to_string()).or_default()
    }

    /// Links of one kind in subnetwork order.
    pub fn subnetwork_links(
        &self,
        name: &str,
        ty: LinkType,
    ) -> SimResult<RegistryView<'_, LinkKey>> {
        let seq = self.subnetwork(name)?;
        Ok(RegistryView::ordered(self.network.link_kind(ty), name, seq)?)
    }

    /// Nodes of one kind in subnetwork order.
    pub fn subnetwork_nodes(
        &self,
        name: &str,
        ty: NodeType,
    ) -> SimResult<RegistryView<'_, NodeKey>> {
        let seq = self.subnetwork(name)?;
        Ok(RegistryView::ordered(self.network.node_kind(ty), name, seq)?)
    }

    fn subnetwork(&self, name: &str) -> SimResult<&IdSequence> {
        self.sequences
            .get(name)
            .ok_or_else(|| SimError::UnknownSubnetwork {
                name: name.to_string(),
            })
    }

    // ---- consistency -------------------------------------------------------

    /// Check the registries against the engine: same IDs, kinds and endpoints.
    pub fn verify_synchronized(&self) -> SimResult<()> {
        self.network.validate()?;
        let adapter = &self.adapter;
        if adapter.count(CountKind::Nodes) != self.network.nodes().len()
            || adapter.count(CountKind::Links) != self.network.links().len()
        {
            return Err(inconsistent("", "engine and registry element counts differ"));
        }
        for i in 1..=adapter.count(CountKind::Nodes) {
            let id = adapter.node_id(i)?;
            let node = self.network.node(&id)?;
            if node.node_type() != adapter.node_type(i)? {
                return Err(inconsistent(&id, "node kind differs from engine"));
            }
        }
        for i in 1..=adapter.count(CountKind::Links) {
            let id = adapter.link_id(i)?;
            let link = self.network.link(&id)?;
            if link.link_type() != adapter.link_type(i)? {
                return Err(inconsistent(&id, "link kind differs from engine"));
            }
            let (a, b) = adapter.link_nodes(i)?;
            let (from, to) = self.network.endpoints(&id)?;
            if adapter.node_id(a)? != from || adapter.node_id(b)? != to {
                return Err(inconsistent(&id, "link endpoints differ from engine"));
            }
        }
        Ok(())
    }
}

fn not_found(id: &str, what: &'static str) -> SimError {
    GraphError::NotFound {
        id: id.to_string(),
        what,
    }
    .into()
}

fn inconsistent(id: &str, what: &'static str) -> SimError {
    GraphError::Inconsistent {
        id: id.to_string(),
        what,
    }
    .into()
}
