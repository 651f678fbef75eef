//! Unit-normalizing wrapper around a [`HydraulicEngine`].
//!
//! Every value read through the adapter is in metres, litres per second,
//! kilowatts and metres of head, whatever the engine's flow units. Writes
//! go the other way.

use std::path::Path;

use wd_core::units::{from_internal, to_internal};
use wd_core::{FlowUnits, LinkType, NodeType};
use wd_project::NetworkDef;

use crate::engine::{
    CountKind, DeleteAction, HydraulicEngine, LinkProperty, NodeProperty, RawResult,
    TimeParameter,
};
use crate::error::{EngineError, EngineResult};
use crate::status::StatusCode;

#[derive(Debug)]
pub struct SolverAdapter<E> {
    engine: E,
    units: FlowUnits,
}

fn raw<T>(result: RawResult<T>, op: &'static str) -> EngineResult<T> {
    result.map_err(|code| EngineError::Status { code, op })
}

fn lookup<T>(result: RawResult<T>, what: &'static str, id: &str) -> EngineResult<T> {
    result.map_err(|_| EngineError::UnknownId {
        what,
        id: id.to_string(),
    })
}

impl<E: HydraulicEngine> SolverAdapter<E> {
    pub fn new(engine: E) -> Self {
        let units = engine.flow_units();
        Self { engine, units }
    }

    pub fn open(def: &NetworkDef) -> EngineResult<Self> {
        Ok(Self::new(E::open(def)?))
    }

    pub fn open_path(path: &Path) -> EngineResult<Self> {
        let def = wd_project::load(path)?;
        tracing::debug!(path = %path.display(), nodes = def.nodes.len(), links = def.links.len(), "opening network");
        Self::open(&def)
    }

    pub fn export(&self) -> EngineResult<NetworkDef> {
        raw(self.engine.export(), "export")
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let def = self.export()?;
        wd_project::save(path, &def)?;
        Ok(())
    }

    pub fn units(&self) -> FlowUnits {
        self.units
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn count(&self, what: CountKind) -> usize {
        self.engine.count(what)
    }

    pub fn node_index(&self, id: &str) -> EngineResult<usize> {
        lookup(self.engine.node_index(id), "node", id)
    }

    pub fn node_id(&self, index: usize) -> EngineResult<String> {
        raw(self.engine.node_id(index), "node_id")
    }

    pub fn node_type(&self, index: usize) -> EngineResult<NodeType> {
        raw(self.engine.node_type(index), "node_type")
    }

    pub fn link_index(&self, id: &str) -> EngineResult<usize> {
        lookup(self.engine.link_index(id), "link", id)
    }

    pub fn link_id(&self, index: usize) -> EngineResult<String> {
        raw(self.engine.link_id(index), "link_id")
    }

    pub fn link_type(&self, index: usize) -> EngineResult<LinkType> {
        raw(self.engine.link_type(index), "link_type")
    }

    pub fn link_nodes(&self, index: usize) -> EngineResult<(usize, usize)> {
        raw(self.engine.link_nodes(index), "link_nodes")
    }

    pub fn pattern_index(&self, id: &str) -> EngineResult<usize> {
        lookup(self.engine.pattern_index(id), "pattern", id)
    }

    pub fn pattern_id(&self, index: usize) -> EngineResult<String> {
        raw(self.engine.pattern_id(index), "pattern_id")
    }

    pub fn pattern(&self, index: usize) -> EngineResult<Vec<f64>> {
        raw(self.engine.pattern(index), "pattern")
    }

    pub fn set_pattern(&mut self, index: usize, multipliers: &[f64]) -> EngineResult<()> {
        raw(self.engine.set_pattern(index, multipliers), "set_pattern")
    }

    pub fn add_pattern(&mut self, id: &str) -> EngineResult<usize> {
        raw(self.engine.add_pattern(id), "add_pattern")
    }

    pub fn curve_index(&self, id: &str) -> EngineResult<usize> {
        lookup(self.engine.curve_index(id), "curve", id)
    }

    pub fn curve_id(&self, index: usize) -> EngineResult<String> {
        raw(self.engine.curve_id(index), "curve_id")
    }

    pub fn curve(&self, index: usize) -> EngineResult<Vec<(f64, f64)>> {
        raw(self.engine.curve(index), "curve")
    }

    pub fn node_value(&self, index: usize, property: NodeProperty) -> EngineResult<f64> {
        let v = raw(self.engine.node_value(index, property), "node_value")?;
        Ok(to_internal(v, property.quantity(), self.units))
    }

    pub fn set_node_value(
        &mut self,
        index: usize,
        property: NodeProperty,
        value: f64,
    ) -> EngineResult<()> {
        let v = from_internal(value, property.quantity(), self.units);
        raw(self.engine.set_node_value(index, property, v), "set_node_value")
    }

    pub fn link_value(&self, index: usize, property: LinkProperty) -> EngineResult<f64> {
        let v = raw(self.engine.link_value(index, property), "link_value")?;
        Ok(to_internal(v, property.quantity(), self.units))
    }

    pub fn set_link_value(
        &mut self,
        index: usize,
        property: LinkProperty,
        value: f64,
    ) -> EngineResult<()> {
        let v = from_internal(value, property.quantity(), self.units);
        raw(self.engine.set_link_value(index, property, v), "set_link_value")
    }

    pub fn add_node(&mut self, id: &str, ty: NodeType) -> EngineResult<usize> {
        raw(self.engine.add_node(id, ty), "add_node")
    }

    pub fn add_link(&mut self, id: &str, ty: LinkType, from: &str, to: &str) -> EngineResult<usize> {
        raw(self.engine.add_link(id, ty, from, to), "add_link")
    }

    pub fn delete_node(&mut self, index: usize, action: DeleteAction) -> EngineResult<()> {
        raw(self.engine.delete_node(index, action), "delete_node")
    }

    pub fn delete_link(&mut self, index: usize, action: DeleteAction) -> EngineResult<()> {
        raw(self.engine.delete_link(index, action), "delete_link")
    }

    pub fn time_parameter(&self, which: TimeParameter) -> u64 {
        self.engine.time_parameter(which)
    }

    pub fn set_time_parameter(&mut self, which: TimeParameter, value: u64) -> EngineResult<()> {
        raw(self.engine.set_time_parameter(which, value), "set_time_parameter")
    }

    pub fn open_hydraulics(&mut self) -> StatusCode {
        self.engine.open_hydraulics()
    }

    pub fn init_hydraulics(&mut self) -> StatusCode {
        self.engine.init_hydraulics()
    }

    pub fn run_hydraulics_step(&mut self) -> (StatusCode, u64) {
        self.engine.run_hydraulics_step()
    }

    pub fn next_hydraulics_step(&mut self) -> (StatusCode, u64) {
        self.engine.next_hydraulics_step()
    }

    pub fn close_hydraulics(&mut self) -> StatusCode {
        self.engine.close_hydraulics()
    }
}
