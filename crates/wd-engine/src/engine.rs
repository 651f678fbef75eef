//! Raw hydraulic engine interface.
//!
//! Indices are 1-based and values are in the engine's native units. Nothing
//! outside this crate calls an engine directly; see [`crate::SolverAdapter`].

use wd_core::{FlowUnits, LinkType, NodeType, Quantity};
use wd_project::NetworkDef;

use crate::error::EngineResult;
use crate::status::StatusCode;

pub type RawResult<T> = Result<T, StatusCode>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountKind {
    Nodes,
    /// Tanks and reservoirs together.
    Tanks,
    Links,
    Patterns,
    Curves,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeProperty {
    Elevation,
    BaseDemand,
    /// 1-based pattern index, 0 for none.
    Pattern,
    InitLevel,
    MinLevel,
    MaxLevel,
    TankDiameter,
    MinVolume,
    Head,
    Pressure,
    Demand,
    Level,
}

impl NodeProperty {
    pub fn quantity(self) -> Quantity {
        match self {
            NodeProperty::Elevation
            | NodeProperty::InitLevel
            | NodeProperty::MinLevel
            | NodeProperty::MaxLevel
            | NodeProperty::Head
            | NodeProperty::Level => Quantity::Length,
            NodeProperty::BaseDemand | NodeProperty::Demand => Quantity::Flow,
            NodeProperty::TankDiameter => Quantity::TankDiameter,
            NodeProperty::MinVolume => Quantity::Volume,
            NodeProperty::Pressure => Quantity::Pressure,
            NodeProperty::Pattern => Quantity::Unitless,
        }
    }

    /// Computed by a hydraulic step, never written.
    pub fn is_result(self) -> bool {
        matches!(
            self,
            NodeProperty::Head | NodeProperty::Pressure | NodeProperty::Demand | NodeProperty::Level
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkProperty {
    Diameter,
    Length,
    Roughness,
    /// 1 open, 0 closed.
    InitStatus,
    PumpPower,
    DesignFlow,
    DesignHead,
    /// 1-based speed pattern index, 0 for none.
    PumpPattern,
    Flow,
    Velocity,
    /// Pump power draw in kW.
    Energy,
    Status,
}

impl LinkProperty {
    pub fn quantity(self) -> Quantity {
        match self {
            LinkProperty::Diameter => Quantity::Diameter,
            LinkProperty::Length | LinkProperty::DesignHead => Quantity::Length,
            LinkProperty::DesignFlow | LinkProperty::Flow => Quantity::Flow,
            LinkProperty::PumpPower => Quantity::Power,
            LinkProperty::Velocity => Quantity::Velocity,
            LinkProperty::Roughness
            | LinkProperty::InitStatus
            | LinkProperty::PumpPattern
            | LinkProperty::Energy
            | LinkProperty::Status => Quantity::Unitless,
        }
    }

    pub fn is_result(self) -> bool {
        matches!(
            self,
            LinkProperty::Flow | LinkProperty::Velocity | LinkProperty::Energy | LinkProperty::Status
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeParameter {
    Duration,
    HydraulicStep,
    PatternStep,
    ReportStep,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteAction {
    /// Also delete anything that references the element.
    #[default]
    Unconditional,
    /// Refuse when something still references the element.
    Conditional,
}

pub trait HydraulicEngine: Sized {
    fn open(def: &NetworkDef) -> EngineResult<Self>;
    fn export(&self) -> RawResult<NetworkDef>;
    fn flow_units(&self) -> FlowUnits;
    fn count(&self, what: CountKind) -> usize;

    fn node_index(&self, id: &str) -> RawResult<usize>;
    fn node_id(&self, index: usize) -> RawResult<String>;
    fn node_type(&self, index: usize) -> RawResult<NodeType>;
    fn link_index(&self, id: &str) -> RawResult<usize>;
    fn link_id(&self, index: usize) -> RawResult<String>;
    fn link_type(&self, index: usize) -> RawResult<LinkType>;
    fn link_nodes(&self, index: usize) -> RawResult<(usize, usize)>;

    fn pattern_index(&self, id: &str) -> RawResult<usize>;
    fn pattern_id(&self, index: usize) -> RawResult<String>;
    fn pattern(&self, index: usize) -> RawResult<Vec<f64>>;
    fn set_pattern(&mut self, index: usize, multipliers: &[f64]) -> RawResult<()>;
    fn add_pattern(&mut self, id: &str) -> RawResult<usize>;
    fn curve_index(&self, id: &str) -> RawResult<usize>;
    fn curve_id(&self, index: usize) -> RawResult<String>;
    fn curve(&self, index: usize) -> RawResult<Vec<(f64, f64)>>;

    fn node_value(&self, index: usize, property: NodeProperty) -> RawResult<f64>;
    fn set_node_value(&mut self, index: usize, property: NodeProperty, value: f64)
    -> RawResult<()>;
    fn link_value(&self, index: usize, property: LinkProperty) -> RawResult<f64>;
    fn set_link_value(&mut self, index: usize, property: LinkProperty, value: f64)
    -> RawResult<()>;

    fn add_node(&mut self, id: &str, ty: NodeType) -> RawResult<usize>;
    fn add_link(&mut self, id: &str, ty: LinkType, from: &str, to: &str) -> RawResult<usize>;
    fn delete_node(&mut self, index: usize, action: DeleteAction) -> RawResult<()>;
    fn delete_link(&mut self, index: usize, action: DeleteAction) -> RawResult<()>;

    fn time_parameter(&self, which: TimeParameter) -> u64;
    fn set_time_parameter(&mut self, which: TimeParameter, value: u64) -> RawResult<()>;

    fn open_hydraulics(&mut self) -> StatusCode;
    fn init_hydraulics(&mut self) -> StatusCode;
    /// Solve the current period; returns the status and the period's time.
    fn run_hydraulics_step(&mut self) -> (StatusCode, u64);
    /// Advance; a zero step means the horizon has been reached.
    fn next_hydraulics_step(&mut self) -> (StatusCode, u64);
    fn close_hydraulics(&mut self) -> StatusCode;
}
