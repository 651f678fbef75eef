//! Network description schema.

use serde::{Deserialize, Serialize};
use wd_core::{FlowUnits, LinkStatus};

pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkDef {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub options: OptionsDef,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub links: Vec<LinkDef>,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
    #[serde(default)]
    pub curves: Vec<CurveDef>,
}

impl NetworkDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: LATEST_VERSION,
            name: name.into(),
            options: OptionsDef::default(),
            nodes: Vec::new(),
            links: Vec::new(),
            patterns: Vec::new(),
            curves: Vec::new(),
        }
    }
}

/// Units and timing of the description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptionsDef {
    pub flow_units: FlowUnits,
    pub duration_s: u64,
    pub hydraulic_step_s: u64,
    pub pattern_step_s: u64,
    pub report_step_s: u64,
}

impl Default for OptionsDef {
    fn default() -> Self {
        Self {
            flow_units: FlowUnits::Lps,
            duration_s: 24 * 3600,
            hydraulic_step_s: 3600,
            pattern_step_s: 3600,
            report_step_s: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub id: String,
    /// For reservoirs this is the total head.
    pub elevation: f64,
    pub kind: NodeKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeKindDef {
    Junction {
        #[serde(default)]
        base_demand: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Reservoir {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Tank {
        initial_level: f64,
        min_level: f64,
        max_level: f64,
        diameter: f64,
        #[serde(default)]
        min_volume: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkDef {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub status: LinkStatus,
    pub kind: LinkKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LinkKindDef {
    Pipe {
        length: f64,
        diameter: f64,
        roughness: f64,
    },
    Pump {
        power: f64,
        design_flow: f64,
        design_head: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternDef {
    pub id: String,
    pub multipliers: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurveDef {
    pub id: String,
    pub points: Vec<(f64, f64)>,
}
