//! Closed element kinds shared by the model, the project format and the engine.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeType {
    Junction,
    Reservoir,
    Tank,
}

impl NodeType {
    /// Reservoirs and tanks fix the head they sit at.
    pub fn is_source(self) -> bool {
        matches!(self, NodeType::Reservoir | NodeType::Tank)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkType {
    Pipe,
    Pump,
}

/// Initial status of a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkStatus {
    #[default]
    Open,
    Closed,
}

impl LinkStatus {
    /// Engine encoding: 1 open, 0 closed.
    pub fn as_value(self) -> f64 {
        match self {
            LinkStatus::Open => 1.0,
            LinkStatus::Closed => 0.0,
        }
    }

    pub fn from_value(v: f64) -> Self {
        if v > 0.5 {
            LinkStatus::Open
        } else {
            LinkStatus::Closed
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Junction => "junction",
            NodeType::Reservoir => "reservoir",
            NodeType::Tank => "tank",
        };
        f.write_str(s)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkType::Pipe => "pipe",
            LinkType::Pump => "pump",
        };
        f.write_str(s)
    }
}
