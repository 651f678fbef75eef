//! wd-graph: in-process network model.
//!
//! Provides:
//! - Owning, ID-keyed registries with generation-checked slots
//! - Named ID sequences ("subnetworks") and filtered/ordered registry views
//! - Node/link elements as closed tagged variants, plus patterns and curves
//! - `Network`, which keeps supertype/kind registries and back-references in sync
//!
//! # Example
//!
//! ```
//! use wd_graph::{Network, Node, NodeKind, Junction, Reservoir, LinkKind, Pipe};
//! use wd_core::LinkStatus;
//!
//! let mut net = Network::new();
//! net.insert_node("R1", Node::new(100.0, NodeKind::Reservoir(Reservoir::default()))).unwrap();
//! net.insert_node("J1", Node::new(90.0, NodeKind::Junction(Junction::default()))).unwrap();
//! let pipe = Pipe { length: 100.0, diameter: 0.3, roughness: 120.0 };
//! net.insert_link("P1", "R1", "J1", LinkStatus::Open, LinkKind::Pipe(pipe)).unwrap();
//!
//! assert_eq!(net.links().len(), 1);
//! assert_eq!(net.pipes().len(), 1);
//! assert_eq!(net.node("J1").unwrap().links.len(), 1);
//! ```

pub mod element;
pub mod error;
pub mod network;
pub mod registry;
pub mod sequence;
pub mod view;
pub(crate) mod validate;

pub use element::{
    Curve, CurveKey, Junction, Link, LinkKey, LinkKind, LinkResults, Node, NodeKey, NodeKind,
    NodeResults, Pattern, PatternKey, Pipe, Pump, Reservoir, Tank,
};
pub use error::{GraphError, GraphResult};
pub use network::Network;
pub use registry::Registry;
pub use sequence::IdSequence;
pub use view::{RegistryView, RegistryViewMut, ViewMode};
