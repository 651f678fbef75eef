//! wd-core: stable foundation for the water-network workspace.
//!
//! Contains:
//! - ids (generation-checked keys for registry slots)
//! - kinds (closed element kinds shared by every layer)
//! - units (uom conversions between engine units and the internal m / L/s set)
//! - numeric (Real + finiteness checks + decision-vector decoding helpers)
//! - series (append-only per-element result series)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod kinds;
pub mod numeric;
pub mod series;
pub mod units;

pub use error::{WdError, WdResult};
pub use ids::Key;
pub use kinds::{LinkStatus, LinkType, NodeType};
pub use numeric::*;
pub use series::TimeSeries;
pub use units::{FlowUnits, Quantity, UnitSystem};
