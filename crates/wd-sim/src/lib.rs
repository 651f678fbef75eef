//! Live water distribution system.
//!
//! Provides:
//! - `WaterDistributionSystem`: owns the in-process network, its named ID
//!   sequences and the engine adapter, and keeps the two representations in step
//! - Structural mutators (insert, install, uninstall, remove, duplicate) that go
//!   through the engine first and mirror into the registries
//! - Index cache tied to a structural epoch
//! - Stepped hydraulic runs collecting per-step results into the element series

pub mod error;
pub mod run;
pub mod settings;
pub mod wds;

mod cache;

pub use error::{SimError, SimResult};
pub use run::HydraulicRun;
pub use settings::HydraulicSettings;
pub use wds::{TEMP_ELEMENTS, WaterDistributionSystem};
