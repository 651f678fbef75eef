//! wd-opt: decision vectors over a live water distribution system.
//!
//! Provides:
//! - Decision-vector segments (existing-pipe rehabilitation, new-pipe sizing,
//!   pump schedules, three temporary-tank layouts) with reversible apply/undo
//! - `Formulation`: an ordered segment pipeline with `apply_dv`/`reset_dv`
//! - `DvAdapter` between formulation and optimizer slot layouts
//! - Priced option tables, cost and the base and hierarchical reliability
//!   objectives
//! - `Problem`: fitness, bounds and integer count for an external optimizer

pub mod dv_adapter;
pub mod error;
pub mod formulation;
pub mod objectives;
pub mod options;
pub mod problem;
pub mod segment;
pub mod segments;
pub mod settings;

pub use dv_adapter::DvAdapter;
pub use error::{OptError, OptResult};
pub use formulation::{ExistingPipesLayout, Formulation, FormulationSwitches, TanksLayout};
pub use objectives::{ObjectiveSettings, ReliabilityFormulation};
pub use options::OptionTables;
pub use problem::{N_OBJECTIVES, Problem};
pub use segment::{Segment, TransactionContext, TransactionState};
pub use settings::ProblemSettings;
