//! Hydraulic engine boundary.
//!
//! Provides:
//! - `HydraulicEngine`: the raw engine interface (1-based indices, native units,
//!   numeric status codes)
//! - `StatusCode`: ok / warning / fatal classification of engine codes
//! - `SolverAdapter`: the single owning wrapper every model call goes through;
//!   normalizes units to metres and litres per second and turns codes into errors
//! - `MemoryEngine`: deterministic in-process engine opened from a network description

pub mod adapter;
pub mod engine;
pub mod error;
pub mod memory;
pub mod status;

pub use adapter::SolverAdapter;
pub use engine::{
    CountKind, DeleteAction, HydraulicEngine, LinkProperty, NodeProperty, RawResult,
    TimeParameter,
};
pub use error::{EngineError, EngineResult};
pub use memory::MemoryEngine;
pub use status::StatusCode;
