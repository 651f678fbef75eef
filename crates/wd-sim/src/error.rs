//! Error types for the live model.

use thiserror::Error;
use wd_engine::EngineError;
use wd_graph::GraphError;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Model error: {0}")]
    Graph(#[from] GraphError),

    #[error("Result series error: {0}")]
    Series(#[from] wd_core::WdError),

    #[error("Stale index for '{id}' in {op}: structure changed since the last cache_indices()")]
    StaleIndex { id: String, op: &'static str },

    #[error("Unknown subnetwork '{name}'")]
    UnknownSubnetwork { name: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Property {property} cannot be written on '{id}'")]
    PropertyMismatch { id: String, property: String },
}

impl SimError {
    pub(crate) fn property_mismatch(id: &str, property: impl std::fmt::Debug) -> Self {
        SimError::PropertyMismatch {
            id: id.to_string(),
            property: format!("{property:?}"),
        }
    }

    /// True when the engine itself refused to produce results.
    pub fn is_simulation_failure(&self) -> bool {
        matches!(self, SimError::Engine(EngineError::Status { code, .. }) if code.is_fatal())
    }
}

pub type SimResult<T> = Result<T, SimError>;
