//! Error types for decision-vector evaluation.

use thiserror::Error;
use wd_graph::GraphError;
use wd_sim::SimError;

#[derive(Error, Debug)]
pub enum OptError {
    #[error("Decision vector size mismatch: expected {expected}, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("Out of range {what}: {value} (valid codes 0..{len})")]
    IndexOutOfRange {
        what: &'static str,
        value: f64,
        len: usize,
    },

    #[error("Numeric error: {0}")]
    Numeric(#[from] wd_core::WdError),

    #[error("No captured value for '{id}': apply_dv/reset_dv pairing is broken")]
    MissingCapture { id: String },

    #[error("No result for '{id}' at t = {t} s")]
    MissingResult { id: String, t: u64 },

    #[error("No price for {what} of '{id}'")]
    Unpriced { id: String, what: &'static str },

    #[error("Invalid settings: {what}")]
    Settings { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),
}

impl From<GraphError> for OptError {
    fn from(e: GraphError) -> Self {
        OptError::Sim(SimError::Graph(e))
    }
}

impl OptError {
    /// True when the engine failed to simulate the candidate; everything else
    /// is a shape or synchronization fault.
    pub fn is_simulation_failure(&self) -> bool {
        matches!(self, OptError::Sim(e) if e.is_simulation_failure())
    }

    pub(crate) fn settings(what: impl Into<String>) -> Self {
        OptError::Settings { what: what.into() }
    }
}

pub type OptResult<T> = Result<T, OptError>;

#[cfg(test)]
mod tests {
    use super::*;
    use wd_engine::{EngineError, StatusCode};

    #[test]
    fn graph_errors_travel_through_sim() {
        let err: OptError = GraphError::DuplicateKey { id: "D1".into() }.into();
        assert!(matches!(err, OptError::Sim(SimError::Graph(_))));
        assert!(err.to_string().contains("D1"));
    }

    #[test]
    fn only_fatal_engine_codes_are_simulation_failures() {
        let fatal: OptError = SimError::Engine(EngineError::Status {
            code: StatusCode::UNSOLVABLE,
            op: "open_hydraulics",
        })
        .into();
        assert!(fatal.is_simulation_failure());

        let shape = OptError::SizeMismatch {
            expected: 4,
            got: 3,
        };
        assert!(!shape.is_simulation_failure());
    }
}
