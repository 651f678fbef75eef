//! Error types for engine calls.

use thiserror::Error;

use crate::status::StatusCode;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine call {op} failed: {code}")]
    Status { code: StatusCode, op: &'static str },

    #[error("Unknown {what} '{id}'")]
    UnknownId { what: &'static str, id: String },

    #[error("Network description error: {0}")]
    Project(#[from] wd_project::ProjectError),
}

impl EngineError {
    /// The engine status code behind the error, if any.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            EngineError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
