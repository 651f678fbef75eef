use thiserror::Error;

pub type WdResult<T> = Result<T, WdError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WdError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Time {t} s is not after the last committed time {last} s")]
    NonMonotonicTime { last: u64, t: u64 },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
