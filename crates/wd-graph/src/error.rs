//! Model-invariant error types.

pub type GraphResult<T> = Result<T, GraphError>;

/// Registry and network invariant violations.
///
/// Every variant names the offending ID so a broken apply/reset pairing can be
/// traced back to the element that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Insert of an ID already present in the registry.
    DuplicateKey { id: String },

    /// Lookup of an ID the registry does not hold.
    NotFound { id: String, what: &'static str },

    /// An ordered sequence names an ID missing from the registry it drives.
    Desynchronized { id: String, sequence: String },

    /// A link endpoint (or other reference) points at a missing element.
    InvalidReference { id: String, what: &'static str },

    /// The element exists but is of another kind.
    KindMismatch { id: String, expected: &'static str },

    /// Supertype/kind registries or back-references disagree.
    Inconsistent { id: String, what: &'static str },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::DuplicateKey { id } => write!(f, "Duplicate key '{}'", id),
            GraphError::NotFound { id, what } => write!(f, "{} '{}' not found", what, id),
            GraphError::Desynchronized { id, sequence } => {
                write!(
                    f,
                    "Sequence '{}' references '{}' which is not in the registry",
                    sequence, id
                )
            }
            GraphError::InvalidReference { id, what } => {
                write!(f, "Invalid reference to '{}' ({})", id, what)
            }
            GraphError::KindMismatch { id, expected } => {
                write!(f, "Element '{}' is not a {}", id, expected)
            }
            GraphError::Inconsistent { id, what } => {
                write!(f, "Inconsistent model around '{}': {}", id, what)
            }
        }
    }
}

impl std::error::Error for GraphError {}
