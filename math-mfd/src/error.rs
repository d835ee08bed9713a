//! Error types for the MFD engine

use crate::operator::OperatorState;
use thiserror::Error;

/// Errors raised while building or applying the MFD operator
#[derive(Debug, Error)]
pub enum MfdError {
    /// An operation was called before its prerequisite state was reached
    #[error("{operation} called in state {found:?} (requires {expected:?})")]
    InvalidSequence {
        operation: &'static str,
        expected: OperatorState,
        found: OperatorState,
    },

    /// A cell volume, face area or cell-to-face distance is not positive
    #[error("degenerate geometry: {entity} {index} has measure {measure:e}")]
    DegenerateGeometry {
        entity: &'static str,
        index: usize,
        measure: f64,
    },

    /// The assembled cell diagonal cannot be inverted
    #[error("singular cell block: acc[{cell}] = {value:e}")]
    SingularCellBlock { cell: usize, value: f64 },

    /// A scaled-constraint coefficient is zero, negative or not finite
    #[error("invalid constraint scaling on face {face}: kr = {value:e}")]
    InvalidScaling { face: usize, value: f64 },

    /// Unknown method name or mismatched configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Vector or field sizes disagree with the mesh
    #[error("{what}: expected length {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A field is missing a named component
    #[error("field has no component '{0}'")]
    MissingComponent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    MatrixMarket(#[from] solvers::MatrixMarketError),
}

/// Result type for MFD operations
pub type Result<T> = std::result::Result<T, MfdError>;

impl MfdError {
    /// Whether the error leaves the operator unusable for the current assembly cycle
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MfdError::Io(_) | MfdError::MatrixMarket(_))
    }

    /// Whether the error stems from configuration rather than data
    pub fn is_config_error(&self) -> bool {
        matches!(self, MfdError::Config(_))
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        MfdError::Config(message.into())
    }
}

impl From<serde_json::Error> for MfdError {
    fn from(err: serde_json::Error) -> Self {
        MfdError::Config(err.to_string())
    }
}
