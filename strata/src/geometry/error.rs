use crate::errors::{ErrorKind, StrataError};
use thiserror::Error;

/// Errors raised by geometric operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Dimension mismatch: expected {expected} but got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid bounds on axis {axis}: low {low} does not precede high {high}")]
    InvalidBounds { axis: usize, low: f64, high: f64 },
}

pub type GeometryResult<T> = Result<T, GeometryError>;

impl From<GeometryError> for StrataError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::DimensionMismatch { .. } => {
                StrataError::new(&err.to_string(), ErrorKind::DimensionMismatch)
            }
            GeometryError::InvalidBounds { .. } => {
                StrataError::new(&err.to_string(), ErrorKind::InvalidConfiguration)
            }
        }
    }
}
