//! Error types for geometry and array conversion.
//!
//! Every fallible operation in this crate returns [`GeometryError`]; nothing
//! is retried or repaired beyond the documented padding rules.

use thiserror::Error;

/// Main error type for affine, layout and resampling operations.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// The affine matrix is empty, not square, or otherwise unusable.
    #[error("Malformed affine: {0}")]
    MalformedAffine(String),

    /// A matrix that had to be inverted is singular.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// Orientation could not be derived or matched.
    #[error("Orientation error: {0}")]
    OrientationError(String),

    /// Axis index outside the array rank.
    #[error("Invalid axis {axis} for array of rank {ndim}")]
    InvalidAxis { axis: isize, ndim: usize },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Dimension mismatch.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Tensor data could not be read back from the compute backend.
    #[error("Tensor data error: {0}")]
    TensorData(String),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

impl GeometryError {
    /// Create a malformed affine error.
    pub fn malformed_affine(msg: impl Into<String>) -> Self {
        Self::MalformedAffine(msg.into())
    }

    /// Create a singular matrix error.
    pub fn singular(msg: impl Into<String>) -> Self {
        Self::SingularMatrix(msg.into())
    }

    /// Create an orientation error.
    pub fn orientation(msg: impl Into<String>) -> Self {
        Self::OrientationError(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Create a tensor data error.
    pub fn tensor_data(msg: impl Into<String>) -> Self {
        Self::TensorData(msg.into())
    }
}

impl From<ndarray::ShapeError> for GeometryError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::DimensionMismatch(err.to_string())
    }
}
