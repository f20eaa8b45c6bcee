//! Error types for backend assembly and file writing.

use imwrite_core::GeometryError;
use thiserror::Error;

/// Main error type for the writer crate.
#[derive(Error, Debug)]
pub enum WriterError {
    /// Geometry or array conversion failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// NIfTI encoder error.
    #[cfg(feature = "nifti")]
    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// Raster encoder error.
    #[cfg(feature = "raster")]
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// The array cannot be represented by the backend's pixel types.
    #[error("Unsupported pixel layout: {0}")]
    UnsupportedLayout(String),
}

/// Result type for writer operations.
pub type Result<T> = std::result::Result<T, WriterError>;

impl WriterError {
    /// Create an unsupported layout error.
    pub fn unsupported_layout(msg: impl Into<String>) -> Self {
        Self::UnsupportedLayout(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_error_is_transparent() {
        let err: WriterError = GeometryError::invalid_configuration("unsupported scale: 100").into();
        assert_eq!(err.to_string(), "Invalid configuration: unsupported scale: 100");
    }

    #[test]
    fn test_unsupported_layout() {
        let err = WriterError::unsupported_layout("5 channels");
        assert_eq!(err.to_string(), "Unsupported pixel layout: 5 channels");
    }
}
