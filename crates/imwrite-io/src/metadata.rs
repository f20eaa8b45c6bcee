//! Geometry metadata attached to an array being written.

use imwrite_core::Affine;
use serde::{Deserialize, Serialize};

/// Metadata bundle consulted when assembling a backend image.
///
/// All fields are optional; missing affines default to identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Frame the array should be written in when resampling is requested.
    pub original_affine: Option<Affine>,
    /// Frame the array is currently in.
    pub affine: Option<Affine>,
    /// Spatial shape of the output grid.
    pub spatial_shape: Option<Vec<usize>>,
}

impl ImageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_original_affine(mut self, affine: Affine) -> Self {
        self.original_affine = Some(affine);
        self
    }

    pub fn with_affine(mut self, affine: Affine) -> Self {
        self.affine = Some(affine);
        self
    }

    pub fn with_spatial_shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.spatial_shape = Some(shape.into());
        self
    }

    /// Borrow `(original_affine, affine, spatial_shape)`.
    pub fn parts(&self) -> (Option<&Affine>, Option<&Affine>, Option<&[usize]>) {
        (
            self.original_affine.as_ref(),
            self.affine.as_ref(),
            self.spatial_shape.as_deref(),
        )
    }
}
