use crate::error::{Result, WriterError};
use imwrite_core::{ensure_mat44, Affine, TypedArray};
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use std::path::Path;

/// NIfTI sform code for "aligned to another file or anatomical truth".
const SFORM_ALIGNED: i16 = 2;

/// Maximum number of data dimensions a NIfTI-1 header can describe.
const MAX_NIFTI_DIMS: usize = 7;

/// Channel-last array with its 4×4 affine, ready to be written as NIfTI.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiImage {
    data: TypedArray,
    affine: Affine,
}

impl NiftiImage {
    /// Create a NIfTI image. The affine is expanded to 4×4.
    pub fn new(data: TypedArray, affine: &Affine) -> Result<Self> {
        if data.ndim() == 0 || data.ndim() > MAX_NIFTI_DIMS {
            return Err(WriterError::unsupported_layout(format!(
                "NIfTI supports 1 to {MAX_NIFTI_DIMS} dimensions, got shape {:?}",
                data.shape()
            )));
        }
        Ok(Self {
            data,
            affine: ensure_mat44(affine)?,
        })
    }

    pub fn data(&self) -> &TypedArray {
        &self.data
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Header carrying the sform rows and voxel sizes of the affine.
    ///
    /// Dimensions and datatype are filled in by the writer from the data.
    pub fn header(&self) -> NiftiHeader {
        let a = &self.affine;
        let mut header = NiftiHeader::default();
        header.sform_code = SFORM_ALIGNED;
        header.srow_x = [a[(0, 0)] as f32, a[(0, 1)] as f32, a[(0, 2)] as f32, a[(0, 3)] as f32];
        header.srow_y = [a[(1, 0)] as f32, a[(1, 1)] as f32, a[(1, 2)] as f32, a[(1, 3)] as f32];
        header.srow_z = [a[(2, 0)] as f32, a[(2, 1)] as f32, a[(2, 2)] as f32, a[(2, 3)] as f32];
        header.pixdim[0] = 1.0;
        for c in 0..3 {
            let norm = (0..3).map(|r| a[(r, c)].powi(2)).sum::<f64>().sqrt();
            header.pixdim[c + 1] = norm as f32;
        }
        header
    }

    /// Write to `path`; a `.nii.gz` extension produces a compressed file.
    pub fn write<P: AsRef<Path>>(&self, path: P, verbose: bool) -> Result<()> {
        let path = path.as_ref();
        if verbose {
            tracing::info!("writing: {}", path.display());
        }
        let header = self.header();
        let writer = WriterOptions::new(path).reference_header(&header);
        match &self.data {
            TypedArray::U8(a) => writer.write_nifti(a)?,
            TypedArray::U16(a) => writer.write_nifti(a)?,
            TypedArray::I16(a) => writer.write_nifti(a)?,
            TypedArray::I32(a) => writer.write_nifti(a)?,
            TypedArray::F32(a) => writer.write_nifti(a)?,
            TypedArray::F64(a) => writer.write_nifti(a)?,
        }
        Ok(())
    }
}
