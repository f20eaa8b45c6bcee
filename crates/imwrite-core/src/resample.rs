//! Moving image arrays from one affine frame to another.
//!
//! [`convert_to_target_affine`] tries, in order:
//! 1. nothing, when the affines already agree;
//! 2. a flip/permutation of the leading axes, when the frames differ only by
//!    orientation;
//! 3. interpolation through a [`Resample`] implementation.

use crate::affine::{
    affines_equal, apply_orientation, ensure_mat44, inverse_orientation_affine, orientation_of,
    orientation_transform, pad_to_rank, shape_and_offset_from_affines, Affine, AFFINE_TOL,
};
use crate::dtype::DType;
use crate::error::{GeometryError, Result};
use crate::sampler::{GridSampler, GridSamplerConfig, PaddingMode, Resample, SamplingMode};
use burn_ndarray::NdArray;
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Maximum number of spatial axes handled by the resampler.
pub const MAX_SPATIAL_RANK: usize = 3;

/// Options for [`convert_to_target_affine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleOptions {
    pub mode: SamplingMode,
    pub padding_mode: PaddingMode,
    pub align_corners: bool,
    /// Compute precision. `None` keeps the input precision (f64).
    pub dtype: Option<DType>,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Bilinear,
            padding_mode: PaddingMode::Border,
            align_corners: false,
            dtype: Some(DType::F64),
        }
    }
}

impl ResampleOptions {
    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_padding_mode(mut self, padding_mode: PaddingMode) -> Self {
        self.padding_mode = padding_mode;
        self
    }

    pub fn with_align_corners(mut self, align_corners: bool) -> Self {
        self.align_corners = align_corners;
        self
    }

    pub fn with_dtype(mut self, dtype: Option<DType>) -> Self {
        self.dtype = dtype;
        self
    }

    /// Sampler configuration carried by these options.
    pub fn sampler_config(&self) -> GridSamplerConfig {
        GridSamplerConfig {
            mode: self.mode,
            padding_mode: self.padding_mode,
            align_corners: self.align_corners,
        }
    }

    /// Floating point precision to interpolate in.
    pub fn compute_dtype(&self) -> Result<DType> {
        match self.dtype {
            None => Ok(DType::F64),
            Some(dtype) if dtype.is_float() => Ok(dtype),
            Some(dtype) => Err(GeometryError::invalid_configuration(format!(
                "resampling requires a floating point dtype, got {dtype}"
            ))),
        }
    }
}

/// Convert `data` from the frame of `affine` into the frame of
/// `target_affine`, interpolating on the CPU burn backend at the precision
/// selected by `options.dtype`.
///
/// Returns the converted array and the 4×4 affine describing it.
pub fn convert_to_target_affine(
    data: ArrayD<f64>,
    affine: Option<&Affine>,
    target_affine: Option<&Affine>,
    output_spatial_shape: Option<&[usize]>,
    options: &ResampleOptions,
) -> Result<(ArrayD<f64>, Affine)> {
    let config = options.sampler_config();
    match options.compute_dtype()? {
        DType::F32 => {
            let sampler = GridSampler::<NdArray<f32>>::with_config(config, Default::default());
            convert_to_target_affine_with(data, affine, target_affine, output_spatial_shape, &sampler)
        }
        _ => {
            let sampler = GridSampler::<NdArray<f64>>::with_config(config, Default::default());
            convert_to_target_affine_with(data, affine, target_affine, output_spatial_shape, &sampler)
        }
    }
}

/// Same as [`convert_to_target_affine`] with an explicit resampler.
pub fn convert_to_target_affine_with<R: Resample + ?Sized>(
    data: ArrayD<f64>,
    affine: Option<&Affine>,
    target_affine: Option<&Affine>,
    output_spatial_shape: Option<&[usize]>,
    resampler: &R,
) -> Result<(ArrayD<f64>, Affine)> {
    let sr = data.ndim().min(MAX_SPATIAL_RANK);
    if sr == 0 {
        return Err(GeometryError::dimension_mismatch(
            "cannot resample a zero-dimensional array",
        ));
    }

    let current = match affine {
        Some(a) => pad_to_rank(a, sr)?,
        None => Affine::identity(sr),
    };
    let target = match target_affine {
        Some(t) => pad_to_rank(t, sr)?,
        None => current.clone(),
    };

    if affines_equal(&current, &target, AFFINE_TOL) {
        tracing::debug!("affines match, no resampling needed");
        return Ok((data, ensure_mat44(&target)?));
    }

    let xform = orientation_transform(&orientation_of(&current)?, &orientation_of(&target)?)?;
    let data_shape = data.shape().to_vec();
    let data = apply_orientation(data, &xform)?;
    let current = &current * &inverse_orientation_affine(&xform, &data_shape)?;
    if affines_equal(&current, &target, AFFINE_TOL) {
        tracing::debug!(?xform, "affines differ only by orientation, array reoriented");
        return Ok((data, ensure_mat44(&current)?));
    }

    let mut output_shape = match output_spatial_shape {
        Some(shape) => shape.to_vec(),
        None => shape_and_offset_from_affines(&data.shape()[..sr], &current, &target)?.0,
    };
    output_shape.resize(sr, 1);
    tracing::debug!(
        input_shape = ?data.shape(),
        ?output_shape,
        "resampling to target affine"
    );

    let data = data.as_standard_layout().into_owned();
    let shape = data.shape().to_vec();
    let extra: Vec<usize> = shape[sr..].to_vec();
    let batch = if extra.is_empty() {
        data.insert_axis(Axis(0))
    } else {
        let channels: usize = extra.iter().product();
        let mut flat_shape = shape[..sr].to_vec();
        flat_shape.push(channels);
        let perm: Vec<usize> = std::iter::once(sr).chain(0..sr).collect();
        data.into_shape(IxDyn(&flat_shape))?
            .permuted_axes(IxDyn(&perm))
    };
    let batch = batch.insert_axis(Axis(0)).as_standard_layout().into_owned();

    let theta = &current.try_inverse()? * &target;
    let resampled = resampler
        .resample(batch, &theta, &output_shape)?
        .index_axis_move(Axis(0), 0);

    let output = if extra.is_empty() {
        resampled.index_axis_move(Axis(0), 0)
    } else {
        let perm: Vec<usize> = (1..=sr).chain(std::iter::once(0)).collect();
        let moved = resampled
            .permuted_axes(IxDyn(&perm))
            .as_standard_layout()
            .into_owned();
        let mut full_shape = output_shape.clone();
        full_shape.extend_from_slice(&extra);
        moved.into_shape(IxDyn(&full_shape))?
    };

    Ok((output, ensure_mat44(&target)?))
}
