//! Grid sampling through an affine sampling transform.
//!
//! [`GridSampler`] is the interpolation kernel behind the [`Resample`] seam.
//! For every output voxel index `o` it samples the input at the voxel
//! position `A · [o, 1]`, where `A` is the homogeneous sampling transform.
//! Sampling is separable: each spatial axis contributes a set of taps
//! (index, weight) and the result is the weighted sum over all tap
//! combinations gathered from the flattened input.

use crate::affine::Affine;
use crate::error::{GeometryError, Result};
use crate::grid::{generate_grid, strides};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Cubic convolution coefficient.
const CUBIC_A: f64 = -0.75;

/// Interpolation mode for grid sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Nearest neighbor (rounded index).
    Nearest,
    /// Linear along each axis (bilinear for 2D, trilinear for 3D).
    #[default]
    Bilinear,
    /// Cubic convolution over a 4-tap neighborhood per axis.
    Bicubic,
}

/// Padding mode for out-of-bounds sample positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Out-of-bounds taps contribute zero.
    Zeros,
    /// Positions are clamped to the border.
    #[default]
    Border,
    /// Positions are reflected at the border.
    Reflection,
}

/// Configuration for grid sampling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSamplerConfig {
    pub mode: SamplingMode,
    pub padding_mode: PaddingMode,
    /// Only changes the reflection bounds: with corners aligned the image
    /// spans `[0, size-1]`, otherwise `[-0.5, size-0.5]`.
    pub align_corners: bool,
}

impl Default for GridSamplerConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Bilinear,
            padding_mode: PaddingMode::Border,
            align_corners: false,
        }
    }
}

impl GridSamplerConfig {
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
}

/// Resampling primitive.
///
/// `batch` has layout `[N, C, spatial...]` with 1 to 3 spatial axes and
/// `transform` maps homogeneous output voxel indices to input voxel indices.
/// The result has layout `[N, C, output_spatial_shape...]`.
pub trait Resample {
    fn resample(
        &self,
        batch: ArrayD<f64>,
        transform: &Affine,
        output_spatial_shape: &[usize],
    ) -> Result<ArrayD<f64>>;
}

/// Grid sampler running on a burn backend.
pub struct GridSampler<B: Backend> {
    config: GridSamplerConfig,
    device: B::Device,
}

/// One sampling tap along an axis: clamped index and its weight.
type Tap<B> = (Tensor<B, 1, Int>, Tensor<B, 1>);

impl<B: Backend> GridSampler<B> {
    /// Create new grid sampler with default configuration
    pub fn new(device: B::Device) -> Self {
        Self {
            config: GridSamplerConfig::default(),
            device,
        }
    }

    /// Create grid sampler with custom configuration
    pub fn with_config(config: GridSamplerConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    pub fn config(&self) -> &GridSamplerConfig {
        &self.config
    }

    /// Input voxel positions for every output voxel, shape `[M, D]`.
    fn source_coordinates(&self, transform: &Affine, output_shape: &[usize]) -> Tensor<B, 2> {
        let d = output_shape.len();
        let grid = generate_grid::<B>(output_shape, &self.device);

        let mut linear_t = Vec::with_capacity(d * d);
        for r in 0..d {
            for c in 0..d {
                linear_t.push(transform[(c, r)]);
            }
        }
        let linear_t = Tensor::<B, 2>::from_data(
            TensorData::new(linear_t, [d, d]).convert::<B::FloatElem>(),
            &self.device,
        );
        let offset: Vec<f64> = (0..d).map(|r| transform[(r, d)]).collect();
        let offset = Tensor::<B, 2>::from_data(
            TensorData::new(offset, [1, d]).convert::<B::FloatElem>(),
            &self.device,
        );

        grid.matmul(linear_t) + offset
    }

    /// Apply the padding rule to continuous positions along an axis.
    fn pad_coordinates(&self, x: Tensor<B, 1>, size: usize) -> Tensor<B, 1> {
        let hi = (size - 1) as f64;
        match self.config.padding_mode {
            PaddingMode::Zeros => x,
            PaddingMode::Border => x.clamp(0.0, hi),
            PaddingMode::Reflection => {
                let reflected = if self.config.align_corners {
                    reflect(x, 0.0, 2.0 * hi)
                } else {
                    reflect(x, -1.0, 2.0 * size as f64 - 1.0)
                };
                reflected.clamp(0.0, hi)
            }
        }
    }

    /// Turn a (possibly out-of-range) integer position into a gather index,
    /// zeroing the weight of out-of-range taps under zero padding.
    fn bounded_tap(&self, index: Tensor<B, 1>, weight: Tensor<B, 1>, size: usize) -> Tap<B> {
        let hi = (size - 1) as f64;
        let weight = if self.config.padding_mode == PaddingMode::Zeros {
            let valid = (index.clone().greater_equal_elem(0.0).int()
                * index.clone().lower_equal_elem(hi).int())
            .float();
            weight * valid
        } else {
            weight
        };
        (index.clamp(0.0, hi).int(), weight)
    }

    /// Taps along one axis of length `size` for positions `x`.
    fn axis_taps(&self, x: Tensor<B, 1>, size: usize) -> Vec<Tap<B>> {
        match self.config.mode {
            SamplingMode::Nearest => {
                let index = self.pad_coordinates(x, size).round();
                let weight = index.ones_like();
                vec![self.bounded_tap(index, weight, size)]
            }
            SamplingMode::Bilinear => {
                let x = self.pad_coordinates(x, size);
                let x0 = x.clone().floor();
                let w1 = x - x0.clone();
                let w0 = w1.clone().neg().add_scalar(1.0);
                vec![
                    self.bounded_tap(x0.clone(), w0, size),
                    self.bounded_tap(x0 + 1.0, w1, size),
                ]
            }
            SamplingMode::Bicubic => {
                let x0 = x.clone().floor();
                let t = x - x0.clone();
                let weights = [
                    cubic_far(t.clone().add_scalar(1.0)),
                    cubic_near(t.clone()),
                    cubic_near(t.clone().neg().add_scalar(1.0)),
                    cubic_far(t.neg().add_scalar(2.0)),
                ];
                weights
                    .into_iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let index = self.pad_coordinates(x0.clone().add_scalar(k as f64 - 1.0), size);
                        self.bounded_tap(index, w, size)
                    })
                    .collect()
            }
        }
    }
}

impl<B: Backend> Resample for GridSampler<B> {
    fn resample(
        &self,
        batch: ArrayD<f64>,
        transform: &Affine,
        output_spatial_shape: &[usize],
    ) -> Result<ArrayD<f64>> {
        let shape = batch.shape().to_vec();
        if shape.len() < 3 || shape.len() > 5 {
            return Err(GeometryError::dimension_mismatch(format!(
                "expected [N, C, spatial...] with 1 to 3 spatial axes, got shape {shape:?}"
            )));
        }
        let sr = shape.len() - 2;
        if output_spatial_shape.len() != sr {
            return Err(GeometryError::ShapeMismatch {
                expected: shape[2..].to_vec(),
                actual: output_spatial_shape.to_vec(),
            });
        }
        if transform.nrows() != sr + 1 || !transform.is_square() {
            return Err(GeometryError::dimension_mismatch(format!(
                "sampling transform is {}x{}, expected {}x{}",
                transform.nrows(),
                transform.ncols(),
                sr + 1,
                sr + 1
            )));
        }
        if shape.contains(&0) || output_spatial_shape.contains(&0) {
            return Err(GeometryError::dimension_mismatch(format!(
                "cannot resample empty arrays: input {shape:?}, output {output_spatial_shape:?}"
            )));
        }

        let in_spatial = &shape[2..];
        let rows = shape[0] * shape[1];
        let in_numel: usize = in_spatial.iter().product();
        let out_numel: usize = output_spatial_shape.iter().product();

        let values: Vec<f64> = batch.iter().copied().collect();
        let input = Tensor::<B, 2>::from_data(
            TensorData::new(values, [rows, in_numel]).convert::<B::FloatElem>(),
            &self.device,
        );

        let coords = self.source_coordinates(transform, output_spatial_shape);
        let taps: Vec<Vec<Tap<B>>> = (0..sr)
            .map(|a| {
                let x = coords.clone().narrow(1, a, 1).reshape([out_numel]);
                self.axis_taps(x, in_spatial[a])
            })
            .collect();

        let strides = strides(in_spatial);
        let counts: Vec<usize> = taps.iter().map(Vec::len).collect();
        let combinations: usize = counts.iter().product();

        let mut output = Tensor::<B, 2>::zeros([rows, out_numel], &self.device);
        for combo in 0..combinations {
            let mut rem = combo;
            let mut flat: Option<Tensor<B, 1, Int>> = None;
            let mut weight: Option<Tensor<B, 1>> = None;
            for a in (0..sr).rev() {
                let (index, w) = &taps[a][rem % counts[a]];
                rem /= counts[a];
                let term = index.clone().mul_scalar(strides[a] as i64);
                flat = Some(match flat {
                    Some(acc) => acc + term,
                    None => term,
                });
                weight = Some(match weight {
                    Some(acc) => acc * w.clone(),
                    None => w.clone(),
                });
            }
            let (Some(flat), Some(weight)) = (flat, weight) else {
                continue;
            };
            let gathered = input.clone().select(1, flat);
            output = output + gathered * weight.reshape([1, out_numel]);
        }

        let values = output
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| GeometryError::tensor_data(format!("{e:?}")))?;
        let mut out_shape = vec![shape[0], shape[1]];
        out_shape.extend_from_slice(output_spatial_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&out_shape), values)?)
    }
}

/// Reflect `x` into the interval `[twice_low / 2, twice_high / 2]`.
fn reflect<B: Backend>(x: Tensor<B, 1>, twice_low: f64, twice_high: f64) -> Tensor<B, 1> {
    if twice_low == twice_high {
        return x.zeros_like();
    }
    let min = twice_low / 2.0;
    let span = (twice_high - twice_low) / 2.0;
    let x = x.sub_scalar(min).abs();
    let flips = x.clone().div_scalar(span).floor();
    let extra = x - flips.clone().mul_scalar(span);
    let parity = flips.clone() - flips.div_scalar(2.0).floor().mul_scalar(2.0);
    let odd = parity.greater_elem(0.5);
    let forward = extra.clone().add_scalar(min);
    let backward = extra.neg().add_scalar(span + min);
    forward.mask_where(odd, backward)
}

/// Cubic convolution kernel for `|x| <= 1`.
fn cubic_near<B: Backend>(x: Tensor<B, 1>) -> Tensor<B, 1> {
    (x.clone().mul_scalar(CUBIC_A + 2.0).sub_scalar(CUBIC_A + 3.0) * x.clone() * x).add_scalar(1.0)
}

/// Cubic convolution kernel for `1 < |x| < 2`.
fn cubic_far<B: Backend>(x: Tensor<B, 1>) -> Tensor<B, 1> {
    ((x.clone().mul_scalar(CUBIC_A).sub_scalar(5.0 * CUBIC_A) * x.clone()).add_scalar(8.0 * CUBIC_A)
        * x)
        .sub_scalar(4.0 * CUBIC_A)
}
