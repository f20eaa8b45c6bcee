//! Separable 2-D resize of channel-first images.
//!
//! Each axis is resized by multiplying with a `[out, in]` weight matrix, so
//! the whole resize is two matmuls on the burn backend. Source positions
//! follow the half-pixel convention unless `align_corners` is set.

use crate::error::{GeometryError, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

const CUBIC_A: f64 = -0.75;

/// Resize interpolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    Nearest,
    Bilinear,
    #[default]
    Bicubic,
    /// Average of the source pixels covered by each output pixel.
    Area,
}

impl ResizeMode {
    /// Whether `align_corners` has any effect for this mode.
    pub fn uses_align_corners(self) -> bool {
        matches!(self, ResizeMode::Bilinear | ResizeMode::Bicubic)
    }
}

fn source_scale(in_size: usize, out_size: usize, align_corners: bool) -> f64 {
    if align_corners {
        if out_size > 1 {
            (in_size as f64 - 1.0) / (out_size as f64 - 1.0)
        } else {
            0.0
        }
    } else {
        in_size as f64 / out_size as f64
    }
}

fn source_index(scale: f64, dst: usize, align_corners: bool) -> f64 {
    if align_corners {
        scale * dst as f64
    } else {
        scale * (dst as f64 + 0.5) - 0.5
    }
}

fn cubic_near(x: f64) -> f64 {
    ((CUBIC_A + 2.0) * x - (CUBIC_A + 3.0)) * x * x + 1.0
}

fn cubic_far(x: f64) -> f64 {
    ((CUBIC_A * x - 5.0 * CUBIC_A) * x + 8.0 * CUBIC_A) * x - 4.0 * CUBIC_A
}

/// Row-major `[out_size, in_size]` interpolation matrix for one axis.
pub fn resize_weights(
    in_size: usize,
    out_size: usize,
    mode: ResizeMode,
    align_corners: bool,
) -> Vec<f64> {
    let mut weights = vec![0.0; out_size * in_size];
    let align_corners = align_corners && mode.uses_align_corners();
    let scale = source_scale(in_size, out_size, align_corners);
    let last = in_size - 1;

    for dst in 0..out_size {
        let row = &mut weights[dst * in_size..(dst + 1) * in_size];
        match mode {
            ResizeMode::Nearest => {
                let src = ((dst as f64 * scale).floor() as usize).min(last);
                row[src] = 1.0;
            }
            ResizeMode::Bilinear => {
                let src = source_index(scale, dst, align_corners).max(0.0);
                let x0 = (src.floor() as usize).min(last);
                let x1 = (x0 + 1).min(last);
                let l1 = src - x0 as f64;
                row[x0] += 1.0 - l1;
                row[x1] += l1;
            }
            ResizeMode::Bicubic => {
                let src = source_index(scale, dst, align_corners);
                let x0 = src.floor();
                let t = src - x0;
                let taps = [
                    cubic_far(t + 1.0),
                    cubic_near(t),
                    cubic_near(1.0 - t),
                    cubic_far(2.0 - t),
                ];
                for (k, w) in taps.into_iter().enumerate() {
                    let idx = (x0 + k as f64 - 1.0).clamp(0.0, last as f64) as usize;
                    row[idx] += w;
                }
            }
            ResizeMode::Area => {
                let start = dst * in_size / out_size;
                let end = ((dst + 1) * in_size).div_ceil(out_size);
                let count = (end - start) as f64;
                for w in &mut row[start..end] {
                    *w = 1.0 / count;
                }
            }
        }
    }
    weights
}

fn weight_tensor<B: Backend>(
    in_size: usize,
    out_size: usize,
    mode: ResizeMode,
    align_corners: bool,
    device: &B::Device,
) -> Tensor<B, 2> {
    let weights = resize_weights(in_size, out_size, mode, align_corners);
    Tensor::from_data(
        TensorData::new(weights, [out_size, in_size]).convert::<B::FloatElem>(),
        device,
    )
}

/// Resize a `[C, H, W]` array to `[C, output_shape[0], output_shape[1]]`.
pub fn resize_2d<B: Backend>(
    data: &ArrayD<f64>,
    output_shape: [usize; 2],
    mode: ResizeMode,
    align_corners: bool,
    device: &B::Device,
) -> Result<ArrayD<f64>> {
    let shape = data.shape();
    if shape.len() != 3 {
        return Err(GeometryError::dimension_mismatch(format!(
            "resize expects a [C, H, W] array, got shape {shape:?}"
        )));
    }
    let (c, h, w) = (shape[0], shape[1], shape[2]);
    let [oh, ow] = output_shape;
    if c == 0 || h == 0 || w == 0 || oh == 0 || ow == 0 {
        return Err(GeometryError::dimension_mismatch(format!(
            "cannot resize {shape:?} to {output_shape:?}"
        )));
    }

    let values: Vec<f64> = data.iter().copied().collect();
    let x = Tensor::<B, 2>::from_data(
        TensorData::new(values, [c * h, w]).convert::<B::FloatElem>(),
        device,
    );
    let ww = weight_tensor::<B>(w, ow, mode, align_corners, device);
    let wh = weight_tensor::<B>(h, oh, mode, align_corners, device);

    // Resize W, then move H last and resize it.
    let x = x.matmul(ww.transpose());
    let x = x.reshape([c, h, ow]).swap_dims(1, 2).reshape([c * ow, h]);
    let x = x.matmul(wh.transpose());
    let x = x.reshape([c, ow, oh]).swap_dims(1, 2);

    let values = x
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| GeometryError::tensor_data(format!("{e:?}")))?;
    Ok(ArrayD::from_shape_vec(IxDyn(&[c, oh, ow]), values)?)
}
