//! Output grid shape when moving an image between two affines.

use super::{pad_to_rank, Affine};
use crate::error::{GeometryError, Result};
use nalgebra::DMatrix;

/// Distance from zero within which a corner counts as the minimal one.
const CORNER_TOL: f64 = 1e-8;

/// Shape and offset of the grid that covers the input image in the output
/// frame.
///
/// The `2^d` corner voxels of an image with `spatial_shape` are mapped to
/// physical space by `in_affine` and back to voxel space by the inverse of
/// `out_affine`. The output shape is the rounded extent (`ptp + 1`) of the
/// mapped corners along each axis. The offset is the physical position of the
/// corner that is minimal in the output frame.
pub fn shape_and_offset_from_affines(
    spatial_shape: &[usize],
    in_affine: &Affine,
    out_affine: &Affine,
) -> Result<(Vec<usize>, Vec<f64>)> {
    let sr = spatial_shape.len();
    if sr == 0 {
        return Err(GeometryError::dimension_mismatch(
            "spatial shape must have at least one axis",
        ));
    }
    let in_affine = pad_to_rank(in_affine, sr)?;
    let out_affine = pad_to_rank(out_affine, sr)?;

    let n_corners = 1usize << sr;
    let mut corners = DMatrix::<f64>::zeros(sr + 1, n_corners);
    for k in 0..n_corners {
        for a in 0..sr {
            if (k >> (sr - 1 - a)) & 1 == 1 {
                corners[(a, k)] = spatial_shape[a] as f64 - 1.0;
            }
        }
        corners[(sr, k)] = 1.0;
    }

    let physical = in_affine.inner() * &corners;
    let inv = out_affine.try_inverse()?;
    let mapped = inv.inner() * &physical;

    let mut shape = Vec::with_capacity(sr);
    for a in 0..sr {
        let (lo, hi) = (0..n_corners)
            .map(|k| mapped[(a, k)] / mapped[(sr, k)])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let extent = (hi - lo + 1.0).round();
        if !extent.is_finite() {
            return Err(GeometryError::malformed_affine(format!(
                "non-finite output extent along axis {a}"
            )));
        }
        shape.push(extent.max(1.0) as usize);
    }

    let linear = inv.linear_part();
    let spatial_corners = DMatrix::from_fn(sr, n_corners, |r, c| physical[(r, c)]);
    let projected = linear * spatial_corners;
    let is_min = |k: usize| {
        (0..sr).all(|a| {
            let min = (0..n_corners)
                .map(|j| projected[(a, j)] - projected[(a, k)])
                .fold(f64::INFINITY, f64::min);
            min.abs() <= CORNER_TOL
        })
    };
    let min_corner = (0..n_corners).find(|&k| is_min(k)).unwrap_or(0);
    let offset = (0..sr).map(|a| physical[(a, min_corner)]).collect();

    Ok((shape, offset))
}
