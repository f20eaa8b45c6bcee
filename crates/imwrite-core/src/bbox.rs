//! Spatial bounding box of the foreground in a channel-first image.

use crate::error::{GeometryError, Result};
use ndarray::{ArrayD, Axis};

/// Bounding box `(start, end)` of voxels selected by `select_fn`.
///
/// `img` is channel-first (`[C, spatial...]`). A voxel is foreground when
/// `select_fn` holds for it in any of `channel_indexes` (all channels when
/// `None`). `margin` expands the box on both sides of every axis, clamped to
/// the image. `end` is exclusive. Both vectors are all zeros when nothing is
/// selected.
pub fn generate_spatial_bounding_box<F>(
    img: &ArrayD<f64>,
    select_fn: F,
    channel_indexes: Option<&[usize]>,
    margin: &[usize],
) -> Result<(Vec<usize>, Vec<usize>)>
where
    F: Fn(f64) -> bool,
{
    if img.ndim() < 2 {
        return Err(GeometryError::dimension_mismatch(format!(
            "expected a [C, spatial...] image, got shape {:?}",
            img.shape()
        )));
    }
    let spatial = &img.shape()[1..];
    let ndim = spatial.len();
    let margin: Vec<usize> = match margin.len() {
        1 => vec![margin[0]; ndim],
        n if n == ndim => margin.to_vec(),
        n => {
            return Err(GeometryError::dimension_mismatch(format!(
                "margin has {n} entries for {ndim} spatial axes"
            )))
        }
    };

    let channels: Vec<usize> = match channel_indexes {
        Some(idx) => idx.to_vec(),
        None => (0..img.shape()[0]).collect(),
    };
    let mut mask = ArrayD::<bool>::from_elem(spatial, false);
    for &c in &channels {
        if c >= img.shape()[0] {
            return Err(GeometryError::InvalidAxis {
                axis: c as isize,
                ndim: img.shape()[0],
            });
        }
        let channel = img.index_axis(Axis(0), c);
        mask.zip_mut_with(&channel, |m, &v| *m |= select_fn(v));
    }

    let mut start = Vec::with_capacity(ndim);
    let mut end = Vec::with_capacity(ndim);
    for (a, &size) in spatial.iter().enumerate() {
        let hits: Vec<bool> = mask
            .axis_iter(Axis(a))
            .map(|lane| lane.iter().any(|&m| m))
            .collect();
        let (Some(first), Some(last)) = (
            hits.iter().position(|&h| h),
            hits.iter().rposition(|&h| h),
        ) else {
            return Ok((vec![0; ndim], vec![0; ndim]));
        };
        let lo = first.saturating_sub(margin[a]);
        let hi = (last + 1 + margin[a]).min(size).max(lo + 1);
        start.push(lo);
        end.push(hi);
    }
    Ok((start, end))
}
