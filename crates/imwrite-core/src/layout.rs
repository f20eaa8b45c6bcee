//! Channel-last axis canonicalization.
//!
//! Writers expect arrays laid out as `[spatial..., channel]`. This module
//! moves the channel axis to the end, pads or truncates the spatial rank and
//! squeezes trailing singleton axes.

use crate::error::{GeometryError, Result};
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Options for [`to_channel_last`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLastConfig {
    /// Channel axis of the input; negative values count from the end.
    /// `None` means the input has no channel axis and one is appended.
    pub channel_dim: Option<isize>,
    /// Drop trailing length-1 axes after reordering.
    pub squeeze_end_dims: bool,
    /// Number of spatial axes to pad or truncate to. `None` or `Some(0)`
    /// leaves the spatial rank unchanged.
    pub spatial_ndim: Option<usize>,
    /// Return a C-contiguous array.
    pub contiguous: bool,
}

impl Default for ChannelLastConfig {
    fn default() -> Self {
        Self {
            channel_dim: Some(0),
            squeeze_end_dims: true,
            spatial_ndim: Some(3),
            contiguous: false,
        }
    }
}

impl ChannelLastConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel_dim(mut self, channel_dim: Option<isize>) -> Self {
        self.channel_dim = channel_dim;
        self
    }

    pub fn with_squeeze_end_dims(mut self, squeeze: bool) -> Self {
        self.squeeze_end_dims = squeeze;
        self
    }

    pub fn with_spatial_ndim(mut self, spatial_ndim: Option<usize>) -> Self {
        self.spatial_ndim = spatial_ndim;
        self
    }

    pub fn with_contiguous(mut self, contiguous: bool) -> Self {
        self.contiguous = contiguous;
        self
    }
}

/// Resolve a possibly negative axis index against `ndim`.
pub fn normalize_axis(axis: isize, ndim: usize) -> Result<usize> {
    let resolved = if axis < 0 { axis + ndim as isize } else { axis };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(GeometryError::InvalidAxis { axis, ndim });
    }
    Ok(resolved as usize)
}

/// Drop trailing length-1 axes.
pub fn squeeze_trailing<A>(mut data: ArrayD<A>) -> ArrayD<A> {
    while data.ndim() > 0 && data.shape()[data.ndim() - 1] == 1 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    data
}

/// Rearrange `data` into channel-last layout.
///
/// Steps, in order:
/// 1. move `channel_dim` to the last axis, or append a length-1 channel;
/// 2. insert length-1 axes before the channel until there are
///    `spatial_ndim` spatial axes, or drop the axis just before the channel
///    (keeping index 0) while there are too many;
/// 3. with `squeeze_end_dims`, drop trailing length-1 axes;
/// 4. with `contiguous`, copy into standard layout.
pub fn to_channel_last<A: Clone>(data: ArrayD<A>, config: &ChannelLastConfig) -> Result<ArrayD<A>> {
    let mut data = match config.channel_dim {
        Some(channel_dim) => {
            let ndim = data.ndim();
            let src = normalize_axis(channel_dim, ndim)?;
            let perm: Vec<usize> = (0..ndim)
                .filter(|&i| i != src)
                .chain(std::iter::once(src))
                .collect();
            data.permuted_axes(IxDyn(&perm))
        }
        None => {
            let ndim = data.ndim();
            data.insert_axis(Axis(ndim))
        }
    };

    if let Some(spatial_ndim) = config.spatial_ndim.filter(|&n| n > 0) {
        while data.ndim() < spatial_ndim + 1 {
            let at = data.ndim() - 1;
            data = data.insert_axis(Axis(at));
        }
        while data.ndim() > spatial_ndim + 1 {
            let at = data.ndim() - 2;
            let len = data.len_of(Axis(at));
            if len == 0 {
                return Err(GeometryError::dimension_mismatch(format!(
                    "cannot truncate empty axis {at} of shape {:?}",
                    data.shape()
                )));
            }
            if len > 1 {
                tracing::warn!(
                    axis = at,
                    len,
                    "truncating spatial axis to its first index, remaining values are discarded"
                );
            }
            data = data.index_axis_move(Axis(at), 0);
        }
    }

    if config.squeeze_end_dims {
        data = squeeze_trailing(data);
    }

    if config.contiguous {
        data = data.as_standard_layout().into_owned();
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(shape: &[usize]) -> ArrayD<f64> {
        ArrayD::zeros(IxDyn(shape))
    }

    #[test]
    fn test_default_config() {
        let config = ChannelLastConfig::default();
        assert_eq!(config.channel_dim, Some(0));
        assert!(config.squeeze_end_dims);
        assert_eq!(config.spatial_ndim, Some(3));
        assert!(!config.contiguous);
    }

    #[test]
    fn test_channel_first_to_last() {
        let out = to_channel_last(zeros(&[3, 4, 5, 6]), &ChannelLastConfig::default()).unwrap();
        assert_eq!(out.shape(), &[4, 5, 6, 3]);
    }

    #[test]
    fn test_negative_channel_dim() {
        let config = ChannelLastConfig::default().with_channel_dim(Some(-1));
        let out = to_channel_last(zeros(&[4, 5, 6, 2]), &config).unwrap();
        assert_eq!(out.shape(), &[4, 5, 6, 2]);
    }

    #[test]
    fn test_no_channel_pads_spatial() {
        let config = ChannelLastConfig::default()
            .with_channel_dim(None)
            .with_squeeze_end_dims(false);
        let out = to_channel_last(zeros(&[4, 5]), &config).unwrap();
        assert_eq!(out.shape(), &[4, 5, 1, 1]);
    }

    #[test]
    fn test_squeeze_cascades() {
        let config = ChannelLastConfig::default().with_channel_dim(None);
        let out = to_channel_last(zeros(&[4, 5]), &config).unwrap();
        assert_eq!(out.shape(), &[4, 5]);
    }

    #[test]
    fn test_truncation_keeps_first_index() {
        let data = ArrayD::from_shape_fn(IxDyn(&[1, 2, 3, 2, 2]), |idx| {
            (idx[1] * 100 + idx[2] * 10 + idx[3] + idx[4] * 1000) as f64
        });
        let out = to_channel_last(data, &ChannelLastConfig::default()).unwrap();
        // [1,2,3,2,2] -> [2,3,2,2,1] -> drop axis 3 -> [2,3,2,1] -> squeeze
        assert_eq!(out.shape(), &[2, 3, 2]);
        assert_eq!(out[[1, 2, 1]], 121.0);
    }

    #[test]
    fn test_spatial_ndim_zero_is_unset() {
        let config = ChannelLastConfig::default()
            .with_spatial_ndim(Some(0))
            .with_squeeze_end_dims(false);
        let out = to_channel_last(zeros(&[2, 7]), &config).unwrap();
        assert_eq!(out.shape(), &[7, 2]);
    }

    #[test]
    fn test_invalid_channel_dim() {
        let config = ChannelLastConfig::default().with_channel_dim(Some(4));
        assert!(matches!(
            to_channel_last(zeros(&[2, 3]), &config),
            Err(GeometryError::InvalidAxis { axis: 4, ndim: 2 })
        ));
        assert!(to_channel_last(ArrayD::<f64>::zeros(IxDyn(&[])), &ChannelLastConfig::default()).is_err());
    }

    #[test]
    fn test_contiguous_output() {
        let config = ChannelLastConfig::default().with_contiguous(true);
        let out = to_channel_last(zeros(&[2, 3, 4, 5]), &config).unwrap();
        assert!(out.is_standard_layout());
    }

    #[test]
    fn test_normalize_axis() {
        assert_eq!(normalize_axis(-1, 3).unwrap(), 2);
        assert_eq!(normalize_axis(0, 3).unwrap(), 0);
        assert!(normalize_axis(-4, 3).is_err());
    }
}
