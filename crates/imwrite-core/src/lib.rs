//! Geometry core for writing medical images.
//!
//! This crate moves in-memory image arrays between affine frames and
//! canonicalizes their axis layout before they are handed to a file backend:
//! - [`affine`]: rank padding, comparison, orientation codes and output grid
//!   shapes;
//! - [`layout`]: channel-last canonicalization;
//! - [`resample`]: relabel-or-interpolate conversion to a target affine,
//!   built on the [`sampler`] grid sampler;
//! - [`resize`]: separable 2-D resize used for raster outputs;
//! - [`bbox`]: spatial bounding box of a foreground selection.

pub mod affine;
pub mod bbox;
pub mod dtype;
pub mod error;
pub mod grid;
pub mod layout;
pub mod resample;
pub mod resize;
pub mod sampler;

pub use affine::{affines_equal, ensure_mat44, pad_to_rank, Affine, AFFINE_TOL};
pub use bbox::generate_spatial_bounding_box;
pub use dtype::{DType, TypedArray};
pub use error::{GeometryError, Result};
pub use layout::{normalize_axis, squeeze_trailing, to_channel_last, ChannelLastConfig};
pub use resample::{convert_to_target_affine, convert_to_target_affine_with, ResampleOptions};
pub use resize::{resize_2d, ResizeMode};
pub use sampler::{GridSampler, GridSamplerConfig, PaddingMode, Resample, SamplingMode};
