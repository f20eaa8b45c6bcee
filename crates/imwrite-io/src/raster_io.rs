//! 2-D raster output (PNG, JPEG, TIFF, ...) through the `image` crate.

use crate::error::{Result, WriterError};
use burn_ndarray::NdArray;
use image::{DynamicImage, ImageBuffer};
use imwrite_core::{resize_2d, DType, GeometryError, ResizeMode, TypedArray};
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Channel arrangement of a raster pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    /// Grayscale.
    L,
    /// Grayscale with alpha.
    LA,
    RGB,
    RGBA,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::L => 1,
            PixelLayout::LA => 2,
            PixelLayout::RGB => 3,
            PixelLayout::RGBA => 4,
        }
    }

    /// Layout implied by a channel count.
    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(PixelLayout::L),
            2 => Some(PixelLayout::LA),
            3 => Some(PixelLayout::RGB),
            4 => Some(PixelLayout::RGBA),
            _ => None,
        }
    }
}

/// Options for raster output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterOptions {
    /// Integer range to scale `[0, 1]` data into: 255 or 65535. `None`
    /// keeps floating point values.
    pub scale: Option<u32>,
    /// Interpolation used when resizing to a target shape.
    pub mode: ResizeMode,
    /// Swap the first two axes so that axis 0 becomes the image width.
    pub reverse_indexing: bool,
    /// Explicit pixel layout; inferred from the channel count when unset.
    pub pixel_layout: Option<PixelLayout>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: Some(255),
            mode: ResizeMode::Bicubic,
            reverse_indexing: true,
            pixel_layout: None,
        }
    }
}

impl RasterOptions {
    pub fn with_scale(mut self, scale: Option<u32>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_mode(mut self, mode: ResizeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reverse_indexing(mut self, reverse_indexing: bool) -> Self {
        self.reverse_indexing = reverse_indexing;
        self
    }

    pub fn with_pixel_layout(mut self, layout: Option<PixelLayout>) -> Self {
        self.pixel_layout = layout;
        self
    }
}

fn scaled_dtype(scale: Option<u32>) -> Result<Option<(DType, f64)>> {
    match scale {
        None => Ok(None),
        Some(255) => Ok(Some((DType::U8, 255.0))),
        Some(65535) => Ok(Some((DType::U16, 65535.0))),
        Some(other) => Err(GeometryError::invalid_configuration(format!(
            "unsupported scale: {other}, available options are [255, 65535]"
        ))
        .into()),
    }
}

/// Resize a channel-last 2-D array and map it into an integer range.
///
/// A trailing length-1 channel is dropped. With `output_spatial_shape`
/// (one value is used for both axes) the image is resized with `mode` and,
/// unless `mode` is nearest, clipped to its original value range. With
/// `scale` the data is clipped to `[0, 1]`, multiplied by the scale and
/// rounded to `u8` (255) or `u16` (65535).
pub fn resample_and_clip(
    data: ArrayD<f64>,
    output_spatial_shape: Option<&[usize]>,
    mode: ResizeMode,
    scale: Option<u32>,
) -> Result<TypedArray> {
    let scaling = scaled_dtype(scale)?;

    let mut data = data;
    if data.ndim() == 3 && data.shape()[2] == 1 {
        data = data.index_axis_move(Axis(2), 0);
    }

    if let Some(shape) = output_spatial_shape {
        let target = match *shape {
            [s] => [s, s],
            [h, w] => [h, w],
            _ => {
                return Err(GeometryError::dimension_mismatch(format!(
                    "raster output shape must have 1 or 2 entries, got {shape:?}"
                ))
                .into())
            }
        };
        let (lo, hi) = data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let has_channel = data.ndim() == 3;
        let channel_first = match data.ndim() {
            2 => data.insert_axis(Axis(0)),
            3 => data.permuted_axes(IxDyn(&[2, 0, 1])),
            _ => {
                return Err(WriterError::unsupported_layout(format!(
                    "raster data must be [H, W] or [H, W, C], got shape {:?}",
                    data.shape()
                )))
            }
        };
        let resized =
            resize_2d::<NdArray<f64>>(&channel_first, target, mode, false, &Default::default())?;
        data = if has_channel {
            resized
                .permuted_axes(IxDyn(&[1, 2, 0]))
                .as_standard_layout()
                .into_owned()
        } else {
            resized.index_axis_move(Axis(0), 0)
        };

        if mode != ResizeMode::Nearest && lo <= hi {
            data.mapv_inplace(|v| v.clamp(lo, hi));
        }
    }

    Ok(match scaling {
        None => TypedArray::F64(data),
        Some((dtype, max)) => {
            let scaled = data.mapv(|v| (v.clamp(0.0, 1.0) * max).round());
            TypedArray::from_f64(scaled, dtype)
        }
    })
}

fn buffer<P: image::Pixel>(
    width: u32,
    height: u32,
    raw: Vec<P::Subpixel>,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>> {
    ImageBuffer::from_raw(width, height, raw).ok_or_else(|| {
        WriterError::unsupported_layout(format!(
            "pixel buffer does not match a {width}x{height} image"
        ))
    })
}

/// 2-D raster image ready to be encoded.
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
}

impl RasterImage {
    /// Build an image from a channel-last `[H, W]` or `[H, W, C]` array of
    /// `u8` or `u16` pixels.
    ///
    /// With `reverse_indexing` the first two axes are swapped first, so the
    /// array is read as `[W, H, (C)]`.
    pub fn from_array(
        data: TypedArray,
        reverse_indexing: bool,
        layout: Option<PixelLayout>,
    ) -> Result<Self> {
        if data.ndim() != 2 && data.ndim() != 3 {
            return Err(WriterError::unsupported_layout(format!(
                "raster data must have 2 or 3 axes, got shape {:?}",
                data.shape()
            )));
        }
        let data = if reverse_indexing {
            data.swapped(0, 1)
        } else {
            data
        };

        let shape = data.shape();
        let (height, width) = (shape[0], shape[1]);
        let channels = shape.get(2).copied().unwrap_or(1);
        let layout = match layout {
            Some(layout) if layout.channels() == channels => layout,
            Some(layout) => {
                return Err(WriterError::unsupported_layout(format!(
                    "{layout:?} needs {} channels, got {channels}",
                    layout.channels()
                )))
            }
            None => PixelLayout::from_channels(channels).ok_or_else(|| {
                WriterError::unsupported_layout(format!("no pixel layout has {channels} channels"))
            })?,
        };
        let to_u32 = |v: usize| {
            u32::try_from(v).map_err(|_| {
                WriterError::unsupported_layout(format!("image extent {v} exceeds u32"))
            })
        };
        let (width, height) = (to_u32(width)?, to_u32(height)?);

        let image = match data {
            TypedArray::U8(a) => {
                let raw: Vec<u8> = a.iter().copied().collect();
                match layout {
                    PixelLayout::L => DynamicImage::ImageLuma8(buffer(width, height, raw)?),
                    PixelLayout::LA => DynamicImage::ImageLumaA8(buffer(width, height, raw)?),
                    PixelLayout::RGB => DynamicImage::ImageRgb8(buffer(width, height, raw)?),
                    PixelLayout::RGBA => DynamicImage::ImageRgba8(buffer(width, height, raw)?),
                }
            }
            TypedArray::U16(a) => {
                let raw: Vec<u16> = a.iter().copied().collect();
                match layout {
                    PixelLayout::L => DynamicImage::ImageLuma16(buffer(width, height, raw)?),
                    PixelLayout::LA => DynamicImage::ImageLumaA16(buffer(width, height, raw)?),
                    PixelLayout::RGB => DynamicImage::ImageRgb16(buffer(width, height, raw)?),
                    PixelLayout::RGBA => DynamicImage::ImageRgba16(buffer(width, height, raw)?),
                }
            }
            other => {
                return Err(WriterError::unsupported_layout(format!(
                    "raster pixels must be uint8 or uint16, got {}",
                    other.dtype()
                )))
            }
        };
        Ok(Self { image })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode to `path`; the format follows the file extension.
    pub fn write<P: AsRef<Path>>(&self, path: P, verbose: bool) -> Result<()> {
        let path = path.as_ref();
        if verbose {
            tracing::info!("writing: {}", path.display());
        }
        self.image.save(path)?;
        Ok(())
    }
}
