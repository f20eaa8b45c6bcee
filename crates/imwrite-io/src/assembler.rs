//! From a raw array and its metadata to a backend image.
//!
//! [`assemble`] runs the writing pipeline:
//! 1. move the channel axis last and fix the number of spatial axes;
//! 2. for NIfTI and MetaImage, bring the array into the target frame with
//!    [`convert_to_target_affine`]; for raster images, resize to the
//!    requested shape and scale into an integer range;
//! 3. wrap the result in the backend's image type.

use crate::error::Result;
use crate::metadata::ImageMetadata;
use imwrite_core::{squeeze_trailing, to_channel_last, ChannelLastConfig, DType, ResampleOptions};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "itk")]
use crate::itk_io::ItkImage;
#[cfg(feature = "nifti")]
use crate::nifti_io::NiftiImage;
#[cfg(feature = "raster")]
use crate::raster_io::{resample_and_clip, RasterImage, RasterOptions};
#[cfg(any(feature = "nifti", feature = "itk"))]
use imwrite_core::{convert_to_target_affine, TypedArray};

/// File format family an image is assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterBackend {
    /// Volumetric NIfTI-1 (`.nii`, `.nii.gz`).
    #[cfg(feature = "nifti")]
    Nifti,
    /// MetaImage in LPS coordinates (`.mha`, `.mhd`).
    #[cfg(feature = "itk")]
    Itk,
    /// 2-D raster formats handled by the `image` crate.
    #[cfg(feature = "raster")]
    Raster,
}

impl WriterBackend {
    /// Backend able to write `path`, chosen from its extension.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        let ext = name.rsplit('.').next()?;
        match ext {
            #[cfg(feature = "nifti")]
            "nii" => Some(WriterBackend::Nifti),
            #[cfg(feature = "nifti")]
            "gz" if name.ends_with(".nii.gz") => Some(WriterBackend::Nifti),
            #[cfg(feature = "itk")]
            "mha" | "mhd" => Some(WriterBackend::Itk),
            #[cfg(feature = "raster")]
            "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff" | "gif" => Some(WriterBackend::Raster),
            _ => None,
        }
    }
}

/// Options for [`assemble`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Convert into `original_affine` (volumes) or resize to
    /// `spatial_shape` (raster images).
    pub resample: bool,
    /// Axis holding channels in the input, `None` when there is none.
    pub channel_dim: Option<isize>,
    /// Drop trailing length-1 axes after moving the channel last.
    pub squeeze_end_dims: bool,
    /// Number of spatial axes to pad or truncate to.
    pub spatial_ndim: Option<usize>,
    /// Pixel type of the assembled image; `None` keeps f64.
    pub output_dtype: Option<DType>,
    pub resample_options: ResampleOptions,
    #[cfg(feature = "raster")]
    pub raster: RasterOptions,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            resample: true,
            channel_dim: Some(0),
            squeeze_end_dims: true,
            spatial_ndim: Some(3),
            output_dtype: Some(DType::F32),
            resample_options: ResampleOptions::default(),
            #[cfg(feature = "raster")]
            raster: RasterOptions::default(),
        }
    }
}

impl WriteConfig {
    /// Defaults for `backend`: three spatial axes and `f32` pixels for
    /// volumes, two spatial axes and `u8` pixels for raster images.
    pub fn for_backend(backend: WriterBackend) -> Self {
        match backend {
            #[cfg(feature = "raster")]
            WriterBackend::Raster => Self {
                spatial_ndim: Some(2),
                output_dtype: Some(DType::U8),
                ..Self::default()
            },
            #[allow(unreachable_patterns)]
            _ => Self::default(),
        }
    }

    pub fn with_resample(mut self, resample: bool) -> Self {
        self.resample = resample;
        self
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

    pub fn with_output_dtype(mut self, dtype: Option<DType>) -> Self {
        self.output_dtype = dtype;
        self
    }

    pub fn with_resample_options(mut self, options: ResampleOptions) -> Self {
        self.resample_options = options;
        self
    }

    #[cfg(feature = "raster")]
    pub fn with_raster(mut self, options: RasterOptions) -> Self {
        self.raster = options;
        self
    }
}

/// An assembled image, ready to be written.
#[derive(Debug, Clone)]
pub enum BackendImage {
    #[cfg(feature = "nifti")]
    Nifti(NiftiImage),
    #[cfg(feature = "itk")]
    Itk(ItkImage),
    #[cfg(feature = "raster")]
    Raster(RasterImage),
}

impl BackendImage {
    pub fn backend(&self) -> WriterBackend {
        match self {
            #[cfg(feature = "nifti")]
            BackendImage::Nifti(_) => WriterBackend::Nifti,
            #[cfg(feature = "itk")]
            BackendImage::Itk(_) => WriterBackend::Itk,
            #[cfg(feature = "raster")]
            BackendImage::Raster(_) => WriterBackend::Raster,
        }
    }

    pub fn write<P: AsRef<Path>>(&self, path: P, verbose: bool) -> Result<()> {
        match self {
            #[cfg(feature = "nifti")]
            BackendImage::Nifti(image) => image.write(path, verbose),
            #[cfg(feature = "itk")]
            BackendImage::Itk(image) => image.write(path, verbose),
            #[cfg(feature = "raster")]
            BackendImage::Raster(image) => image.write(path, verbose),
        }
    }
}

/// Canonicalize `data`, move it into its target frame and wrap it for
/// `backend`.
///
/// `metadata` supplies the current `affine`, the `original_affine` to
/// resample into and the output `spatial_shape`; missing entries fall back
/// to identity and to the shape implied by the affines.
pub fn assemble(
    backend: WriterBackend,
    data: ArrayD<f64>,
    metadata: Option<&ImageMetadata>,
    config: &WriteConfig,
) -> Result<BackendImage> {
    let (original_affine, affine, spatial_shape) =
        metadata.map(ImageMetadata::parts).unwrap_or((None, None, None));

    let layout = ChannelLastConfig::default()
        .with_channel_dim(config.channel_dim)
        .with_squeeze_end_dims(false)
        .with_spatial_ndim(config.spatial_ndim);
    let data = to_channel_last(data, &layout)?;
    let full_ndim = data.ndim();
    let data = if config.squeeze_end_dims {
        squeeze_trailing(data)
    } else {
        data
    };
    // Squeezing may have removed a length-1 channel.
    let has_channel = config.channel_dim.is_some() && data.ndim() == full_ndim;
    tracing::debug!(?backend, shape = ?data.shape(), has_channel, "assembling image");

    match backend {
        #[cfg(feature = "nifti")]
        WriterBackend::Nifti => {
            let (pixels, affine) =
                to_target_frame(data, original_affine, affine, spatial_shape, config)?;
            Ok(BackendImage::Nifti(NiftiImage::new(pixels, &affine)?))
        }
        #[cfg(feature = "itk")]
        WriterBackend::Itk => {
            let (pixels, affine) =
                to_target_frame(data, original_affine, affine, spatial_shape, config)?;
            Ok(BackendImage::Itk(ItkImage::from_channel_last(
                pixels,
                &affine,
                has_channel,
            )?))
        }
        #[cfg(feature = "raster")]
        WriterBackend::Raster => {
            let target_shape = if config.resample { spatial_shape } else { None };
            let options = &config.raster;
            let mut pixels = resample_and_clip(data, target_shape, options.mode, options.scale)?;
            if let Some(dtype) = config.output_dtype {
                pixels = pixels.cast(dtype);
            }
            Ok(BackendImage::Raster(RasterImage::from_array(
                pixels,
                options.reverse_indexing,
                options.pixel_layout,
            )?))
        }
    }
}

#[cfg(any(feature = "nifti", feature = "itk"))]
fn to_target_frame(
    data: ArrayD<f64>,
    original_affine: Option<&imwrite_core::Affine>,
    affine: Option<&imwrite_core::Affine>,
    spatial_shape: Option<&[usize]>,
    config: &WriteConfig,
) -> Result<(TypedArray, imwrite_core::Affine)> {
    let target = if config.resample { original_affine } else { None };
    let (data, affine) = convert_to_target_affine(
        data,
        affine,
        target,
        spatial_shape,
        &config.resample_options,
    )?;
    let pixels = TypedArray::from_f64(data, config.output_dtype.unwrap_or(DType::F64));
    Ok((pixels, affine))
}
