//! Backend images for writing canonicalized arrays to disk.
//!
//! [`assemble`] turns a raw array plus [`ImageMetadata`] into a
//! [`BackendImage`]:
//! - NIfTI volumes (feature `nifti`);
//! - MetaImage files in LPS coordinates (feature `itk`);
//! - 2-D raster images through the `image` crate (feature `raster`).
//!
//! [`FolderLayout`] builds output filenames.

pub mod error;
pub mod folder_layout;
pub mod metadata;

#[cfg(any(feature = "nifti", feature = "itk", feature = "raster"))]
pub mod assembler;
#[cfg(feature = "itk")]
pub mod itk_io;
#[cfg(feature = "nifti")]
pub mod nifti_io;
#[cfg(feature = "raster")]
pub mod raster_io;

#[cfg(any(feature = "nifti", feature = "itk", feature = "raster"))]
pub use assembler::{assemble, BackendImage, WriteConfig, WriterBackend};
pub use error::{Result, WriterError};
pub use folder_layout::{create_file_basename, FolderLayout};
#[cfg(feature = "itk")]
pub use itk_io::{ras_to_lps, ItkImage};
pub use metadata::ImageMetadata;
#[cfg(feature = "nifti")]
pub use nifti_io::NiftiImage;
#[cfg(feature = "raster")]
pub use raster_io::{resample_and_clip, PixelLayout, RasterImage, RasterOptions};
