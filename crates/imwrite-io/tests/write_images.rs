#![cfg(all(feature = "nifti", feature = "itk", feature = "raster"))]

use anyhow::Result;
use imwrite_core::{Affine, DType, GeometryError, ResampleOptions, ResizeMode, SamplingMode};
use imwrite_io::{
    assemble, BackendImage, FolderLayout, ImageMetadata, RasterOptions, WriteConfig, WriterBackend,
    WriterError,
};
use ndarray::{Array, ArrayD, IxDyn};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::fs;
use tempfile::tempdir;

fn arange(shape: &[usize]) -> ArrayD<f64> {
    let n: usize = shape.iter().product();
    Array::from_iter((0..n).map(|v| v as f64))
        .into_shape(IxDyn(shape))
        .unwrap()
}

#[test]
fn test_itk_size_drops_channel_axis() -> Result<()> {
    for c in 0..4isize {
        let config = WriteConfig::for_backend(WriterBackend::Itk)
            .with_channel_dim(Some(c))
            .with_squeeze_end_dims(false);
        let image = assemble(
            WriterBackend::Itk,
            ArrayD::zeros(IxDyn(&[1, 2, 3, 4])),
            Some(&ImageMetadata::new()),
            &config,
        )?;
        let BackendImage::Itk(image) = image else {
            panic!("expected an ITK image");
        };
        let mut expected = vec![1, 2, 3, 4];
        expected.remove(c as usize);
        assert_eq!(image.size(), expected.as_slice());
        assert!(image.is_vector());
    }
    Ok(())
}

#[test]
fn test_itk_geometry_is_lps() -> Result<()> {
    let metadata = ImageMetadata::new().with_affine(Affine::from_diagonal(&[1.4, 1.0, 1.0, 1.0]));
    let config = WriteConfig::for_backend(WriterBackend::Itk).with_channel_dim(None);
    let BackendImage::Itk(image) =
        assemble(WriterBackend::Itk, arange(&[3, 4, 5]), Some(&metadata), &config)?
    else {
        panic!("expected an ITK image");
    };
    assert!(!image.is_vector());
    let spacing = image.spacing();
    assert!((spacing[0] - 1.4).abs() < 1e-12);
    assert!((spacing[1] - 1.0).abs() < 1e-12);
    assert!((spacing[2] - 1.0).abs() < 1e-12);
    assert_eq!(image.direction()[(0, 0)], -1.0);
    assert_eq!(image.direction()[(1, 1)], -1.0);
    assert_eq!(image.direction()[(2, 2)], 1.0);
    Ok(())
}

#[test]
fn test_nifti_file_keeps_original_frame() -> Result<()> {
    let dir = tempdir()?;
    let path = FolderLayout::new(dir.path())
        .with_postfix("seg")
        .with_extension(".nii.gz")
        .filename("/data/case_01.nii.gz", None, &[])?;

    let original = Affine::from_rows(&[
        [-1.0, 0.0, 0.0, 3.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
    // The array was reoriented to RAS before processing.
    let data = arange(&[4, 2, 3]);
    let metadata = ImageMetadata::new()
        .with_affine(Affine::identity(3))
        .with_original_affine(original.clone());
    let config = WriteConfig::for_backend(WriterBackend::Nifti).with_channel_dim(None);
    let image = assemble(WriterBackend::Nifti, data.clone(), Some(&metadata), &config)?;
    image.write(&path, true)?;
    assert!(path.ends_with("case_01_seg.nii.gz"));

    let obj = ReaderOptions::new().read_file(&path)?;
    assert_eq!(obj.header().srow_x, [-1.0, 0.0, 0.0, 3.0]);
    let volume = obj.into_volume().into_ndarray::<f64>()?;
    assert_eq!(volume.shape(), &[4, 2, 3]);
    for i in 0..4 {
        assert_eq!(volume[[i, 1, 2]], data[IxDyn(&[3 - i, 1, 2])]);
    }
    Ok(())
}

#[test]
fn test_nifti_resampled_to_spatial_shape() -> Result<()> {
    let metadata = ImageMetadata::new()
        .with_affine(Affine::from_diagonal(&[2.0, 2.0, 2.0, 1.0]))
        .with_original_affine(Affine::from_diagonal(&[1.0, 1.0, 1.0, 1.0]))
        .with_spatial_shape([8, 8, 8]);
    let config = WriteConfig::for_backend(WriterBackend::Nifti)
        .with_output_dtype(Some(DType::I16))
        .with_resample_options(ResampleOptions::default().with_mode(SamplingMode::Nearest));
    let data = ArrayD::from_elem(IxDyn(&[1, 4, 4, 4]), 7.0);
    let BackendImage::Nifti(image) = assemble(WriterBackend::Nifti, data, Some(&metadata), &config)?
    else {
        panic!("expected a NIfTI image");
    };
    assert_eq!(image.data().shape(), &[8, 8, 8]);
    assert_eq!(image.data().dtype(), DType::I16);
    assert!(image.data().to_f64().iter().all(|&v| v == 7.0));
    assert_eq!(image.affine(), &Affine::from_diagonal(&[1.0, 1.0, 1.0, 1.0]));
    Ok(())
}

#[test]
fn test_no_resample_keeps_frame() -> Result<()> {
    let affine = Affine::from_diagonal(&[2.0, 2.0, 2.0, 1.0]);
    let metadata = ImageMetadata::new()
        .with_affine(affine.clone())
        .with_original_affine(Affine::identity(3));
    let config = WriteConfig::for_backend(WriterBackend::Nifti)
        .with_resample(false)
        .with_channel_dim(None);
    let BackendImage::Nifti(image) =
        assemble(WriterBackend::Nifti, arange(&[2, 3, 4]), Some(&metadata), &config)?
    else {
        panic!("expected a NIfTI image");
    };
    assert_eq!(image.affine(), &affine);
    assert_eq!(image.data().shape(), &[2, 3, 4]);
    Ok(())
}

#[test]
fn test_metaimage_files() -> Result<()> {
    let dir = tempdir()?;
    let config = WriteConfig::for_backend(WriterBackend::Itk).with_output_dtype(Some(DType::U8));
    let image = assemble(WriterBackend::Itk, arange(&[2, 3, 4]), None, &config)?;

    let mha = dir.path().join("image.mha");
    image.write(&mha, false)?;
    let bytes = fs::read(&mha)?;
    let text = String::from_utf8_lossy(&bytes);
    // [2, 3, 4] channel-first becomes 3x4x1 pixels with 2 components.
    assert!(text.contains("NDims = 3"));
    assert!(text.contains("DimSize = 3 4 1"));
    assert!(text.contains("ElementNumberOfChannels = 2"));
    assert!(text.contains("ElementType = MET_UCHAR"));
    assert!(text.contains("ElementDataFile = LOCAL"));

    let mhd = dir.path().join("image.mhd");
    image.write(&mhd, false)?;
    let raw = fs::read(dir.path().join("image.raw"))?;
    assert_eq!(raw.len(), 24);
    assert!(fs::read_to_string(&mhd)?.contains("ElementDataFile = image.raw"));
    Ok(())
}

#[test]
fn test_raster_png_resized() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("slice.png");
    let data = ArrayD::from_shape_fn(IxDyn(&[1, 8, 6]), |idx| idx[1] as f64 / 7.0);
    let metadata = ImageMetadata::new().with_spatial_shape([4, 3]);
    let config = WriteConfig::for_backend(WriterBackend::Raster)
        .with_raster(RasterOptions::default().with_mode(ResizeMode::Area));
    let assembled = assemble(WriterBackend::Raster, data, Some(&metadata), &config)?;
    assembled.write(&path, true)?;

    let loaded = image::open(&path)?.into_luma8();
    // Axis 0 is the image width.
    assert_eq!(loaded.dimensions(), (4, 3));
    let row: Vec<u8> = (0..4).map(|x| loaded.get_pixel(x, 0).0[0]).collect();
    assert!(row.windows(2).all(|w| w[0] < w[1]));
    Ok(())
}

#[test]
fn test_raster_rgb_without_resampling() -> Result<()> {
    let data = ArrayD::from_shape_fn(IxDyn(&[3, 5, 7]), |idx| idx[0] as f64 / 2.0);
    let metadata = ImageMetadata::new().with_spatial_shape([2, 2]);
    let config = WriteConfig::for_backend(WriterBackend::Raster).with_resample(false);
    let BackendImage::Raster(image) =
        assemble(WriterBackend::Raster, data, Some(&metadata), &config)?
    else {
        panic!("expected a raster image");
    };
    assert_eq!((image.width(), image.height()), (5, 7));
    let rgb = image.image().to_rgb8();
    assert_eq!(rgb.get_pixel(0, 0).0, [0, 128, 255]);
    Ok(())
}

#[test]
fn test_raster_rejects_unknown_scale() {
    let config = WriteConfig::for_backend(WriterBackend::Raster)
        .with_raster(RasterOptions::default().with_scale(Some(100)));
    let err = assemble(WriterBackend::Raster, ArrayD::zeros(IxDyn(&[1, 2, 2])), None, &config)
        .unwrap_err();
    assert!(matches!(
        err,
        WriterError::Geometry(GeometryError::InvalidConfiguration(_))
    ));
    assert!(err.to_string().contains("100"));
}
