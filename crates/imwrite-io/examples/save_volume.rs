//! Save a synthetic segmentation as NIfTI and MetaImage.
//!
//! A sphere is drawn on a 1.5 mm grid, then written back in a 1 mm frame
//! whose first axis is flipped.
//!
//! Usage:
//!   cargo run --example save_volume -- [output_dir]
//!   RUST_LOG=debug cargo run --example save_volume

use imwrite_core::{Affine, ResampleOptions, SamplingMode};
use imwrite_io::{assemble, FolderLayout, ImageMetadata, WriteConfig, WriterBackend};
use ndarray::{ArrayD, IxDyn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let output_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "output".to_string());

    // [C, X, Y, Z] label map.
    let n = 32usize;
    let center = (n as f64 - 1.0) / 2.0;
    let data = ArrayD::from_shape_fn(IxDyn(&[1, n, n, n]), |idx| {
        let d2: f64 = (1..4).map(|a| (idx[a] as f64 - center).powi(2)).sum();
        if d2.sqrt() < n as f64 / 3.0 {
            1.0
        } else {
            0.0
        }
    });

    let current = Affine::from_diagonal(&[1.5, 1.5, 1.5, 1.0]);
    let original = Affine::from_rows(&[
        [-1.0, 0.0, 0.0, 47.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
    let metadata = ImageMetadata::new()
        .with_affine(current)
        .with_original_affine(original);

    let layout = FolderLayout::new(&output_dir)
        .with_postfix("seg")
        .with_makedirs(true);

    for (backend, extension) in [(WriterBackend::Nifti, ".nii.gz"), (WriterBackend::Itk, ".mha")] {
        let config = WriteConfig::for_backend(backend)
            .with_resample_options(ResampleOptions::default().with_mode(SamplingMode::Nearest));
        let image = assemble(backend, data.clone(), Some(&metadata), &config)?;

        let path = layout
            .clone()
            .with_extension(extension)
            .filename("sphere", None, &[])?;
        image.write(&path, true)?;
        println!("{:?} -> {}", backend, path.display());
    }

    Ok(())
}
