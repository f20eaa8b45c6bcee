//! Medical toolkit (ITK-style) images and MetaImage output.
//!
//! ITK describes geometry in LPS space with explicit spacing, origin and a
//! direction cosine matrix instead of a single affine. Pixels are stored with
//! the first index varying fastest and vector components interleaved.

use crate::error::{Result, WriterError};
use imwrite_core::{pad_to_rank, Affine, DType, TypedArray};
use nalgebra::DMatrix;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Convert an affine between RAS and LPS by negating its first two rows.
///
/// A matrix with a single spatial row (`rows <= 2`) only has row 0 negated.
/// Rows past the second spatial axis are left alone. Non-square matrices
/// are accepted.
pub fn ras_to_lps(affine: &Affine) -> Affine {
    let sr = affine.nrows().saturating_sub(1).max(1);
    let mut out = affine.clone();
    for r in 0..sr.min(2).min(out.nrows()) {
        for c in 0..out.ncols() {
            out[(r, c)] = -out[(r, c)];
        }
    }
    out
}

/// Image in ITK geometry conventions.
#[derive(Debug, Clone, PartialEq)]
pub struct ItkImage {
    /// Channel-last pixels indexed `[i, j, k, (component)]`.
    pixels: TypedArray,
    is_vector: bool,
    spacing: Vec<f64>,
    origin: Vec<f64>,
    direction: DMatrix<f64>,
}

impl ItkImage {
    /// Build an image from a channel-last array and its RAS affine.
    ///
    /// When `is_vector` is set the last axis holds pixel components and the
    /// image dimension is `ndim - 1`.
    pub fn from_channel_last(pixels: TypedArray, affine: &Affine, is_vector: bool) -> Result<Self> {
        let d = pixels.ndim().saturating_sub(usize::from(is_vector));
        if d == 0 {
            return Err(WriterError::unsupported_layout(format!(
                "image needs at least one spatial axis, got shape {:?}",
                pixels.shape()
            )));
        }
        let lps = ras_to_lps(&pad_to_rank(affine, d)?);

        let spacing: Vec<f64> = (0..d)
            .map(|c| {
                let norm = (0..d).map(|r| lps[(r, c)].powi(2)).sum::<f64>().sqrt();
                if norm == 0.0 {
                    1.0
                } else {
                    norm
                }
            })
            .collect();
        let direction = DMatrix::from_fn(d, d, |r, c| lps[(r, c)] / spacing[c]);
        let origin = (0..d).map(|r| lps[(r, d)]).collect();

        Ok(Self {
            pixels,
            is_vector,
            spacing,
            origin,
            direction,
        })
    }

    /// Image dimension.
    pub fn dimension(&self) -> usize {
        self.spacing.len()
    }

    /// Number of pixels along each image axis.
    pub fn size(&self) -> &[usize] {
        &self.pixels.shape()[..self.dimension()]
    }

    /// Number of components per pixel.
    pub fn components(&self) -> usize {
        if self.is_vector {
            self.pixels.shape()[self.dimension()]
        } else {
            1
        }
    }

    pub fn is_vector(&self) -> bool {
        self.is_vector
    }

    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    pub fn origin(&self) -> &[f64] {
        &self.origin
    }

    pub fn direction(&self) -> &DMatrix<f64> {
        &self.direction
    }

    pub fn pixels(&self) -> &TypedArray {
        &self.pixels
    }

    /// Pixel buffer in ITK memory order: components fastest, then the first
    /// image axis.
    pub fn pixel_bytes(&self) -> Vec<u8> {
        let d = self.dimension();
        let mut perm: Vec<usize> = (0..d).rev().collect();
        if self.is_vector {
            perm.push(d);
        }
        self.pixels.clone().permuted(&perm).to_le_bytes()
    }

    /// MetaImage header text. `data_file` is `LOCAL` for `.mha` files or the
    /// name of the raw file for `.mhd` files.
    pub fn metaimage_header(&self, data_file: &str) -> String {
        let d = self.dimension();
        // Direction columns, one after another.
        let matrix = (0..d).flat_map(|c| (0..d).map(move |r| (r, c)));

        let mut header = String::new();
        let _ = writeln!(header, "ObjectType = Image");
        let _ = writeln!(header, "NDims = {d}");
        let _ = writeln!(header, "BinaryData = True");
        let _ = writeln!(header, "BinaryDataByteOrderMSB = False");
        let _ = writeln!(header, "CompressedData = False");
        let _ = writeln!(
            header,
            "TransformMatrix = {}",
            join(matrix.map(|(r, c)| format_value(self.direction[(r, c)])))
        );
        let _ = writeln!(header, "Offset = {}", join(self.origin.iter().map(|v| format_value(*v))));
        let _ = writeln!(
            header,
            "ElementSpacing = {}",
            join(self.spacing.iter().map(|v| format_value(*v)))
        );
        let _ = writeln!(header, "DimSize = {}", join(self.size().iter().map(usize::to_string)));
        if self.is_vector {
            let _ = writeln!(header, "ElementNumberOfChannels = {}", self.components());
        }
        let _ = writeln!(header, "ElementType = {}", met_element_type(self.pixels.dtype()));
        let _ = writeln!(header, "ElementDataFile = {data_file}");
        header
    }

    /// Write a MetaImage file. `.mhd` paths get a sibling `.raw` data file;
    /// any other extension embeds the pixels after the header.
    pub fn write<P: AsRef<Path>>(&self, path: P, verbose: bool) -> Result<()> {
        let path = path.as_ref();
        if verbose {
            tracing::info!("writing: {}", path.display());
        }

        let detached = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mhd"));
        if detached {
            let raw_path = path.with_extension("raw");
            let raw_name = raw_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image.raw".to_string());
            fs::write(path, self.metaimage_header(&raw_name))?;
            fs::write(&raw_path, self.pixel_bytes())?;
        } else {
            let mut file = fs::File::create(path)?;
            file.write_all(self.metaimage_header("LOCAL").as_bytes())?;
            file.write_all(&self.pixel_bytes())?;
        }
        Ok(())
    }
}

fn join(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<_>>().join(" ")
}

fn format_value(v: f64) -> String {
    // Avoid "-0" in headers.
    if v == 0.0 {
        "0".to_string()
    } else {
        v.to_string()
    }
}

fn met_element_type(dtype: DType) -> &'static str {
    match dtype {
        DType::U8 => "MET_UCHAR",
        DType::U16 => "MET_USHORT",
        DType::I16 => "MET_SHORT",
        DType::I32 => "MET_INT",
        DType::F32 => "MET_FLOAT",
        DType::F64 => "MET_DOUBLE",
    }
}
