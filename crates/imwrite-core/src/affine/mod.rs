//! Homogeneous affine matrices and rank normalization.
//!
//! An [`Affine`] of size `(d+1)×(d+1)` maps array indices to physical
//! coordinates: the top-left `d×d` block is the linear part and the last
//! column (minus the last row) is the translation.

pub mod orientation;
pub mod shape;

pub use orientation::{
    apply_orientation, inverse_orientation_affine, orientation_of, orientation_transform,
    AxisOrientation, Orientation, Reorientation,
};
pub use shape::shape_and_offset_from_affines;

use crate::error::{GeometryError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Absolute per-entry tolerance used when comparing affines.
pub const AFFINE_TOL: f64 = 1e-3;

/// Homogeneous affine matrix.
///
/// This is a thin wrapper around nalgebra's `DMatrix` so that affines of
/// different ranks can flow through the same code paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affine(pub DMatrix<f64>);

impl Affine {
    /// Identity affine for `rank` spatial dimensions.
    pub fn identity(rank: usize) -> Self {
        Self(DMatrix::identity(rank + 1, rank + 1))
    }

    /// Wrap an existing matrix.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Self {
        Self(matrix)
    }

    /// Build an affine from rows of equal length.
    ///
    /// Non-square inputs are accepted here; operations that require a
    /// square matrix report [`GeometryError::MalformedAffine`].
    pub fn from_rows<const C: usize>(rows: &[[f64; C]]) -> Self {
        Self(DMatrix::from_fn(rows.len(), C, |r, c| rows[r][c]))
    }

    /// Diagonal matrix, e.g. `[1.4, 1.0, 1.0, 1.0]` for a 3-D scaling.
    pub fn from_diagonal(diagonal: &[f64]) -> Self {
        Self(DMatrix::from_diagonal(&DVector::from_column_slice(diagonal)))
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.0.ncols()
    }

    /// Spatial rank (`rows - 1`, zero for a 1×1 scale).
    pub fn rank(&self) -> usize {
        self.0.nrows().saturating_sub(1)
    }

    /// Whether the matrix is square.
    pub fn is_square(&self) -> bool {
        self.0.is_square()
    }

    /// Get the inner nalgebra matrix.
    pub fn inner(&self) -> &DMatrix<f64> {
        &self.0
    }

    /// Consume the wrapper and return the nalgebra matrix.
    pub fn into_inner(self) -> DMatrix<f64> {
        self.0
    }

    /// Top-left `rank×rank` block.
    pub fn linear_part(&self) -> DMatrix<f64> {
        let d = self.rank().min(self.ncols().saturating_sub(1));
        DMatrix::from_fn(d, d, |r, c| self.0[(r, c)])
    }

    /// Translation column without the homogeneous entry.
    pub fn translation(&self) -> Vec<f64> {
        let last = self.ncols().saturating_sub(1);
        (0..self.rank()).map(|r| self.0[(r, last)]).collect()
    }

    /// Invert the matrix.
    pub fn try_inverse(&self) -> Result<Self> {
        if !self.is_square() {
            return Err(GeometryError::malformed_affine(format!(
                "cannot invert a {}x{} matrix",
                self.nrows(),
                self.ncols()
            )));
        }
        self.0
            .clone()
            .try_inverse()
            .map(Self)
            .ok_or_else(|| GeometryError::singular(format!("affine {} is not invertible", self.0)))
    }

    /// Pad or truncate to `rank` spatial dimensions. See [`pad_to_rank`].
    pub fn to_rank(&self, rank: usize) -> Result<Self> {
        pad_to_rank(self, rank)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity(3)
    }
}

impl std::ops::Index<(usize, usize)> for Affine {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::IndexMut<(usize, usize)> for Affine {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl std::ops::Mul for &Affine {
    type Output = Affine;

    fn mul(self, other: Self) -> Self::Output {
        Affine(&self.0 * &other.0)
    }
}

impl std::ops::Mul for Affine {
    type Output = Affine;

    fn mul(self, other: Self) -> Self::Output {
        Affine(self.0 * other.0)
    }
}

/// Expand or truncate `affine` to a `(rank+1)×(rank+1)` homogeneous affine.
///
/// The overlapping linear block is copied into the top-left corner and the
/// remaining diagonal is filled with ones. The translation column is carried
/// over whenever the input is homogeneous (at least 2×2); a 1×1 input is
/// treated as a pure scale along the first axis.
pub fn pad_to_rank(affine: &Affine, rank: usize) -> Result<Affine> {
    if rank == 0 {
        return Err(GeometryError::invalid_configuration(
            "target affine rank must be at least 1",
        ));
    }
    if affine.nrows() == 0 || !affine.is_square() {
        return Err(GeometryError::malformed_affine(format!(
            "expected a square matrix, got {}x{}",
            affine.nrows(),
            affine.ncols()
        )));
    }

    let src = affine.inner();
    let src_rank = affine.rank();
    let d = rank.min(src_rank).max(1);

    let mut out = DMatrix::<f64>::identity(rank + 1, rank + 1);
    for r in 0..d {
        for c in 0..d {
            out[(r, c)] = src[(r, c)];
        }
    }
    if src_rank > 0 {
        for r in 0..d {
            out[(r, rank)] = src[(r, src_rank)];
        }
    }
    Ok(Affine(out))
}

/// Expand any affine to the 4×4 form consumed by volumetric backends.
pub fn ensure_mat44(affine: &Affine) -> Result<Affine> {
    pad_to_rank(affine, 3)
}

/// `true` iff both matrices have the same size and every entry differs by at
/// most `tol`.
pub fn affines_equal(a: &Affine, b: &Affine, tol: f64) -> bool {
    a.nrows() == b.nrows()
        && a.ncols() == b.ncols()
        && a.0.iter().zip(b.0.iter()).all(|(x, y)| (x - y).abs() <= tol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let a = Affine::identity(3);
        assert_eq!(a.nrows(), 4);
        assert_eq!(a.rank(), 3);
        assert_eq!(a[(2, 2)], 1.0);
        assert_eq!(a[(0, 3)], 0.0);
    }

    #[test]
    fn test_pad_scalar_scale() {
        let a = Affine::from_diagonal(&[1.4]);
        let padded = pad_to_rank(&a, 2).unwrap();
        assert_eq!(padded, Affine::from_diagonal(&[1.4, 1.0, 1.0]));
    }

    #[test]
    fn test_pad_keeps_translation() {
        let a = Affine::from_rows(&[[2.0, 0.0, 5.0], [0.0, 3.0, -1.0], [0.0, 0.0, 1.0]]);
        let padded = pad_to_rank(&a, 3).unwrap();
        let expected = Affine::from_rows(&[
            [2.0, 0.0, 0.0, 5.0],
            [0.0, 3.0, 0.0, -1.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(padded, expected);
    }

    #[test]
    fn test_truncate_larger_affine() {
        let a = Affine::from_diagonal(&[1.4, 2.0, 1.0, 3.0, 1.0]);
        let truncated = pad_to_rank(&a, 2).unwrap();
        assert_eq!(truncated, Affine::from_diagonal(&[1.4, 2.0, 1.0]));

        let mut with_shift = Affine::identity(3);
        with_shift[(0, 3)] = 7.0;
        with_shift[(2, 3)] = 9.0;
        let truncated = pad_to_rank(&with_shift, 1).unwrap();
        assert_eq!(truncated, Affine::from_rows(&[[1.0, 7.0], [0.0, 1.0]]));
    }

    #[test]
    fn test_pad_rejects_non_square() {
        let a = Affine::from_rows(&[[1.0, 0.0, 1.0], [1.0, 1.0, 1.0]]);
        assert!(matches!(
            pad_to_rank(&a, 2),
            Err(GeometryError::MalformedAffine(_))
        ));
        assert!(pad_to_rank(&Affine::identity(2), 0).is_err());
    }

    #[test]
    fn test_affines_equal_tolerance() {
        let a = Affine::identity(2);
        let mut b = Affine::identity(2);
        b[(0, 2)] = 5e-4;
        assert!(affines_equal(&a, &b, AFFINE_TOL));
        b[(0, 2)] = 2e-3;
        assert!(!affines_equal(&a, &b, AFFINE_TOL));
        assert!(!affines_equal(&a, &Affine::identity(3), AFFINE_TOL));
    }

    #[test]
    fn test_singular_inverse() {
        let a = Affine::from_diagonal(&[1.0, 0.0, 1.0]);
        assert!(matches!(a.try_inverse(), Err(GeometryError::SingularMatrix(_))));
    }

    #[test]
    fn test_linear_part_and_translation() {
        let a = Affine::from_rows(&[[2.0, 0.0, 5.0], [0.0, 3.0, -1.0], [0.0, 0.0, 1.0]]);
        assert_eq!(a.linear_part(), DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 3.0]));
        assert_eq!(a.translation(), vec![5.0, -1.0]);
    }
}
