//! Axis orientation codes derived from affines.
//!
//! An [`Orientation`] records, for every input (array) axis, which output
//! (world) axis it is closest to and whether it runs in the opposite
//! direction. Two orientations can be related by a [`Reorientation`], a pure
//! permutation plus flips that can be applied to an array without
//! interpolation.

use super::Affine;
use crate::error::{GeometryError, Result};
use nalgebra::DMatrix;
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Columns whose entries all fall below this magnitude have no orientation.
const UNDETERMINED_TOL: f64 = 1e-8;

/// Output axis and direction for one input axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisOrientation {
    pub axis: usize,
    pub flipped: bool,
}

impl AxisOrientation {
    pub fn new(axis: usize, flipped: bool) -> Self {
        Self { axis, flipped }
    }
}

/// Orientation of every input axis; `None` marks an axis whose direction
/// cannot be determined (rank-deficient linear block).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation(pub Vec<Option<AxisOrientation>>);

impl Orientation {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` when every axis has a determined orientation.
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }
}

/// Permutation plus flips taking one orientation to another.
///
/// Entry `i` says that input axis `i` becomes axis `axis` of the result and
/// is reversed when `flipped` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reorientation(pub Vec<AxisOrientation>);

impl Reorientation {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// No permutation and no flips.
    pub fn is_identity(&self) -> bool {
        self.0
            .iter()
            .enumerate()
            .all(|(i, code)| code.axis == i && !code.flipped)
    }
}

/// Compute the orientation of each input axis of `affine`.
///
/// The linear block is column-normalized, replaced by its polar factor
/// (`U Vᵀ` from the SVD, skipping negligible singular values) and then each
/// input axis greedily claims the output axis with the largest absolute
/// entry. A claimed output axis is unavailable to later input axes.
pub fn orientation_of(affine: &Affine) -> Result<Orientation> {
    let m = affine.inner();
    if m.nrows() < 2 || m.ncols() < 2 {
        return Err(GeometryError::malformed_affine(format!(
            "affine needs at least one spatial axis, got {}x{}",
            m.nrows(),
            m.ncols()
        )));
    }
    let q = m.nrows() - 1;
    let p = m.ncols() - 1;

    let mut rs = DMatrix::<f64>::zeros(q, p);
    for c in 0..p {
        let mut norm = (0..q).map(|r| m[(r, c)].powi(2)).sum::<f64>().sqrt();
        if norm == 0.0 {
            norm = 1.0;
        }
        for r in 0..q {
            rs[(r, c)] = m[(r, c)] / norm;
        }
    }
    if rs.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::malformed_affine(
            "affine contains non-finite entries",
        ));
    }

    let svd = rs.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| GeometryError::orientation("SVD did not produce U"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| GeometryError::orientation("SVD did not produce Vᵀ"))?;
    let singular = &svd.singular_values;
    let s_max = singular.iter().cloned().fold(0.0_f64, f64::max);
    let tol = s_max * q.max(p) as f64 * f64::EPSILON;

    let mut polar = DMatrix::<f64>::zeros(q, p);
    for (k, s) in singular.iter().enumerate() {
        if *s <= tol {
            continue;
        }
        for i in 0..q {
            for j in 0..p {
                polar[(i, j)] += u[(i, k)] * v_t[(k, j)];
            }
        }
    }

    let mut codes = Vec::with_capacity(p);
    for in_ax in 0..p {
        let column: Vec<f64> = (0..q).map(|i| polar[(i, in_ax)]).collect();
        if column.iter().all(|v| v.abs() <= UNDETERMINED_TOL) {
            codes.push(None);
            continue;
        }
        let (out_ax, value) = column
            .iter()
            .enumerate()
            .fold((0, 0.0_f64), |best, (i, v)| {
                if v.abs() > best.1.abs() {
                    (i, *v)
                } else {
                    best
                }
            });
        codes.push(Some(AxisOrientation::new(out_ax, value < 0.0)));
        for j in 0..p {
            polar[(out_ax, j)] = 0.0;
        }
    }

    Ok(Orientation(codes))
}

/// Find the reorientation that takes arrays in `start` orientation to `end`.
pub fn orientation_transform(start: &Orientation, end: &Orientation) -> Result<Reorientation> {
    if start.len() != end.len() {
        return Err(GeometryError::orientation(format!(
            "orientations have different lengths: {} vs {}",
            start.len(),
            end.len()
        )));
    }

    let mut result: Vec<Option<AxisOrientation>> = vec![None; start.len()];
    for (end_in, end_code) in end.0.iter().enumerate() {
        let end_code = end_code.ok_or_else(|| {
            GeometryError::orientation(format!("axis {end_in} of the target is undetermined"))
        })?;
        let (start_in, start_code) = start
            .0
            .iter()
            .enumerate()
            .find_map(|(i, code)| match code {
                Some(code) if code.axis == end_code.axis => Some((i, *code)),
                _ => None,
            })
            .ok_or_else(|| {
                GeometryError::orientation(format!(
                    "unable to find output axis {} in start orientation",
                    end_code.axis
                ))
            })?;
        result[start_in] = Some(AxisOrientation::new(
            end_in,
            start_code.flipped != end_code.flipped,
        ));
    }

    let codes = result
        .into_iter()
        .enumerate()
        .map(|(i, code)| {
            code.ok_or_else(|| {
                GeometryError::orientation(format!(
                    "input axis {i} has no counterpart in the target orientation"
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Reorientation(codes))
}

/// Flip and permute the leading axes of `data` according to `xform`.
///
/// Axes beyond `xform.len()` keep their position.
pub fn apply_orientation<A>(data: ArrayD<A>, xform: &Reorientation) -> Result<ArrayD<A>> {
    let n = xform.len();
    if data.ndim() < n {
        return Err(GeometryError::dimension_mismatch(format!(
            "array of rank {} has fewer dimensions than the orientation ({n})",
            data.ndim()
        )));
    }

    let mut data = data;
    for (ax, code) in xform.0.iter().enumerate() {
        if code.flipped {
            data.invert_axis(Axis(ax));
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| xform.0[i].axis);
    let perm: Vec<usize> = order.into_iter().chain(n..data.ndim()).collect();
    Ok(data.permuted_axes(IxDyn(&perm)))
}

/// Affine taking voxel coordinates of the reoriented array back to voxel
/// coordinates of the array before [`apply_orientation`].
///
/// `shape` is the shape of the array before reorientation; only its first
/// `xform.len()` entries are used.
pub fn inverse_orientation_affine(xform: &Reorientation, shape: &[usize]) -> Result<Affine> {
    let p = xform.len();
    if shape.len() < p {
        return Err(GeometryError::dimension_mismatch(format!(
            "shape {shape:?} has fewer entries than the orientation ({p})"
        )));
    }

    let mut undo_reorder = DMatrix::<f64>::zeros(p + 1, p + 1);
    let mut undo_flip = DMatrix::<f64>::identity(p + 1, p + 1);
    for (i, code) in xform.0.iter().enumerate() {
        undo_reorder[(i, code.axis)] = 1.0;
        let sign = if code.flipped { -1.0 } else { 1.0 };
        let center = -(shape[i] as f64 - 1.0) / 2.0;
        undo_flip[(i, i)] = sign;
        undo_flip[(i, p)] = sign * center - center;
    }
    undo_reorder[(p, p)] = 1.0;

    Ok(Affine(undo_flip * undo_reorder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn codes(pairs: &[(usize, bool)]) -> Orientation {
        Orientation(
            pairs
                .iter()
                .map(|&(axis, flipped)| Some(AxisOrientation::new(axis, flipped)))
                .collect(),
        )
    }

    #[test]
    fn test_identity_orientation() {
        let ornt = orientation_of(&Affine::identity(3)).unwrap();
        assert_eq!(ornt, codes(&[(0, false), (1, false), (2, false)]));
    }

    #[test]
    fn test_scaled_flipped_orientation() {
        let a = Affine::from_diagonal(&[-2.0, 3.0, 0.5, 1.0]);
        let ornt = orientation_of(&a).unwrap();
        assert_eq!(ornt, codes(&[(0, true), (1, false), (2, false)]));
    }

    #[test]
    fn test_permuted_orientation() {
        let a = Affine::from_rows(&[
            [0.0, 0.0, 1.0, 0.0],
            [-1.0, 0.0, 0.0, 0.0],
            [0.0, 2.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let ornt = orientation_of(&a).unwrap();
        assert_eq!(ornt, codes(&[(1, true), (2, false), (0, false)]));
    }

    #[test]
    fn test_oblique_orientation_picks_dominant_axis() {
        let a = Affine::from_rows(&[[0.9, 0.1, 0.0], [-0.1, 0.9, 0.0], [0.0, 0.0, 1.0]]);
        let ornt = orientation_of(&a).unwrap();
        assert_eq!(ornt, codes(&[(0, false), (1, false)]));
    }

    #[test]
    fn test_undetermined_axis() {
        let a = Affine::from_diagonal(&[1.0, 0.0, 1.0]);
        let ornt = orientation_of(&a).unwrap();
        assert_eq!(ornt.0[0], Some(AxisOrientation::new(0, false)));
        assert_eq!(ornt.0[1], None);
        assert!(!ornt.is_complete());
    }

    #[test]
    fn test_transform_between_orientations() {
        let start = codes(&[(1, true), (0, false)]);
        let end = codes(&[(0, false), (1, false)]);
        let xform = orientation_transform(&start, &end).unwrap();
        assert_eq!(
            xform,
            Reorientation(vec![AxisOrientation::new(1, true), AxisOrientation::new(0, false)])
        );
        assert!(orientation_transform(&end, &end).unwrap().is_identity());
    }

    #[test]
    fn test_transform_missing_axis_fails() {
        let start = Orientation(vec![Some(AxisOrientation::new(0, false)), None]);
        let end = codes(&[(0, false), (1, false)]);
        assert!(matches!(
            orientation_transform(&start, &end),
            Err(GeometryError::OrientationError(_))
        ));
    }

    #[test]
    fn test_apply_flip_and_transpose() {
        let data = array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]].into_dyn();
        let flip = Reorientation(vec![AxisOrientation::new(0, true), AxisOrientation::new(1, false)]);
        let flipped = apply_orientation(data.clone(), &flip).unwrap();
        assert_eq!(flipped, array![[3.0, 4.0, 5.0], [0.0, 1.0, 2.0]].into_dyn());

        let swap = Reorientation(vec![AxisOrientation::new(1, false), AxisOrientation::new(0, false)]);
        let swapped = apply_orientation(data.clone(), &swap).unwrap();
        assert_eq!(swapped, data.t().to_owned());
    }

    #[test]
    fn test_apply_keeps_trailing_axes() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
        let swap = Reorientation(vec![AxisOrientation::new(1, false), AxisOrientation::new(0, false)]);
        let out = apply_orientation(data, &swap).unwrap();
        assert_eq!(out.shape(), &[3, 2, 4]);
    }

    #[test]
    fn test_apply_rejects_short_array() {
        let data = ArrayD::<f64>::zeros(IxDyn(&[4]));
        let xform = Reorientation(vec![AxisOrientation::new(0, false), AxisOrientation::new(1, false)]);
        assert!(apply_orientation(data, &xform).is_err());
    }

    #[test]
    fn test_inverse_affine_of_flip() {
        let xform = Reorientation(vec![AxisOrientation::new(0, true), AxisOrientation::new(1, false)]);
        let inv = inverse_orientation_affine(&xform, &[5, 3]).unwrap();
        let expected = Affine::from_rows(&[[-1.0, 0.0, 4.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(inv, expected);
    }

    #[test]
    fn test_reorientation_matches_target_affine() {
        // Flipping axis 0 of a [-1, 1] scaled image realigns it with identity.
        let affine = Affine::from_rows(&[[-1.0, 0.0, 4.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let target = Affine::identity(2);
        let xform = orientation_transform(
            &orientation_of(&affine).unwrap(),
            &orientation_of(&target).unwrap(),
        )
        .unwrap();
        let updated = &affine * &inverse_orientation_affine(&xform, &[5, 3]).unwrap();
        assert!(super::super::affines_equal(&updated, &target, super::super::AFFINE_TOL));
    }
}
