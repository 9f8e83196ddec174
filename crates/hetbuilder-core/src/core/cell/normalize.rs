use crate::core::models::structure::{Structure, StructureError};
use crate::core::utils::geometry::{minimal_wrap_shift, plane_normal, rotation_to_align, wrap_fraction};
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// How atoms are placed along the stacking axis (axis 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Center of mass in the middle of a block-diagonal cell.
    #[default]
    Centered,
    /// Lowest atom at z = 0, cell unchanged.
    BottomAnchored,
}

impl Normalization {
    pub fn apply(self, structure: &Structure) -> Result<Structure, StructureError> {
        match self {
            Self::Centered => normalize_centered(structure),
            Self::BottomAnchored => normalize_bottom_anchored(structure),
        }
    }
}

/// Wrapped fractional coordinates: in-plane components are folded into
/// `[0, 1)`, the stacking component is shifted so that the largest vacuum gap
/// sits on the cell boundary.
fn wrapped_fractional(structure: &Structure) -> Result<Vec<Vector3<f64>>, StructureError> {
    let fractional = structure.fractional_positions()?;
    let stacking: Vec<f64> = fractional.iter().map(|f| f.z).collect();
    let shift = minimal_wrap_shift(&stacking);
    Ok(fractional
        .into_iter()
        .map(|f| {
            Vector3::new(
                wrap_fraction(f.x),
                wrap_fraction(f.y),
                wrap_fraction(f.z - shift),
            )
        })
        .collect())
}

/// Rotates the structure so the normal of the in-plane lattice vectors points
/// along +z. Structures that are already aligned are returned unchanged.
fn align_plane_with_xy(structure: &Structure) -> Result<Structure, StructureError> {
    let normal = plane_normal(&structure.lattice_vector(0), &structure.lattice_vector(1))
        .ok_or(StructureError::SingularCell {
            volume: structure.volume(),
        })?;
    if (normal.z - 1.0).abs() < 1e-12 {
        return Ok(structure.clone());
    }
    match rotation_to_align(&normal, &Vector3::z()) {
        Some(rotation) => Ok(structure.rotated(&rotation)),
        // Antiparallel normal: a half turn about x flips it onto +z.
        None => Ok(structure.rotated(&nalgebra::Rotation3::from_axis_angle(
            &Vector3::x_axis(),
            std::f64::consts::PI,
        ))),
    }
}

/// Points the third lattice vector above the plane of the first two. Atom
/// positions are unchanged, so a cell stored with its third vector along -z
/// keeps the stacking order of its atoms.
fn stacking_vector_up(structure: Structure) -> Structure {
    if structure.lattice_vector(2).z >= 0.0 {
        return structure;
    }
    let mut cell = *structure.cell();
    let flipped = cell.row(2) * -1.0;
    cell.set_row(2, &flipped);
    structure.with_cell(cell)
}

/// Centers a 2D structure along its stacking axis and makes the cell
/// block-diagonal.
///
/// Atoms are wrapped into the cell, centered geometrically along the stacking
/// direction, then shifted so their center of mass sits at half the stacking
/// length. The resulting cell is `(a_xy, b_xy, (0, 0, L))` where `L` is the
/// height of the original third vector above the plane. In-plane fractional
/// coordinates and atom order are preserved.
///
/// # Errors
///
/// Returns [`StructureError::SingularCell`] if the cell cannot be inverted.
pub fn normalize_centered(structure: &Structure) -> Result<Structure, StructureError> {
    let aligned = stacking_vector_up(align_plane_with_xy(structure)?);
    let fractional = wrapped_fractional(&aligned)?;
    let length = aligned.lattice_vector(2).z;

    let (lo, hi) = fractional
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
            (lo.min(f.z), hi.max(f.z))
        });
    let midpoint = if fractional.is_empty() { 0.5 } else { 0.5 * (lo + hi) };
    let mut heights: Vec<f64> = fractional
        .iter()
        .map(|f| (f.z - midpoint + 0.5) * length)
        .collect();

    let masses = aligned.masses();
    let total_mass: f64 = masses.iter().sum();
    if total_mass > 0.0 {
        let com = heights.iter().zip(&masses).map(|(h, m)| h * m).sum::<f64>() / total_mass;
        let offset = 0.5 * length - com;
        for h in heights.iter_mut() {
            *h += offset;
            if *h < 0.0 || *h >= length {
                *h = h.rem_euclid(length);
            }
        }
    }

    let a = aligned.lattice_vector(0);
    let b = aligned.lattice_vector(1);
    let cell = Matrix3::new(a.x, a.y, 0.0, b.x, b.y, 0.0, 0.0, 0.0, length);
    let positions = fractional
        .iter()
        .zip(&heights)
        .map(|(f, &h)| {
            Point3::new(
                f.x * cell[(0, 0)] + f.y * cell[(1, 0)],
                f.x * cell[(0, 1)] + f.y * cell[(1, 1)],
                h,
            )
        })
        .collect();
    Ok(aligned.with_cell(cell).with_positions(positions))
}

/// Wraps atoms into the cell and shifts them along z so the lowest atom sits at
/// exactly zero. The cell is unchanged.
///
/// # Errors
///
/// Returns [`StructureError::SingularCell`] if the cell cannot be inverted.
pub fn normalize_bottom_anchored(structure: &Structure) -> Result<Structure, StructureError> {
    let fractional = wrapped_fractional(structure)?;
    let cell_t = structure.cell().transpose();
    let wrapped: Vec<Point3<f64>> = fractional.iter().map(|f| Point3::from(cell_t * f)).collect();
    let min_z = wrapped.iter().map(|p| p.z).fold(f64::INFINITY, f64::min);
    let shift = if min_z.is_finite() { -min_z } else { 0.0 };
    Ok(structure.with_positions(
        wrapped
            .into_iter()
            .map(|p| Point3::new(p.x, p.y, p.z + shift))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn split_layer() -> Structure {
        // Oblique in-plane cell with a tilted third vector; the layer straddles
        // the stacking boundary.
        Structure::new(
            Matrix3::new(3.0, 0.0, 0.0, 1.5, 2.6, 0.0, 0.5, 0.3, 20.0),
            vec!["Mo".into(), "S".into(), "S".into()],
            vec![
                Point3::new(0.1, 0.2, 0.5),
                Point3::new(1.6, 1.0, 2.0),
                Point3::new(2.0, 1.4, 19.0),
            ],
            [true, true, false],
        )
        .unwrap()
    }

    fn in_plane_fractions(s: &Structure) -> Vec<(f64, f64)> {
        s.fractional_positions()
            .unwrap()
            .iter()
            .map(|f| (wrap_fraction(f.x), wrap_fraction(f.y)))
            .collect()
    }

    #[test]
    fn normalize_centered_produces_block_diagonal_cell() {
        let n = normalize_centered(&split_layer()).unwrap();
        let cell = n.cell();
        assert_eq!(cell[(0, 2)], 0.0);
        assert_eq!(cell[(1, 2)], 0.0);
        assert_eq!(cell[(2, 0)], 0.0);
        assert_eq!(cell[(2, 1)], 0.0);
        assert!(f64_approx_equal(cell[(2, 2)], 20.0));
    }

    #[test]
    fn normalize_centered_puts_center_of_mass_in_the_middle() {
        let n = normalize_centered(&split_layer()).unwrap();
        let com = n.center_of_mass().unwrap();
        assert!(f64_approx_equal(com.z, 10.0));
        let (lo, hi) = n.z_extent().unwrap();
        assert!(lo > 0.0 && hi < 20.0);
        assert!(hi - lo < 5.0);
    }

    #[test]
    fn normalize_centered_preserves_in_plane_fractions_and_order() {
        let s = split_layer();
        let n = normalize_centered(&s).unwrap();
        assert_eq!(n.species(), s.species());
        let before = s.fractional_positions().unwrap();
        let after = n.fractional_positions().unwrap();
        for (b, a) in before.iter().zip(&after) {
            assert!(f64_approx_equal(wrap_fraction(b.x), a.x));
            assert!(f64_approx_equal(wrap_fraction(b.y), a.y));
        }
    }

    #[test]
    fn normalize_centered_is_idempotent() {
        let once = normalize_centered(&split_layer()).unwrap();
        let twice = normalize_centered(&once).unwrap();
        for (p, q) in once.positions().iter().zip(twice.positions()) {
            assert!((p - q).norm() < TOLERANCE);
        }
        for (a, b) in in_plane_fractions(&once).iter().zip(in_plane_fractions(&twice)) {
            assert!(f64_approx_equal(a.0, b.0));
            assert!(f64_approx_equal(a.1, b.1));
        }
    }

    #[test]
    fn normalize_centered_aligns_tilted_planes() {
        let s = split_layer().rotated(&nalgebra::Rotation3::from_axis_angle(
            &Vector3::x_axis(),
            0.4,
        ));
        let n = normalize_centered(&s).unwrap();
        assert!(n.cell()[(0, 2)].abs() < 1e-12);
        assert!(f64_approx_equal(n.lattice_vector(0).norm(), 3.0));
    }

    #[test]
    fn normalize_centered_keeps_stacking_order_of_downward_cell() {
        let layer = Structure::new(
            Matrix3::new(3.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, -25.0),
            vec!["S".into(), "Se".into()],
            vec![Point3::new(0.0, 0.0, -11.5), Point3::new(1.5, 1.5, -8.5)],
            [true, true, false],
        )
        .unwrap();
        let n = normalize_centered(&layer).unwrap();
        assert!(f64_approx_equal(n.cell()[(2, 2)], 25.0));
        let (s, se) = (n.positions()[0], n.positions()[1]);
        assert!(se.z > s.z);
        assert!(f64_approx_equal(se.z - s.z, 3.0));
        assert!(f64_approx_equal(se.x, 1.5));
    }

    #[test]
    fn normalize_bottom_anchored_moves_lowest_atom_to_zero() {
        let s = split_layer();
        let n = normalize_bottom_anchored(&s).unwrap();
        let (lo, hi) = n.z_extent().unwrap();
        assert!(f64_approx_equal(lo, 0.0));
        assert!(hi < 5.0);
        assert_eq!(n.cell(), s.cell());
    }

    #[test]
    fn normalization_apply_dispatches_on_variant() {
        let s = split_layer();
        let centered = Normalization::Centered.apply(&s).unwrap();
        let anchored = Normalization::BottomAnchored.apply(&s).unwrap();
        assert!(f64_approx_equal(centered.center_of_mass().unwrap().z, 10.0));
        assert!(f64_approx_equal(anchored.z_extent().unwrap().0, 0.0));
    }
}
