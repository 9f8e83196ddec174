use crate::core::models::structure::Structure;
use crate::core::utils::geometry::plane_normal;
use nalgebra::{Matrix3, Point3, Vector3};

/// Length added on top of the atomic thickness when a missing stacking vector
/// has to be filled in.
pub const PLACEHOLDER_PADDING: f64 = 20.0;

/// Reorders the lattice vectors and Cartesian axes so that new axis `i` is the
/// old axis `order[i]`. Positions are permuted alongside, so fractional
/// coordinates are permuted the same way.
pub fn permute_axes(structure: &Structure, order: [usize; 3]) -> Structure {
    let old = structure.cell();
    let cell = Matrix3::from_fn(|i, j| old[(order[i], order[j])]);
    let positions = structure
        .positions()
        .iter()
        .map(|p| Point3::new(p[order[0]], p[order[1]], p[order[2]]))
        .collect();
    let pbc = structure.pbc();
    structure
        .with_cell(cell)
        .with_positions(positions)
        .with_pbc([pbc[order[0]], pbc[order[1]], pbc[order[2]]])
}

/// Axis order that moves `axis` to the last position while keeping the other
/// two in their original relative order.
pub fn stacking_last_order(axis: usize) -> [usize; 3] {
    match axis {
        0 => [1, 2, 0],
        1 => [0, 2, 1],
        _ => [0, 1, 2],
    }
}

/// Replaces the single all-zero lattice vector at `axis` by the unit normal of
/// the two remaining vectors, scaled to the atomic thickness along that normal
/// plus [`PLACEHOLDER_PADDING`]. The periodic flag of `axis` is cleared.
///
/// Returns `None` if the two remaining vectors are collinear.
pub fn complete_cell(structure: &Structure, axis: usize) -> Option<Structure> {
    let others: Vec<usize> = (0..3).filter(|&i| i != axis).collect();
    let a = structure.lattice_vector(others[0]);
    let b = structure.lattice_vector(others[1]);
    let normal = plane_normal(&a, &b)?;

    let heights = structure.positions().iter().map(|p| p.coords.dot(&normal));
    let (lo, hi) = heights.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
        (lo.min(h), hi.max(h))
    });
    let thickness = if structure.is_empty() { 0.0 } else { hi - lo };
    let placeholder: Vector3<f64> = normal.into_inner() * (thickness + PLACEHOLDER_PADDING);

    let mut cell = *structure.cell();
    cell.set_row(axis, &placeholder.transpose());
    // Keep the completed cell right-handed in its original axis order.
    if cell.determinant() < 0.0 {
        cell.set_row(axis, &(-placeholder).transpose());
    }
    let mut pbc = structure.pbc();
    pbc[axis] = false;
    Some(structure.with_cell(cell).with_pbc(pbc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permute_axes_moves_stacking_axis_last() {
        let s = Structure::new(
            Matrix3::new(10.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0),
            vec!["C".into()],
            vec![Point3::new(5.0, 1.0, 1.5)],
            [false, true, true],
        )
        .unwrap();
        let p = permute_axes(&s, stacking_last_order(0));
        assert!((p.cell()[(2, 2)] - 10.0).abs() < 1e-12);
        assert!((p.cell()[(0, 0)] - 2.0).abs() < 1e-12);
        assert_eq!(p.pbc(), [true, true, false]);
        assert!((p.positions()[0].z - 5.0).abs() < 1e-12);
        assert!((p.volume() - s.volume()).abs() < 1e-9);
    }

    #[test]
    fn permute_axes_preserves_fractional_coordinates() {
        let s = Structure::new(
            Matrix3::new(2.0, 0.0, 0.0, 0.5, 3.0, 0.0, 0.0, 0.0, 4.0),
            vec!["C".into()],
            vec![Point3::new(1.2, 0.9, 2.0)],
            [true; 3],
        )
        .unwrap();
        let before = s.fractional_positions().unwrap()[0];
        let after = permute_axes(&s, [1, 2, 0]).fractional_positions().unwrap()[0];
        assert!((after.x - before.y).abs() < 1e-12);
        assert!((after.y - before.z).abs() < 1e-12);
        assert!((after.z - before.x).abs() < 1e-12);
    }

    #[test]
    fn complete_cell_fills_missing_vector_along_normal() {
        let s = Structure::new(
            Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0),
            vec!["C".into(), "C".into()],
            vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 1.0, 2.5)],
            [true, true, false],
        )
        .unwrap();
        let completed = complete_cell(&s, 2).unwrap();
        let c = completed.lattice_vector(2);
        assert!(c.x.abs() < 1e-12 && c.y.abs() < 1e-12);
        assert!((c.z - 21.5).abs() < 1e-12);
        assert!(!completed.is_singular());
    }

    #[test]
    fn complete_cell_returns_none_for_collinear_vectors() {
        let s = Structure::new(
            Matrix3::new(2.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            vec!["C".into()],
            vec![Point3::origin()],
            [true, true, false],
        )
        .unwrap();
        assert!(complete_cell(&s, 2).is_none());
    }
}
