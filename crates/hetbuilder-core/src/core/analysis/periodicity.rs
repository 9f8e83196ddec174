use super::fragments::find_fragments;
use crate::core::cell::supercell::make_supercell;
use crate::core::models::structure::{Structure, StructureError};
use tracing::debug;

/// Bonding-radius scale used when looking for vacuum-separated fragments.
pub const PERIODICITY_BOND_SCALE: f64 = 1.5;
/// Minimum empty gap (Angstrom) between fragments that breaks periodicity.
pub const VACUUM_GAP_THRESHOLD: f64 = 10.0;

/// Decides per lattice axis whether the structure is genuinely periodic or
/// separated by vacuum.
///
/// The structure is doubled along every axis so that bonding across the cell
/// boundary becomes visible, then split into fragments. If more than one
/// fragment exists, an axis is marked non-periodic as soon as two consecutive
/// fragment spans along it are separated by at least
/// [`VACUUM_GAP_THRESHOLD`], either directly or through the periodic boundary.
///
/// # Errors
///
/// Propagates [`StructureError`] from the supercell expansion, e.g. for a
/// singular cell.
pub fn find_periodic_axes(structure: &Structure) -> Result<[bool; 3], StructureError> {
    let supercell = make_supercell(structure, &[[2, 0, 0], [0, 2, 0], [0, 0, 2]])?;
    let fragments = find_fragments(&supercell, PERIODICITY_BOND_SCALE);
    let mut periodic = [true; 3];
    if fragments.len() <= 1 {
        return Ok(periodic);
    }

    let lengths = supercell.lengths();
    for axis in 0..3 {
        let mut spans: Vec<(f64, f64)> = fragments.iter().map(|f| f.span(axis)).collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        spans.dedup();
        for pair in spans.windows(2) {
            let (end, start) = (pair[0].1, pair[1].0);
            let direct = (end - start).abs();
            let wrapped = (end - start - lengths[axis]).abs();
            if direct.min(wrapped) >= VACUUM_GAP_THRESHOLD {
                periodic[axis] = false;
                break;
            }
        }
    }
    debug!(
        fragments = fragments.len(),
        ?periodic,
        "Periodicity analysis finished"
    );
    Ok(periodic)
}

/// A structure is two-dimensional when exactly two of its axes are periodic.
pub fn is_two_dimensional(periodic: [bool; 3]) -> bool {
    periodic.iter().filter(|&&p| p).count() == 2
}

/// Runs [`find_periodic_axes`] and classifies the result.
pub fn classify_two_dimensional(structure: &Structure) -> Result<bool, StructureError> {
    find_periodic_axes(structure).map(is_two_dimensional)
}

/// Index of the single non-periodic axis, if there is exactly one.
pub fn vacuum_axis(periodic: [bool; 3]) -> Option<usize> {
    if !is_two_dimensional(periodic) {
        return None;
    }
    periodic.iter().position(|&p| !p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Point3, Vector3};

    fn square_carbon_layer(vacuum: f64, stacking_axis: usize) -> Structure {
        let mut diagonal = [1.4; 3];
        diagonal[stacking_axis] = 1.4 + vacuum;
        let mut position = [0.0; 3];
        position[stacking_axis] = 0.7;
        Structure::new(
            Matrix3::from_diagonal(&Vector3::from(diagonal)),
            vec!["C".into()],
            vec![Point3::from(position)],
            [true; 3],
        )
        .unwrap()
    }

    #[test]
    fn find_periodic_axes_detects_vacuum_along_stacking_axis() {
        let slab = square_carbon_layer(20.0, 2);
        assert_eq!(find_periodic_axes(&slab).unwrap(), [true, true, false]);
    }

    #[test]
    fn find_periodic_axes_detects_vacuum_along_first_axis() {
        let slab = square_carbon_layer(20.0, 0);
        assert_eq!(find_periodic_axes(&slab).unwrap(), [false, true, true]);
    }

    #[test]
    fn find_periodic_axes_reports_bulk_as_fully_periodic() {
        let bulk = square_carbon_layer(0.0, 2);
        assert_eq!(find_periodic_axes(&bulk).unwrap(), [true, true, true]);
    }

    #[test]
    fn find_periodic_axes_ignores_small_gaps() {
        let layered = square_carbon_layer(5.0, 2);
        assert_eq!(find_periodic_axes(&layered).unwrap(), [true, true, true]);
    }

    #[test]
    fn is_two_dimensional_requires_exactly_one_vacuum_axis() {
        assert!(is_two_dimensional([true, true, false]));
        assert!(is_two_dimensional([false, true, true]));
        assert!(!is_two_dimensional([true, true, true]));
        assert!(!is_two_dimensional([true, false, false]));
        assert!(!is_two_dimensional([false; 3]));
    }

    #[test]
    fn classify_two_dimensional_matches_periodicity_analysis() {
        assert!(classify_two_dimensional(&square_carbon_layer(20.0, 2)).unwrap());
        assert!(!classify_two_dimensional(&square_carbon_layer(0.0, 2)).unwrap());
    }

    #[test]
    fn vacuum_axis_reports_the_non_periodic_axis() {
        assert_eq!(vacuum_axis([true, false, true]), Some(1));
        assert_eq!(vacuum_axis([true; 3]), None);
    }
}
