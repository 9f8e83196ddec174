//! Symmetry search as an injected capability.
//!
//! The engine needs two things from a symmetry search: whether an input cell
//! is primitive, and the lattice metric averaged over the point group found
//! within a tolerance, used to idealize interface cells. Both sit behind
//! [`SymmetryProvider`]. [`NoSymmetry`] treats every cell as primitive and
//! symmetry-free; with the `symmetry` feature, [`MoyoSymmetry`] performs a
//! real symmetry search.

#[cfg(feature = "symmetry")]
mod moyo_provider;

#[cfg(feature = "symmetry")]
pub use self::moyo_provider::MoyoSymmetry;

use crate::core::models::structure::Structure;
use nalgebra::{Matrix3, Vector3};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SymmetryError {
    #[error("Symmetry search failed: {0}")]
    SearchFailed(String),
    #[error("Cannot analyse symmetry of a singular cell")]
    SingularCell,
}

/// A reduced cell: rows of `cell` are lattice vectors, positions are
/// fractional, `numbers` are atomic numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveCell {
    pub cell: Matrix3<f64>,
    pub fractional: Vec<Vector3<f64>>,
    pub numbers: Vec<i32>,
}

impl PrimitiveCell {
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

pub trait SymmetryProvider: Send + Sync {
    /// Reduces a cell to its primitive cell within `symprec` (Angstrom).
    fn reduce(
        &self,
        cell: &Matrix3<f64>,
        fractional: &[Vector3<f64>],
        numbers: &[i32],
        symprec: f64,
    ) -> Result<PrimitiveCell, SymmetryError>;

    /// Metric tensor `G = cell * cell^T` averaged over the rotations of the
    /// space group found within `symprec`. Rows of `cell` are lattice vectors.
    ///
    /// The default finds no symmetry beyond the identity and returns the
    /// metric of `cell` as is.
    fn symmetrized_metric(
        &self,
        cell: &Matrix3<f64>,
        _fractional: &[Vector3<f64>],
        _numbers: &[i32],
        _symprec: f64,
    ) -> Result<Matrix3<f64>, SymmetryError> {
        Ok(cell * cell.transpose())
    }
}

/// Averages `R^T G R` over integer rotations acting on fractional coordinates.
pub fn average_metric<'a>(
    metric: &Matrix3<f64>,
    rotations: impl IntoIterator<Item = &'a Matrix3<i32>>,
) -> Matrix3<f64> {
    let (sum, count) = rotations
        .into_iter()
        .fold((Matrix3::zeros(), 0usize), |(sum, count), r| {
            let r = r.cast::<f64>();
            (sum + r.transpose() * metric * r, count + 1)
        });
    if count == 0 { *metric } else { sum / count as f64 }
}

/// Identity reducer: every cell is its own primitive cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymmetry;

impl SymmetryProvider for NoSymmetry {
    fn reduce(
        &self,
        cell: &Matrix3<f64>,
        fractional: &[Vector3<f64>],
        numbers: &[i32],
        _symprec: f64,
    ) -> Result<PrimitiveCell, SymmetryError> {
        Ok(PrimitiveCell {
            cell: *cell,
            fractional: fractional.to_vec(),
            numbers: numbers.to_vec(),
        })
    }
}

/// Returns `Ok(false)` and emits a warning when the reducer finds a smaller
/// cell than the one given. Processing is expected to continue either way.
pub fn check_primitive(
    label: &str,
    structure: &Structure,
    provider: &dyn SymmetryProvider,
    symprec: f64,
) -> Result<bool, SymmetryError> {
    let fractional = structure
        .fractional_positions()
        .map_err(|_| SymmetryError::SingularCell)?;
    let numbers: Vec<i32> = structure
        .atomic_numbers()
        .into_iter()
        .map(i32::from)
        .collect();
    let reduced = provider.reduce(structure.cell(), &fractional, &numbers, symprec)?;
    let primitive = reduced.len() >= structure.len();
    if !primitive {
        warn!(
            structure = label,
            atoms = structure.len(),
            primitive_atoms = reduced.len(),
            "Structure is not primitive; continuing with the cell as given"
        );
    }
    Ok(primitive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    struct HalvingSymmetry;

    impl SymmetryProvider for HalvingSymmetry {
        fn reduce(
            &self,
            cell: &Matrix3<f64>,
            fractional: &[Vector3<f64>],
            numbers: &[i32],
            _symprec: f64,
        ) -> Result<PrimitiveCell, SymmetryError> {
            let half = numbers.len() / 2;
            Ok(PrimitiveCell {
                cell: *cell,
                fractional: fractional[..half].to_vec(),
                numbers: numbers[..half].to_vec(),
            })
        }
    }

    fn doubled_chain() -> Structure {
        Structure::new(
            Matrix3::new(2.8, 0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 10.0),
            vec!["C".into(), "C".into()],
            vec![Point3::new(0.0, 5.0, 5.0), Point3::new(1.4, 5.0, 5.0)],
            [true; 3],
        )
        .unwrap()
    }

    #[test]
    fn no_symmetry_returns_input_unchanged() {
        let s = doubled_chain();
        let fractional = s.fractional_positions().unwrap();
        let reduced = NoSymmetry
            .reduce(s.cell(), &fractional, &[6, 6], 1e-5)
            .unwrap();
        assert_eq!(reduced.len(), 2);
        assert_eq!(&reduced.cell, s.cell());
    }

    #[test]
    fn no_symmetry_metric_is_the_plain_metric() {
        let cell = Matrix3::new(3.0, 0.0, 0.0, -0.2, 3.4, 0.0, 0.0, 0.0, 20.0);
        let metric = NoSymmetry.symmetrized_metric(&cell, &[], &[], 1e-3).unwrap();
        assert_eq!(metric, cell * cell.transpose());
    }

    #[test]
    fn average_metric_equalizes_axes_related_by_fourfold_rotation() {
        let metric = Matrix3::from_diagonal(&Vector3::new(9.0, 9.02, 400.0));
        let fourfold = Matrix3::new(0, -1, 0, 1, 0, 0, 0, 0, 1);
        let rotations = [Matrix3::identity(), fourfold];
        let averaged = average_metric(&metric, &rotations);
        assert!((averaged[(0, 0)] - 9.01).abs() < 1e-12);
        assert!((averaged[(1, 1)] - 9.01).abs() < 1e-12);
        assert!((averaged[(2, 2)] - 400.0).abs() < 1e-12);
    }

    #[test]
    fn average_metric_without_rotations_returns_input() {
        let metric = Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0));
        let rotations: Vec<Matrix3<i32>> = Vec::new();
        assert_eq!(average_metric(&metric, &rotations), metric);
    }

    #[test]
    fn check_primitive_accepts_cells_that_do_not_shrink() {
        assert!(check_primitive("bottom", &doubled_chain(), &NoSymmetry, 1e-5).unwrap());
    }

    #[test]
    fn check_primitive_flags_reducible_cells() {
        assert!(!check_primitive("bottom", &doubled_chain(), &HalvingSymmetry, 1e-5).unwrap());
    }

    #[test]
    fn check_primitive_rejects_singular_cells() {
        let s = doubled_chain().with_cell(Matrix3::zeros());
        assert_eq!(
            check_primitive("top", &s, &NoSymmetry, 1e-5),
            Err(SymmetryError::SingularCell)
        );
    }
}
