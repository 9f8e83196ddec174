use super::{PrimitiveCell, SymmetryError, SymmetryProvider, average_metric};
use moyo::MoyoDataset;
use moyo::base::{AngleTolerance, Cell, Lattice};
use moyo::data::Setting;
use nalgebra::{Matrix3, Vector3};

/// Symmetry search backed by `moyo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoyoSymmetry {
    /// Angle tolerance in degrees; `None` uses moyo's default.
    pub angle_tolerance: Option<f64>,
}

impl MoyoSymmetry {
    pub fn new(angle_tolerance: Option<f64>) -> Self {
        Self { angle_tolerance }
    }

    fn dataset(
        &self,
        cell: &Matrix3<f64>,
        fractional: &[Vector3<f64>],
        numbers: &[i32],
        symprec: f64,
        rotate_basis: bool,
    ) -> Result<MoyoDataset, SymmetryError> {
        if cell.determinant().abs() < 1e-8 {
            return Err(SymmetryError::SingularCell);
        }
        let moyo_cell = Cell::new(Lattice::new(*cell), fractional.to_vec(), numbers.to_vec());
        let angle_tolerance = match self.angle_tolerance {
            Some(degrees) => AngleTolerance::Radian(degrees.to_radians()),
            None => AngleTolerance::Default,
        };
        MoyoDataset::new(
            &moyo_cell,
            symprec,
            angle_tolerance,
            Setting::Spglib,
            rotate_basis,
        )
        .map_err(|e| SymmetryError::SearchFailed(format!("{:?}", e)))
    }
}

impl SymmetryProvider for MoyoSymmetry {
    fn reduce(
        &self,
        cell: &Matrix3<f64>,
        fractional: &[Vector3<f64>],
        numbers: &[i32],
        symprec: f64,
    ) -> Result<PrimitiveCell, SymmetryError> {
        let dataset = self.dataset(cell, fractional, numbers, symprec, true)?;
        let primitive = dataset.prim_std_cell;
        Ok(PrimitiveCell {
            // moyo stores basis vectors as columns.
            cell: primitive.lattice.basis.transpose(),
            fractional: primitive.positions,
            numbers: primitive.numbers,
        })
    }

    fn symmetrized_metric(
        &self,
        cell: &Matrix3<f64>,
        fractional: &[Vector3<f64>],
        numbers: &[i32],
        symprec: f64,
    ) -> Result<Matrix3<f64>, SymmetryError> {
        let dataset = self.dataset(cell, fractional, numbers, symprec, false)?;
        // Operations act on fractional coordinates of the input cell.
        let rotations = dataset.operations.iter().map(|op| &op.rotation);
        Ok(average_metric(&(cell * cell.transpose()), rotations))
    }
}
