use crate::core::models::structure::{Structure, StructureError};
use crate::core::utils::geometry::{WRAP_EPS, wrap_fraction};
use nalgebra::{Matrix3, Point3, Vector3};

/// Fractional tolerance used to decide whether an image lies inside the new cell.
const INSIDE_EPS: f64 = 1e-8;

/// Builds the supercell whose lattice vectors are the rows of `matrix` times
/// the original cell (`new_cell = matrix * cell`).
///
/// Atoms are emitted translation by translation, keeping the original species
/// order inside each translated copy. Input positions are wrapped into the
/// home cell first. The result holds exactly
/// `|det(matrix)| * len` atoms.
///
/// # Errors
///
/// Returns [`StructureError::SingularSupercellMatrix`] for a singular matrix,
/// [`StructureError::SingularCell`] if the input cell cannot be inverted, and
/// [`StructureError::SupercellAtomCount`] if the expansion does not produce
/// the expected number of atoms.
pub fn make_supercell(
    structure: &Structure,
    matrix: &[[i64; 3]; 3],
) -> Result<Structure, StructureError> {
    let p = Matrix3::from_fn(|i, j| matrix[i][j] as f64);
    let det = p.determinant().round() as i64;
    if det == 0 {
        return Err(StructureError::SingularSupercellMatrix);
    }
    let p_inv = p.try_inverse().ok_or(StructureError::SingularSupercellMatrix)?;

    // Images are only searched around the home cell, so atoms stored several
    // cells away are folded back first.
    let fractional: Vec<Vector3<f64>> = structure
        .fractional_positions()?
        .into_iter()
        .map(|f| f.map(wrap_fraction))
        .collect();
    let new_cell = p * structure.cell();
    let (lower, upper) = translation_bounds(matrix);

    let mut species = Vec::with_capacity(structure.len() * det.unsigned_abs() as usize);
    let mut new_fractional = Vec::with_capacity(species.capacity());

    for i in lower[0]..=upper[0] {
        for j in lower[1]..=upper[1] {
            for k in lower[2]..=upper[2] {
                let shift = Vector3::new(i as f64, j as f64, k as f64);
                for (symbol, f) in structure.species().iter().zip(&fractional) {
                    // Row vector convention: g = (f + t) * P^-1.
                    let g = p_inv.transpose() * (f + shift);
                    if g.iter().all(|&x| x > -INSIDE_EPS && x < 1.0 - INSIDE_EPS) {
                        species.push(symbol.clone());
                        new_fractional.push(g.map(|x| if x.abs() < WRAP_EPS { 0.0 } else { x }));
                    }
                }
            }
        }
    }

    let expected = structure.len() * det.unsigned_abs() as usize;
    if species.len() != expected {
        return Err(StructureError::SupercellAtomCount {
            expected,
            found: species.len(),
        });
    }

    let positions = new_fractional
        .iter()
        .map(|g| Point3::from(new_cell.transpose() * g))
        .collect();
    Structure::new(new_cell, species, positions, structure.pbc())
}

/// Integer translation ranges covering every corner of the new cell, expressed
/// in the old lattice basis. One extra cell on each side absorbs atoms whose
/// fractional coordinates sit slightly outside `[0, 1)`.
fn translation_bounds(matrix: &[[i64; 3]; 3]) -> ([i64; 3], [i64; 3]) {
    let mut lower = [0i64; 3];
    let mut upper = [0i64; 3];
    for corner in 0..8u8 {
        for axis in 0..3 {
            let value: i64 = (0..3)
                .filter(|row| corner & (1 << row) != 0)
                .map(|row| matrix[row][axis])
                .sum();
            lower[axis] = lower[axis].min(value);
            upper[axis] = upper[axis].max(value);
        }
    }
    (lower.map(|v| v - 1), upper.map(|v| v + 1))
}
