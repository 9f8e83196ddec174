use crate::core::cell::normalize::Normalization;
use crate::core::cell::supercell::make_supercell;
use crate::core::models::structure::Structure;
use crate::core::symmetry::SymmetryProvider;
use crate::core::utils::geometry::{rotation_about_z, wrap_fraction};
use crate::core::utils::lattice::{embed_in_plane, in_plane_block};
use crate::engine::config::{StackingConfig, SymmetryConfig};
use crate::engine::error::EngineError;
use crate::engine::state::{CoincidenceSolution, Interface};
use nalgebra::{Matrix2, Matrix3, Point3, Vector2};
use tracing::{debug, info, instrument, warn};

/// Rebuilds an in-plane cell (rows are lattice vectors) from a metric
/// tensor, with the first vector along +x and the handedness of `cell`.
///
/// Returns `None` when the metric has no positive in-plane lengths.
fn idealize_cell(cell: &Matrix2<f64>, metric: &Matrix3<f64>) -> Option<Matrix2<f64>> {
    let (g_aa, g_bb, g_ab) = (metric[(0, 0)], metric[(1, 1)], metric[(0, 1)]);
    if !(g_aa > 0.0 && g_bb > 0.0) {
        return None;
    }
    let (len_a, len_b) = (g_aa.sqrt(), g_bb.sqrt());
    let cos = (g_ab / (len_a * len_b)).clamp(-1.0, 1.0);
    let sin = (1.0 - cos * cos).sqrt();
    let handedness = if cell.determinant() < 0.0 { -1.0 } else { 1.0 };
    Some(Matrix2::new(len_a, 0.0, len_b * cos, handedness * len_b * sin))
}

/// Replaces the in-plane cell of a stacked interface by the one implied by
/// the symmetry found within `symmetry.symprec`. Atoms keep their fractional
/// coordinates. A failed symmetry search leaves the structure as built.
fn idealize(
    structure: Structure,
    provider: &dyn SymmetryProvider,
    symmetry: &SymmetryConfig,
) -> Result<Structure, EngineError> {
    let fractional = structure.fractional_positions()?;
    let numbers: Vec<i32> = structure
        .atomic_numbers()
        .into_iter()
        .map(i32::from)
        .collect();
    let metric = match provider.symmetrized_metric(
        structure.cell(),
        &fractional,
        &numbers,
        symmetry.symprec,
    ) {
        Ok(metric) => metric,
        Err(e) => {
            warn!(error = %e, "Symmetry search failed; keeping the interface cell as built.");
            return Ok(structure);
        }
    };
    let Some(in_plane) = idealize_cell(&in_plane_block(structure.cell()), &metric) else {
        warn!("Symmetrized metric is degenerate; keeping the interface cell as built.");
        return Ok(structure);
    };

    let mut cell = *structure.cell();
    cell.fixed_view_mut::<2, 2>(0, 0).copy_from(&in_plane);
    let positions = structure
        .positions()
        .iter()
        .zip(&fractional)
        .map(|(p, f)| {
            let xy = in_plane.transpose() * Vector2::new(f.x, f.y);
            Point3::new(xy.x, xy.y, p.z)
        })
        .collect();
    debug!(
        a = in_plane.row(0).norm(),
        b = in_plane.row(1).norm(),
        "Interface cell idealized."
    );
    Ok(structure.with_cell(cell).with_positions(positions))
}

/// Maps a superlattice replica onto the shared in-plane cell by its wrapped
/// fractional coordinates and moves its lowest atom to `base`.
fn place_layer(
    layer: &Structure,
    cell: &Matrix2<f64>,
    base: f64,
) -> Result<Vec<Point3<f64>>, EngineError> {
    let (lowest, _) = layer
        .z_extent()
        .ok_or_else(|| EngineError::Internal("cannot stack an empty layer".into()))?;
    let fractional = layer.fractional_positions()?;
    Ok(layer
        .positions()
        .iter()
        .zip(&fractional)
        .map(|(p, f)| {
            let xy = cell.transpose() * Vector2::new(wrap_fraction(f.x), wrap_fraction(f.y));
            Point3::new(xy.x, xy.y, p.z - lowest + base)
        })
        .collect())
}

fn highest(positions: &[Point3<f64>]) -> f64 {
    positions.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max)
}

/// Stacks the two superlattices of `solution` into one bilayer structure.
///
/// The top layer is rotated by the solution angle and both layers are
/// expanded by their integer matrices. The shared in-plane cell interpolates
/// between the two superlattice cells with `stacking.weight`. With
/// `symmetry.idealize` it is rebuilt from the lattice metric averaged over the
/// symmetry `provider` finds within `symmetry.symprec`. Atoms keep their in-plane fractional coordinates. The top layer
/// starts exactly `stacking.distance` above the highest bottom atom, and the
/// stacking length is the combined atomic span plus `stacking.vacuum`. With
/// [`Normalization::Centered`] the vacuum is split evenly below and above the
/// atoms; with [`Normalization::BottomAnchored`] the lowest atom sits at z = 0.
///
/// Bottom-layer atoms come first in the resulting structure.
///
/// # Errors
///
/// Returns [`EngineError::Structure`] if a superlattice cannot be built, which
/// happens for singular matrices or malformed cells.
#[instrument(skip_all, name = "interface_build_task")]
pub fn run(
    bottom: &Structure,
    top: &Structure,
    solution: CoincidenceSolution,
    stacking: &StackingConfig,
    provider: &dyn SymmetryProvider,
    symmetry: &SymmetryConfig,
) -> Result<Interface, EngineError> {
    let rotated = top.rotated(&rotation_about_z(solution.angle));
    let bottom_super = make_supercell(bottom, &embed_in_plane(&solution.bottom))?;
    let top_super = make_supercell(&rotated, &embed_in_plane(&solution.top))?;

    let bottom_cell = in_plane_block(bottom_super.cell());
    let top_cell = in_plane_block(top_super.cell());
    let cell = bottom_cell + (top_cell - bottom_cell) * stacking.weight;

    let mut positions = place_layer(&bottom_super, &cell, 0.0)?;
    let bottom_height = highest(&positions);
    positions.extend(place_layer(
        &top_super,
        &cell,
        bottom_height + stacking.distance,
    )?);
    let span = highest(&positions);

    if stacking.normalization == Normalization::Centered {
        let offset = 0.5 * stacking.vacuum;
        positions.iter_mut().for_each(|p| p.z += offset);
    }

    let full_cell = Matrix3::new(
        cell[(0, 0)],
        cell[(0, 1)],
        0.0,
        cell[(1, 0)],
        cell[(1, 1)],
        0.0,
        0.0,
        0.0,
        span + stacking.vacuum,
    );
    let species = bottom_super
        .species()
        .iter()
        .chain(top_super.species())
        .cloned()
        .collect();
    let mut structure = Structure::new(full_cell, species, positions, [true, true, false])?;
    if symmetry.idealize {
        structure = idealize(structure, provider, symmetry)?;
    }

    debug!(
        bottom_atoms = bottom_super.len(),
        top_atoms = top_super.len(),
        span,
        "Layers stacked."
    );
    info!(
        angle = solution.angle,
        stress = solution.stress,
        atoms = structure.len(),
        "Interface assembled."
    );

    Ok(Interface {
        structure,
        angle: solution.angle,
        stress: solution.stress,
        bottom_matrix: solution.bottom,
        top_matrix: solution.top,
        distance: stacking.distance,
        vacuum: stacking.vacuum,
        bottom_atom_count: bottom_super.len(),
    })
}
