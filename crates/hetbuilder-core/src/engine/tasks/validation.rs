use crate::core::analysis::periodicity::{find_periodic_axes, vacuum_axis};
use crate::core::cell::axes::{complete_cell, permute_axes, stacking_last_order};
use crate::core::cell::normalize::normalize_centered;
use crate::core::models::structure::Structure;
use crate::core::symmetry::{SymmetryProvider, check_primitive};
use crate::engine::config::SymmetryConfig;
use crate::engine::error::EngineError;
use tracing::{debug, info, instrument, warn};

fn input_error(label: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InputGeometry {
        label: label.to_string(),
        reason: reason.into(),
    }
}

/// Runs the primitive-cell check; failures of the reducer are only reported.
fn warn_if_not_primitive(
    label: &str,
    structure: &Structure,
    provider: &dyn SymmetryProvider,
    symmetry: &SymmetryConfig,
) {
    if let Err(e) = check_primitive(label, structure, provider, symmetry.symprec) {
        warn!(structure = label, error = %e, "Primitive cell check failed; continuing");
    }
}

/// Explicit 2D input: exactly one lattice vector is zero.
fn validate_explicit_layer(
    label: &str,
    structure: &Structure,
    axis: usize,
    provider: &dyn SymmetryProvider,
    symmetry: &SymmetryConfig,
) -> Result<Structure, EngineError> {
    let completed = complete_cell(structure, axis).ok_or_else(|| {
        EngineError::DegenerateCell(format!(
            "the two non-zero lattice vectors of '{}' are collinear",
            label
        ))
    })?;
    warn_if_not_primitive(label, &completed, provider, symmetry);
    Ok(permute_axes(&completed, stacking_last_order(axis)))
}

/// Fully periodic-looking input: the vacuum direction has to be detected.
fn validate_bulk_cell(
    label: &str,
    structure: &Structure,
    provider: &dyn SymmetryProvider,
    symmetry: &SymmetryConfig,
) -> Result<Structure, EngineError> {
    if structure.is_singular() {
        return Err(EngineError::DegenerateCell(format!(
            "cell of '{}' has volume {:.3e}",
            label,
            structure.volume()
        )));
    }
    let periodic = find_periodic_axes(structure)?;
    debug!(structure = label, ?periodic, "Periodic axes detected.");
    let axis = vacuum_axis(periodic).ok_or_else(|| {
        input_error(
            label,
            format!(
                "structure is not two-dimensional (periodic axes: {:?}); \
                 mark the vacuum direction with an all-zero lattice vector",
                periodic
            ),
        )
    })?;
    warn_if_not_primitive(label, structure, provider, symmetry);
    Ok(permute_axes(structure, stacking_last_order(axis)))
}

/// Checks that `structure` is a 2D layer and returns it in canonical form.
///
/// The number of all-zero lattice vectors decides how the input is read:
///
/// - three or two: a cluster or a chain, rejected;
/// - one: an explicit layer whose zero vector marks the stacking direction.
///   The cell is completed with a placeholder normal vector;
/// - none: the stacking direction is detected from vacuum gaps between
///   fragments, and anything that is not two-dimensional is rejected.
///
/// Layers are checked for primitiveness (warning only), their stacking axis
/// is moved to index 2, and the centered normalization is applied. The
/// returned structure has a block-diagonal cell and periodic flags
/// `[true, true, false]`.
///
/// # Errors
///
/// Returns [`EngineError::InputGeometry`] for empty, 0D, 1D or 3D inputs and
/// [`EngineError::DegenerateCell`] for singular cells.
#[instrument(skip_all, name = "structure_validation_task", fields(structure = label))]
pub fn run(
    label: &str,
    structure: &Structure,
    provider: &dyn SymmetryProvider,
    symmetry: &SymmetryConfig,
) -> Result<Structure, EngineError> {
    if structure.is_empty() {
        return Err(input_error(label, "structure contains no atoms"));
    }

    let zero_vectors = structure.zero_vectors();
    let layer = match zero_vectors.as_slice() {
        [_, _, _] => {
            return Err(input_error(
                label,
                "all lattice vectors are zero; isolated clusters cannot form an interface",
            ));
        }
        [a, b] => {
            return Err(input_error(
                label,
                format!(
                    "lattice vectors {} and {} are zero; one-dimensional chains are not supported",
                    a, b
                ),
            ));
        }
        [axis] => validate_explicit_layer(label, structure, *axis, provider, symmetry)?,
        _ => validate_bulk_cell(label, structure, provider, symmetry)?,
    };

    let normalized = normalize_centered(&layer.with_pbc([true, true, false]))?;
    info!(
        atoms = normalized.len(),
        formula = %normalized.chemical_formula(),
        stacking_length = normalized.cell()[(2, 2)],
        "Layer validated."
    );
    Ok(normalized)
}
