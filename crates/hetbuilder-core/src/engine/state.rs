use crate::core::io::xyz::XyzMetadata;
use crate::core::models::structure::Structure;
use crate::core::utils::lattice::IntMatrix2;
use std::cmp::Ordering;

/// One accepted coincidence: the top layer rotated by `angle` degrees and the
/// integer transformations of both layers onto a shared superlattice.
#[derive(Debug, Clone, PartialEq)]
pub struct CoincidenceSolution {
    /// Rotation of the top layer about +z, in degrees.
    pub angle: f64,
    /// Rows are the bottom superlattice vectors in the bottom basis.
    pub bottom: IntMatrix2,
    /// Rows are the top superlattice vectors in the rotated top basis.
    pub top: IntMatrix2,
    /// Strain metric in percent; lower is better.
    pub stress: f64,
    /// Area of the bottom superlattice in square Angstrom.
    pub area: f64,
}

impl CoincidenceSolution {
    /// Ascending strain, then angle, area and matrix entries.
    pub fn ranking(&self, other: &Self) -> Ordering {
        self.stress
            .total_cmp(&other.stress)
            .then_with(|| self.angle.total_cmp(&other.angle))
            .then_with(|| self.area.total_cmp(&other.area))
            .then_with(|| self.bottom.cmp(&other.bottom))
            .then_with(|| self.top.cmp(&other.top))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Accepted solutions in ranking order. Empty when nothing matched.
    pub solutions: Vec<CoincidenceSolution>,
    /// Set when the search budget ran out before the grid was exhausted.
    pub truncated: bool,
    pub candidates_examined: u64,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn best(&self) -> Option<&CoincidenceSolution> {
        self.solutions.first()
    }
}

/// A stacked bilayer built from one coincidence solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub structure: Structure,
    pub angle: f64,
    pub stress: f64,
    pub bottom_matrix: IntMatrix2,
    pub top_matrix: IntMatrix2,
    pub distance: f64,
    pub vacuum: f64,
    /// The first `bottom_atom_count` atoms belong to the bottom layer.
    pub bottom_atom_count: usize,
}

fn format_matrix(m: &IntMatrix2) -> String {
    format!("{} {} {} {}", m[0][0], m[0][1], m[1][0], m[1][1])
}

impl Interface {
    pub fn top_atom_count(&self) -> usize {
        self.structure.len() - self.bottom_atom_count
    }

    /// Comment-line fields recorded when the interface is written to disk.
    pub fn metadata(&self) -> XyzMetadata {
        XyzMetadata::default()
            .with_field("angle", format!("{:.4}", self.angle))
            .with_field("stress", format!("{:.6}", self.stress))
            .with_field("M", format_matrix(&self.bottom_matrix))
            .with_field("N", format_matrix(&self.top_matrix))
            .with_field("distance", self.distance)
            .with_field("vacuum", self.vacuum)
            .with_field("bottom_atoms", self.bottom_atom_count)
    }

    /// `{formula}_angle{angle}_stress{stress}.xyz` with two decimals each.
    pub fn default_file_name(&self) -> String {
        format!(
            "{}_angle{:.2}_stress{:.2}.xyz",
            self.structure.chemical_formula(),
            self.angle,
            self.stress
        )
    }
}
