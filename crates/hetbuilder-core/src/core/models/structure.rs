use super::elements::{self, hill_order};
use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use std::collections::HashMap;
use thiserror::Error;

/// Determinant threshold below which a cell is treated as singular.
pub const SINGULAR_CELL_EPS: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructureError {
    #[error("Species count ({species}) does not match position count ({positions})")]
    LengthMismatch { species: usize, positions: usize },
    #[error("Unknown chemical element '{0}'")]
    UnknownElement(String),
    #[error("Cell is singular (volume {volume:.3e}); fractional coordinates are undefined")]
    SingularCell { volume: f64 },
    #[error("Supercell matrix has zero determinant")]
    SingularSupercellMatrix,
    #[error("Supercell expansion produced {found} atoms, expected {expected}")]
    SupercellAtomCount { expected: usize, found: usize },
}

/// A periodic point set: an ordered list of atoms (species and Cartesian
/// position), a cell whose rows are the lattice vectors, and per-axis
/// periodicity flags.
///
/// Values are immutable by convention: every transform returns a new
/// `Structure` and leaves the receiver untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    cell: Matrix3<f64>,
    species: Vec<String>,
    positions: Vec<Point3<f64>>,
    pbc: [bool; 3],
}

impl Structure {
    /// Creates a structure from a cell (rows are lattice vectors), chemical
    /// symbols and Cartesian positions in Angstroms.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::LengthMismatch`] if the number of species and
    /// positions differ and [`StructureError::UnknownElement`] for symbols that
    /// are not in the element table.
    pub fn new(
        cell: Matrix3<f64>,
        species: Vec<String>,
        positions: Vec<Point3<f64>>,
        pbc: [bool; 3],
    ) -> Result<Self, StructureError> {
        if species.len() != positions.len() {
            return Err(StructureError::LengthMismatch {
                species: species.len(),
                positions: positions.len(),
            });
        }
        if let Some(unknown) = species.iter().find(|s| !elements::is_known_element(s)) {
            return Err(StructureError::UnknownElement(unknown.clone()));
        }
        let species = species.into_iter().map(|s| s.trim().to_string()).collect();
        Ok(Self {
            cell,
            species,
            positions,
            pbc,
        })
    }

    /// Creates a structure from fractional coordinates with respect to `cell`.
    pub fn from_fractional(
        cell: Matrix3<f64>,
        species: Vec<String>,
        fractional: &[Vector3<f64>],
        pbc: [bool; 3],
    ) -> Result<Self, StructureError> {
        let positions = fractional
            .iter()
            .map(|f| Point3::from(cell.transpose() * f))
            .collect();
        Self::new(cell, species, positions, pbc)
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn lattice_vector(&self, axis: usize) -> Vector3<f64> {
        self.cell.row(axis).transpose()
    }

    pub fn lengths(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.lattice_vector(i).norm())
    }

    pub fn volume(&self) -> f64 {
        self.cell.determinant().abs()
    }

    /// Indices of lattice vectors whose three components are exactly zero.
    pub fn zero_vectors(&self) -> Vec<usize> {
        (0..3)
            .filter(|&i| self.cell.row(i).iter().all(|&x| x == 0.0))
            .collect()
    }

    pub fn is_singular(&self) -> bool {
        self.volume() < SINGULAR_CELL_EPS
    }

    /// Fractional coordinates of every atom, without wrapping.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::SingularCell`] when the cell cannot be inverted.
    pub fn fractional_positions(&self) -> Result<Vec<Vector3<f64>>, StructureError> {
        let inverse = self.inverse_cell_transpose()?;
        Ok(self.positions.iter().map(|p| inverse * p.coords).collect())
    }

    fn inverse_cell_transpose(&self) -> Result<Matrix3<f64>, StructureError> {
        if self.is_singular() {
            return Err(StructureError::SingularCell {
                volume: self.volume(),
            });
        }
        self.cell
            .transpose()
            .try_inverse()
            .ok_or(StructureError::SingularCell {
                volume: self.volume(),
            })
    }

    pub fn with_positions(&self, positions: Vec<Point3<f64>>) -> Self {
        debug_assert_eq!(positions.len(), self.species.len());
        Self {
            positions,
            ..self.clone()
        }
    }

    /// Replaces the cell while keeping Cartesian positions fixed.
    pub fn with_cell(&self, cell: Matrix3<f64>) -> Self {
        Self {
            cell,
            ..self.clone()
        }
    }

    pub fn with_pbc(&self, pbc: [bool; 3]) -> Self {
        Self {
            pbc,
            ..self.clone()
        }
    }

    pub fn translated(&self, shift: &Vector3<f64>) -> Self {
        self.with_positions(self.positions.iter().map(|p| p + shift).collect())
    }

    /// Rotates both the atoms (about the origin) and the cell vectors.
    pub fn rotated(&self, rotation: &Rotation3<f64>) -> Self {
        let cell = Matrix3::from_rows(&[
            (rotation * self.lattice_vector(0)).transpose(),
            (rotation * self.lattice_vector(1)).transpose(),
            (rotation * self.lattice_vector(2)).transpose(),
        ]);
        Self {
            cell,
            positions: self.positions.iter().map(|p| rotation * p).collect(),
            ..self.clone()
        }
    }

    /// The sub-structure formed by the atoms at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            cell: self.cell,
            species: indices.iter().map(|&i| self.species[i].clone()).collect(),
            positions: indices.iter().map(|&i| self.positions[i]).collect(),
            pbc: self.pbc,
        }
    }

    pub fn atomic_numbers(&self) -> Vec<u8> {
        self.species
            .iter()
            .map(|s| elements::element(s).map_or(0, |e| e.number))
            .collect()
    }

    pub fn masses(&self) -> Vec<f64> {
        self.species
            .iter()
            .map(|s| elements::element(s).map_or(0.0, |e| e.mass))
            .collect()
    }

    pub fn covalent_radii(&self) -> Vec<f64> {
        self.species
            .iter()
            .map(|s| elements::element(s).map_or(0.0, |e| e.covalent_radius))
            .collect()
    }

    /// Mass-weighted mean position; `None` for an empty structure.
    pub fn center_of_mass(&self) -> Option<Point3<f64>> {
        let masses = self.masses();
        let total: f64 = masses.iter().sum();
        if self.is_empty() || total <= 0.0 {
            return None;
        }
        let weighted = self
            .positions
            .iter()
            .zip(&masses)
            .fold(Vector3::zeros(), |acc, (p, &m)| acc + p.coords * m);
        Some(Point3::from(weighted / total))
    }

    /// Chemical formula in Hill notation, e.g. `"MoS2"` or `"C2"`.
    pub fn chemical_formula(&self) -> String {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for s in &self.species {
            *counts.entry(s.as_str()).or_default() += 1;
        }
        let mut entries: Vec<(String, usize)> =
            counts.into_iter().map(|(s, n)| (s.to_string(), n)).collect();
        hill_order(&mut entries);
        entries
            .into_iter()
            .map(|(s, n)| if n == 1 { s } else { format!("{}{}", s, n) })
            .collect()
    }

    /// Minimum and maximum Cartesian z over all atoms.
    pub fn z_extent(&self) -> Option<(f64, f64)> {
        self.positions.iter().fold(None, |acc, p| match acc {
            None => Some((p.z, p.z)),
            Some((lo, hi)) => Some((lo.min(p.z), hi.max(p.z))),
        })
    }
}
