//! # Core Module
//!
//! Stateless building blocks for heterostructure construction: the periodic
//! structure model, lattice and geometry math, cell transforms, structural
//! analysis, the symmetry capability and file I/O.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - The immutable `Structure` value and the element table
//! - **Lattice Math** ([`utils`]) - Integer 2x2 lattice algebra, rotations, wrapping and strain
//! - **Cell Transforms** ([`cell`]) - Supercells, axis permutation, stacking-axis normalization
//! - **Structural Analysis** ([`analysis`]) - Bonded fragments and per-axis periodicity
//! - **Symmetry** ([`symmetry`]) - Primitive-cell reduction behind a provider trait
//! - **File I/O** ([`io`]) - Extended XYZ reading and writing
//!
//! Every transform returns a new `Structure`; nothing in this layer holds
//! mutable state between calls.

pub mod analysis;
pub mod cell;
pub mod io;
pub mod models;
pub mod symmetry;
pub mod utils;
