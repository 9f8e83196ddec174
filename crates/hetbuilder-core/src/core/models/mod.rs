//! # Core Models Module
//!
//! - [`structure`] - Periodic point set: cell, species, Cartesian positions, periodic flags
//! - [`elements`] - Per-element atomic number, mass and covalent radius
//!
//! ```ignore
//! use hetbuilder::core::models::structure::Structure;
//!
//! let layer = Structure::new(cell, vec!["Mo".into(), "S".into(), "S".into()], positions, [true, true, false])?;
//! println!("{}", layer.chemical_formula()); // MoS2
//! ```

pub mod elements;
pub mod structure;
