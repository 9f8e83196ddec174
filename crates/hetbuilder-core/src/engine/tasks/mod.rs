//! Computational units of the interface pipeline.
//!
//! Each task is a single `run` function over immutable inputs: validating
//! and canonicalizing a layer, searching for coincidence lattices between two
//! layers, and stacking one solution into an interface structure. Workflows
//! compose them.

pub mod coincidence;
pub mod interface;
pub mod validation;
