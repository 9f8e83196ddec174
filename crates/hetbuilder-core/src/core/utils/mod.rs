pub mod geometry;
pub mod lattice;
