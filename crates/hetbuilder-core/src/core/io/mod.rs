//! Reading and writing periodic structures.
//!
//! Formats implement [`traits::StructureFile`]; extended XYZ is the native
//! exchange format for layers and finished interfaces.

pub mod traits;
pub mod xyz;
