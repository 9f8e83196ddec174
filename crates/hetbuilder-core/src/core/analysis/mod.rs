//! Structural analysis: bonded fragments and per-axis periodicity.

pub mod fragments;
pub mod periodicity;
