//! # hetbuilder Core Library
//!
//! Builds two-dimensional heterostructure interfaces from two independent
//! monolayers. The top layer is rotated over a set of angles, integer
//! superlattices of both layers that coincide within a length tolerance are
//! collected and scored by strain, and each accepted match is stacked into a
//! single bilayer with a chosen interlayer distance and vacuum.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, the
//!   element table), lattice and geometry math, cell transforms, structural
//!   analysis (fragments, periodicity, 2D classification), the primitive-cell
//!   capability and extended XYZ I/O.
//!
//! - **[`engine`]: The Logic Core.** Configuration with validating builders,
//!   search budgets, progress reporting and the computational tasks: layer
//!   validation, the coincidence-lattice search and interface assembly.
//!
//! - **[`workflows`]: The Public API.** Complete procedures that tie the
//!   layers together: building every accepted interface at one tolerance, or
//!   sweeping tolerances for the single best match.
//!
//! ## Features
//!
//! - `parallel` (default): evaluates the angle grid with rayon.
//! - `symmetry` (default): provides [`core::symmetry::MoyoSymmetry`], a
//!   primitive-cell reducer backed by the `moyo` crate.

pub mod core;
pub mod engine;
pub mod workflows;
