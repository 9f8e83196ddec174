//! # Workflows Module
//!
//! The top-level entry points of the library. Each workflow takes two raw
//! layer structures, validates them, and drives the engine tasks to a
//! finished result.
//!
//! ## Architecture
//!
//! - **Build Workflow** ([`build`]) - One coincidence search at a fixed
//!   tolerance, with an interface assembled for every accepted solution.
//! - **Matching Workflow** ([`matching`]) - A sweep over increasing
//!   tolerances that stops at the first level with a solution and returns
//!   the lowest-strain interface of that level.
//!
//! Both workflows report progress through
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and take the
//! primitive-cell reducer as an injected
//! [`SymmetryProvider`](crate::core::symmetry::SymmetryProvider).

pub mod build;
pub mod matching;
