//! # Engine Module
//!
//! The computational layer between the stateless [`crate::core`] primitives
//! and the public [`crate::workflows`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Search, stacking, symmetry and sweep
//!   parameters with validating builders
//! - **State** ([`state`]) - Coincidence solutions, search outcomes and
//!   assembled interfaces
//! - **Budget** ([`budget`]) - Candidate and wall-clock limits shared by the
//!   search workers
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types
//! - **Tasks** ([`tasks`]) - Layer validation, coincidence search and
//!   interface assembly
//!
//! ## Key Capabilities
//!
//! - **Parallel angle grid** evaluated with rayon when the `parallel` feature
//!   is enabled
//! - **Bounded runtime** through per-search candidate and time budgets that
//!   return partial results instead of failing
//! - **Deterministic output** with canonical deduplication and a total order
//!   on solutions

pub mod budget;
pub mod config;
pub mod error;
pub mod progress;
pub mod state;
pub mod tasks;
