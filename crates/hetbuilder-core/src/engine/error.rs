use thiserror::Error;

use super::config::ConfigError;
use crate::core::models::structure::StructureError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input geometry for '{label}': {reason}")]
    InputGeometry { label: String, reason: String },

    #[error("Degenerate lattice cell: {0}")]
    DegenerateCell(String),

    #[error("Structure operation failed: {0}")]
    Structure(#[from] StructureError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
