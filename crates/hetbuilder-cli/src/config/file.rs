use crate::error::{CliError, Result};
use hetbuilder::core::cell::normalize::Normalization;
use hetbuilder::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileCoefficientRange {
    Symmetric,
    Bounded,
}

impl From<FileCoefficientRange> for core_config::CoefficientRange {
    fn from(range: FileCoefficientRange) -> Self {
        match range {
            FileCoefficientRange::Symmetric => Self::Symmetric,
            FileCoefficientRange::Bounded => Self::Bounded,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSearchConfig {
    #[serde(rename = "nmax")]
    pub n_max: Option<i64>,
    #[serde(rename = "nmin")]
    pub n_min: Option<i64>,
    pub coefficient_range: Option<FileCoefficientRange>,
    pub angles: Option<Vec<f64>>,
    pub angle_limits: Option<[f64; 2]>,
    pub angle_stepsize: Option<f64>,
    pub tolerance: Option<f64>,
    /// Degrees; absent means derived from the length tolerance.
    pub angular_tolerance: Option<f64>,
    pub max_area: Option<f64>,
    pub max_candidates: Option<u64>,
    /// Seconds.
    pub time_limit: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileStackingConfig {
    pub weight: Option<f64>,
    pub distance: Option<f64>,
    pub vacuum: Option<f64>,
    pub normalization: Option<Normalization>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSymmetryConfig {
    pub symprec: Option<f64>,
    pub angle_tolerance: Option<f64>,
    pub idealize: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSweepConfig {
    pub step: Option<f64>,
    pub max_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBuildConfig {
    pub max_interfaces: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub search: Option<FileSearchConfig>,
    pub stacking: Option<FileStackingConfig>,
    pub symmetry: Option<FileSymmetryConfig>,
    pub sweep: Option<FileSweepConfig>,
    pub build: Option<FileBuildConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
