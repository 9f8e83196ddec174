use crate::core::cell::normalize::Normalization;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter,
        reason: reason.into(),
    }
}

/// Upper bound on the number of angles a sweep may expand to.
pub const MAX_SWEEP_ANGLES: usize = 1_000_000;

/// Upper bound on the number of tolerance levels of a match sweep.
pub const MAX_TOLERANCE_LEVELS: usize = 100_000;

/// Rotation angles (degrees) applied to the top layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AngleSelection {
    Explicit(Vec<f64>),
    /// `start, start + step, ...` up to and including `stop`.
    Sweep { start: f64, stop: f64, step: f64 },
}

impl AngleSelection {
    pub fn angles(&self) -> Vec<f64> {
        match self {
            Self::Explicit(angles) => angles.clone(),
            Self::Sweep { start, stop, step } => {
                let count = ((stop - start) / step + 1e-9).floor() as usize;
                (0..=count).map(|i| start + i as f64 * step).collect()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Explicit(angles) if angles.is_empty() => {
                Err(invalid("angles", "at least one angle is required"))
            }
            Self::Explicit(angles) if angles.iter().any(|a| !a.is_finite()) => {
                Err(invalid("angles", "angles must be finite"))
            }
            Self::Sweep { start, stop, .. } if !start.is_finite() || !stop.is_finite() => Err(
                invalid("angle_limits", format!("must be finite, got [{}, {}]", start, stop)),
            ),
            Self::Sweep { step, .. } if !(*step > 0.0) || !step.is_finite() => {
                Err(invalid("angle_step", format!("must be positive, got {}", step)))
            }
            Self::Sweep { start, stop, .. } if stop < start => Err(invalid(
                "angle_limits",
                format!("upper limit {} is below lower limit {}", stop, start),
            )),
            Self::Sweep { start, stop, step } if (stop - start) / step >= MAX_SWEEP_ANGLES as f64 => {
                Err(invalid(
                    "angle_step",
                    format!(
                        "step {} over [{}, {}] exceeds {} angles",
                        step, start, stop, MAX_SWEEP_ANGLES
                    ),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Which integer coefficients a superlattice vector may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoefficientRange {
    /// Entries in `[-n_max, n_max]`; at least one entry with `|entry| >= n_min`.
    #[default]
    Symmetric,
    /// Entries in `[n_min, n_max]`.
    Bounded,
}

/// Tolerance on the enclosed angle of a superlattice basis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AngularTolerance {
    /// Length tolerance divided by the mean length of the four superlattice
    /// vectors, in radians.
    #[default]
    Derived,
    Fixed { degrees: f64 },
}

/// Per-search limits; exhaustion ends the search early with the solutions
/// found so far.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SearchBudget {
    pub max_candidates: Option<u64>,
    pub time_limit: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub n_max: i64,
    pub n_min: i64,
    pub coefficient_range: CoefficientRange,
    pub angles: AngleSelection,
    /// Absolute length tolerance in Angstrom.
    pub tolerance: f64,
    pub angular_tolerance: AngularTolerance,
    /// Upper bound on the bottom superlattice area in square Angstrom.
    pub max_area: Option<f64>,
    pub budget: SearchBudget,
}

impl SearchConfig {
    /// Same search with a different length tolerance.
    pub fn with_tolerance(&self, tolerance: f64) -> Self {
        Self {
            tolerance,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_max < 1 {
            return Err(invalid("n_max", format!("must be at least 1, got {}", self.n_max)));
        }
        if self.n_min < 0 || self.n_min > self.n_max {
            return Err(invalid(
                "n_min",
                format!("must lie in [0, n_max = {}], got {}", self.n_max, self.n_min),
            ));
        }
        if !(self.tolerance > 0.0) || !self.tolerance.is_finite() {
            return Err(invalid(
                "tolerance",
                format!("must be positive, got {}", self.tolerance),
            ));
        }
        if let AngularTolerance::Fixed { degrees } = self.angular_tolerance {
            if !(degrees > 0.0) {
                return Err(invalid(
                    "angular_tolerance",
                    format!("must be positive, got {}", degrees),
                ));
            }
        }
        if let Some(area) = self.max_area {
            if !(area > 0.0) {
                return Err(invalid("max_area", format!("must be positive, got {}", area)));
            }
        }
        self.angles.validate()
    }
}

#[derive(Default)]
pub struct SearchConfigBuilder {
    n_max: Option<i64>,
    n_min: Option<i64>,
    coefficient_range: Option<CoefficientRange>,
    angles: Option<AngleSelection>,
    tolerance: Option<f64>,
    angular_tolerance: Option<AngularTolerance>,
    max_area: Option<f64>,
    budget: Option<SearchBudget>,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_max(mut self, n: i64) -> Self {
        self.n_max = Some(n);
        self
    }
    pub fn n_min(mut self, n: i64) -> Self {
        self.n_min = Some(n);
        self
    }
    pub fn coefficient_range(mut self, range: CoefficientRange) -> Self {
        self.coefficient_range = Some(range);
        self
    }
    pub fn angles(mut self, angles: AngleSelection) -> Self {
        self.angles = Some(angles);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn angular_tolerance(mut self, tolerance: AngularTolerance) -> Self {
        self.angular_tolerance = Some(tolerance);
        self
    }
    pub fn max_area(mut self, area: f64) -> Self {
        self.max_area = Some(area);
        self
    }
    pub fn budget(mut self, budget: SearchBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn build(self) -> Result<SearchConfig, ConfigError> {
        let config = SearchConfig {
            n_max: self.n_max.ok_or(ConfigError::MissingParameter("n_max"))?,
            n_min: self.n_min.unwrap_or(0),
            coefficient_range: self.coefficient_range.unwrap_or_default(),
            angles: self.angles.ok_or(ConfigError::MissingParameter("angles"))?,
            tolerance: self
                .tolerance
                .ok_or(ConfigError::MissingParameter("tolerance"))?,
            angular_tolerance: self.angular_tolerance.unwrap_or_default(),
            max_area: self.max_area,
            budget: self.budget.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackingConfig {
    /// Cell interpolation: 0 keeps the bottom superlattice, 1 the top one.
    pub weight: f64,
    /// Interlayer distance in Angstrom.
    pub distance: f64,
    /// Vacuum added on top of the combined atomic span, in Angstrom.
    pub vacuum: f64,
    pub normalization: Normalization,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            weight: 0.5,
            distance: 4.0,
            vacuum: 15.0,
            normalization: Normalization::Centered,
        }
    }
}

impl StackingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(invalid(
                "weight",
                format!("must lie in [0, 1], got {}", self.weight),
            ));
        }
        if !(self.distance >= 0.0) {
            return Err(invalid(
                "distance",
                format!("must not be negative, got {}", self.distance),
            ));
        }
        if !(self.vacuum >= 0.0) {
            return Err(invalid(
                "vacuum",
                format!("must not be negative, got {}", self.vacuum),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetryConfig {
    /// Length precision in Angstrom for the primitive check and idealization.
    pub symprec: f64,
    /// Angle tolerance in degrees.
    pub angle_tolerance: f64,
    /// Rebuild the interface cell from its symmetrized lattice metric.
    pub idealize: bool,
}

impl Default for SymmetryConfig {
    fn default() -> Self {
        Self {
            symprec: 1e-5,
            angle_tolerance: 5.0,
            idealize: true,
        }
    }
}

impl SymmetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.symprec > 0.0) {
            return Err(invalid(
                "symprec",
                format!("must be positive, got {}", self.symprec),
            ));
        }
        if !(self.angle_tolerance >= 0.0) {
            return Err(invalid(
                "angle_tolerance",
                format!("must not be negative, got {}", self.angle_tolerance),
            ));
        }
        Ok(())
    }
}

/// Tolerance levels `step, 2 * step, ...` up to `max_tolerance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    pub step: f64,
    pub max_tolerance: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            step: 0.05,
            max_tolerance: 0.2,
        }
    }
}

impl SweepConfig {
    pub fn levels(&self) -> Vec<f64> {
        let count = (self.max_tolerance / self.step + 1e-9).floor() as usize;
        (1..=count).map(|k| k as f64 * self.step).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(invalid("step", format!("must be positive, got {}", self.step)));
        }
        if !self.max_tolerance.is_finite() {
            return Err(invalid(
                "max_tolerance",
                format!("must be finite, got {}", self.max_tolerance),
            ));
        }
        if self.max_tolerance / self.step > MAX_TOLERANCE_LEVELS as f64 {
            return Err(invalid(
                "step",
                format!(
                    "step {} up to {} exceeds {} tolerance levels",
                    self.step, self.max_tolerance, MAX_TOLERANCE_LEVELS
                ),
            ));
        }
        if self.max_tolerance < self.step {
            return Err(invalid(
                "max_tolerance",
                format!(
                    "must be at least one step ({}), got {}",
                    self.step, self.max_tolerance
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub search: SearchConfig,
    pub stacking: StackingConfig,
    pub symmetry: SymmetryConfig,
    /// Build interfaces only for the first `n` solutions.
    pub max_interfaces: Option<usize>,
}

#[derive(Default)]
pub struct BuildConfigBuilder {
    search: Option<SearchConfig>,
    stacking: Option<StackingConfig>,
    symmetry: Option<SymmetryConfig>,
    max_interfaces: Option<usize>,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, search: SearchConfig) -> Self {
        self.search = Some(search);
        self
    }
    pub fn stacking(mut self, stacking: StackingConfig) -> Self {
        self.stacking = Some(stacking);
        self
    }
    pub fn symmetry(mut self, symmetry: SymmetryConfig) -> Self {
        self.symmetry = Some(symmetry);
        self
    }
    pub fn max_interfaces(mut self, n: usize) -> Self {
        self.max_interfaces = Some(n);
        self
    }

    pub fn build(self) -> Result<BuildConfig, ConfigError> {
        let search = self.search.ok_or(ConfigError::MissingParameter("search"))?;
        let stacking = self.stacking.unwrap_or_default();
        let symmetry = self.symmetry.unwrap_or_default();
        search.validate()?;
        stacking.validate()?;
        symmetry.validate()?;
        Ok(BuildConfig {
            search,
            stacking,
            symmetry,
            max_interfaces: self.max_interfaces,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Search parameters; the tolerance is replaced by each sweep level.
    pub search: SearchConfig,
    pub stacking: StackingConfig,
    pub symmetry: SymmetryConfig,
    pub sweep: SweepConfig,
}

#[derive(Default)]
pub struct MatchConfigBuilder {
    search: Option<SearchConfig>,
    stacking: Option<StackingConfig>,
    symmetry: Option<SymmetryConfig>,
    sweep: Option<SweepConfig>,
}

impl MatchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, search: SearchConfig) -> Self {
        self.search = Some(search);
        self
    }
    pub fn stacking(mut self, stacking: StackingConfig) -> Self {
        self.stacking = Some(stacking);
        self
    }
    pub fn symmetry(mut self, symmetry: SymmetryConfig) -> Self {
        self.symmetry = Some(symmetry);
        self
    }
    pub fn sweep(mut self, sweep: SweepConfig) -> Self {
        self.sweep = Some(sweep);
        self
    }

    pub fn build(self) -> Result<MatchConfig, ConfigError> {
        let search = self.search.ok_or(ConfigError::MissingParameter("search"))?;
        let stacking = self.stacking.unwrap_or_default();
        let symmetry = self.symmetry.unwrap_or_default();
        let sweep = self.sweep.unwrap_or_default();
        search.validate()?;
        stacking.validate()?;
        symmetry.validate()?;
        sweep.validate()?;
        Ok(MatchConfig {
            search,
            stacking,
            symmetry,
            sweep,
        })
    }
}
