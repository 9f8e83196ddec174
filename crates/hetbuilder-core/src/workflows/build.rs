use crate::core::models::structure::Structure;
use crate::core::symmetry::SymmetryProvider;
use crate::engine::config::{BuildConfig, SymmetryConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{CoincidenceSolution, Interface};
use crate::engine::tasks;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Validated and normalized input layers.
    pub bottom: Structure,
    pub top: Structure,
    /// Every accepted solution, ordered by ascending strain.
    pub solutions: Vec<CoincidenceSolution>,
    /// Interfaces for the leading solutions, in the same order.
    pub interfaces: Vec<Interface>,
    /// The search budget ran out before the whole grid was searched.
    pub truncated: bool,
}

impl BuildResult {
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
}

/// Validates both input layers under the labels `"bottom"` and `"top"`.
pub(crate) fn validate_layers(
    bottom: &Structure,
    top: &Structure,
    provider: &dyn SymmetryProvider,
    symmetry: &SymmetryConfig,
    reporter: &ProgressReporter,
) -> Result<(Structure, Structure), EngineError> {
    reporter.report(Progress::PhaseStart { name: "Validation" });
    let bottom = tasks::validation::run("bottom", bottom, provider, symmetry)?;
    let top = tasks::validation::run("top", top, provider, symmetry)?;
    reporter.report(Progress::PhaseFinish);
    Ok((bottom, top))
}

/// Searches once at the configured tolerance and stacks an interface for
/// every accepted solution, or for the first `max_interfaces` of them.
///
/// An empty solution set is a normal result.
///
/// # Errors
///
/// Fails on invalid input layers, degenerate cells and invalid configuration.
#[instrument(skip_all, name = "build_workflow")]
pub fn run(
    bottom: &Structure,
    top: &Structure,
    config: &BuildConfig,
    provider: &dyn SymmetryProvider,
    reporter: &ProgressReporter,
) -> Result<BuildResult, EngineError> {
    let (bottom, top) = validate_layers(bottom, top, provider, &config.symmetry, reporter)?;

    reporter.report(Progress::PhaseStart {
        name: "Coincidence Search",
    });
    let outcome = tasks::coincidence::run(&bottom, &top, &config.search, reporter)?;
    reporter.report(Progress::PhaseFinish);

    let count = config
        .max_interfaces
        .map_or(outcome.solutions.len(), |max| max.min(outcome.solutions.len()));
    let selected = &outcome.solutions[..count];

    reporter.report(Progress::PhaseStart {
        name: "Interface Assembly",
    });
    reporter.report(Progress::TaskStart {
        total_steps: count as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = selected.iter();

    #[cfg(feature = "parallel")]
    let iterator = selected.par_iter();

    let interfaces = iterator
        .map(|solution| {
            let interface = tasks::interface::run(
                &bottom,
                &top,
                solution.clone(),
                &config.stacking,
                provider,
                &config.symmetry,
            );
            reporter.report(Progress::TaskIncrement);
            interface
        })
        .collect::<Result<Vec<_>, _>>()?;

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!(
        solutions = outcome.solutions.len(),
        interfaces = interfaces.len(),
        truncated = outcome.truncated,
        "Build workflow complete."
    );
    Ok(BuildResult {
        bottom,
        top,
        solutions: outcome.solutions,
        interfaces,
        truncated: outcome.truncated,
    })
}
