use super::build::validate_layers;
use crate::core::models::structure::Structure;
use crate::core::symmetry::SymmetryProvider;
use crate::engine::config::MatchConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{CoincidenceSolution, Interface};
use crate::engine::tasks;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct MatchResult {
    /// The tolerance level at which the first solution appeared.
    pub tolerance: f64,
    /// Lowest-strain solution at that level.
    pub solution: CoincidenceSolution,
    pub interface: Interface,
    /// Number of solutions found at that level.
    pub candidates: usize,
    pub truncated: bool,
}

/// Finds the best interface with the smallest tolerance that yields one.
///
/// Tolerance levels `step, 2 * step, ...` up to the configured maximum are
/// searched in order. The sweep stops at the first level with a non-empty
/// solution set; its lowest-strain solution is stacked into an interface.
/// Larger tolerances are never tried once a level succeeds.
///
/// Returns `Ok(None)` when no level up to the maximum tolerance produces a
/// solution.
///
/// # Errors
///
/// Fails on invalid input layers, degenerate cells and invalid configuration.
#[instrument(skip_all, name = "matching_workflow")]
pub fn run(
    bottom: &Structure,
    top: &Structure,
    config: &MatchConfig,
    provider: &dyn SymmetryProvider,
    reporter: &ProgressReporter,
) -> Result<Option<MatchResult>, EngineError> {
    let (bottom, top) = validate_layers(bottom, top, provider, &config.symmetry, reporter)?;

    let levels = config.sweep.levels();
    reporter.report(Progress::PhaseStart {
        name: "Tolerance Sweep",
    });
    for (level, &tolerance) in levels.iter().enumerate() {
        reporter.report(Progress::ToleranceLevel {
            tolerance,
            level: level + 1,
            total: levels.len(),
        });
        let search = config.search.with_tolerance(tolerance);
        let outcome = tasks::coincidence::run(&bottom, &top, &search, reporter)?;

        let Some(best) = outcome.best().cloned() else {
            debug!(tolerance, "No coincidence at this tolerance.");
            continue;
        };
        reporter.report(Progress::PhaseFinish);

        info!(
            tolerance,
            stress = best.stress,
            angle = best.angle,
            "Coincidence found."
        );
        let interface = tasks::interface::run(
            &bottom,
            &top,
            best.clone(),
            &config.stacking,
            provider,
            &config.symmetry,
        )?;
        return Ok(Some(MatchResult {
            tolerance,
            solution: best,
            interface,
            candidates: outcome.solutions.len(),
            truncated: outcome.truncated,
        }));
    }
    reporter.report(Progress::PhaseFinish);

    warn!(
        max_tolerance = config.sweep.max_tolerance,
        "No coincidence lattice found up to the maximum tolerance."
    );
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symmetry::NoSymmetry;
    use crate::engine::config::{
        AngleSelection, MatchConfigBuilder, SearchConfigBuilder, SweepConfig,
    };
    use nalgebra::{Matrix3, Point3};
    use std::sync::Mutex;

    fn square_layer(a: f64) -> Structure {
        Structure::new(
            Matrix3::new(a, 0.0, 0.0, 0.0, a, 0.0, 0.0, 0.0, 0.0),
            vec!["C".into()],
            vec![Point3::origin()],
            [true, true, false],
        )
        .unwrap()
    }

    fn config(max_tolerance: f64) -> MatchConfig {
        let search = SearchConfigBuilder::new()
            .n_max(1)
            .angles(AngleSelection::Explicit(vec![0.0]))
            .tolerance(0.05)
            .build()
            .unwrap();
        MatchConfigBuilder::new()
            .search(search)
            .sweep(SweepConfig {
                step: 0.05,
                max_tolerance,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn run_stops_at_first_tolerance_with_a_solution() {
        let levels = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::ToleranceLevel { tolerance, .. } = event {
                levels.lock().unwrap().push(tolerance);
            }
        }));
        let result = run(
            &square_layer(3.0),
            &square_layer(3.07),
            &config(0.2),
            &NoSymmetry,
            &reporter,
        )
        .unwrap()
        .unwrap();
        drop(reporter);

        assert!((result.tolerance - 0.10).abs() < 1e-12);
        assert_eq!(levels.into_inner().unwrap().len(), 2);
        assert_eq!(result.solution.bottom, [[1, 0], [0, 1]]);
        let expected = 100.0 * 2f64.sqrt() * (1.0 - 3.0 / 3.07);
        assert!((result.solution.stress - expected).abs() < 1e-9);
        assert_eq!(result.interface.stress, result.solution.stress);
    }

    #[test]
    fn run_returns_none_when_sweep_is_exhausted() {
        let result = run(
            &square_layer(3.0),
            &square_layer(3.07),
            &config(0.05),
            &NoSymmetry,
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(result.is_none());
    }
}
