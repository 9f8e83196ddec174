use crate::core::models::structure::{SINGULAR_CELL_EPS, Structure};
use crate::core::utils::geometry::{enclosed_angle, right_stretch_strain, rotate_2d};
use crate::core::utils::lattice::{
    IntMatrix2, det2, in_plane_block, integer_left_quotient, lattice_point, mul2,
};
use crate::engine::budget::BudgetTracker;
use crate::engine::config::{AngularTolerance, CoefficientRange, SearchConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{CoincidenceSolution, SearchOutcome};
use itertools::Itertools;
use nalgebra::{Matrix2, Vector2};
use std::cmp::Ordering;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Resolution used when comparing strains and lengths for deduplication.
const QUANTUM: f64 = 1e-8;

/// A bottom lattice point `p = A^T m` lying within tolerance of a rotated top
/// lattice point `q = (RB)^T n`.
#[derive(Debug, Clone, Copy)]
struct PointMatch {
    m: [i64; 2],
    n: [i64; 2],
    p: Vector2<f64>,
    q: Vector2<f64>,
}

#[derive(Debug, Clone)]
struct Candidate {
    m: IntMatrix2,
    n: IntMatrix2,
    det: i64,
    stress: f64,
    norm: f64,
    area: f64,
}

fn quantize(value: f64) -> i64 {
    (value / QUANTUM).round() as i64
}

fn planar_basis(structure: &Structure, label: &str) -> Result<Matrix2<f64>, EngineError> {
    let basis = in_plane_block(structure.cell());
    if basis.determinant().abs() < SINGULAR_CELL_EPS {
        return Err(EngineError::DegenerateCell(format!(
            "in-plane lattice of the {} layer is singular",
            label
        )));
    }
    Ok(basis)
}

fn rotated_basis(basis: &Matrix2<f64>, angle: f64) -> Matrix2<f64> {
    let first = rotate_2d(&basis.row(0).transpose(), angle);
    let second = rotate_2d(&basis.row(1).transpose(), angle);
    Matrix2::from_rows(&[first.transpose(), second.transpose()])
}

fn is_admissible(n: &[i64; 2], n_min: i64, n_max: i64, range: CoefficientRange) -> bool {
    if n == &[0, 0] {
        return false;
    }
    match range {
        CoefficientRange::Symmetric => {
            n.iter().all(|c| c.abs() <= n_max) && n.iter().any(|c| c.abs() >= n_min)
        }
        CoefficientRange::Bounded => n.iter().all(|c| (n_min..=n_max).contains(c)),
    }
}

/// All integer coefficient vectors a superlattice vector may use.
pub fn coefficient_vectors(n_min: i64, n_max: i64, range: CoefficientRange) -> Vec<[i64; 2]> {
    let bounds = match range {
        CoefficientRange::Symmetric => -n_max..=n_max,
        CoefficientRange::Bounded => n_min..=n_max,
    };
    bounds
        .clone()
        .cartesian_product(bounds)
        .map(|(i, j)| [i, j])
        .filter(|n| is_admissible(n, n_min, n_max, range))
        .collect()
}

/// Angular tolerance in radians for a pair of superlattice bases.
fn angular_tolerance(config: &SearchConfig, lengths: [f64; 4]) -> f64 {
    match config.angular_tolerance {
        AngularTolerance::Derived => {
            let mean = lengths.iter().sum::<f64>() / 4.0;
            config.tolerance / mean
        }
        AngularTolerance::Fixed { degrees } => degrees.to_radians(),
    }
}

/// Vector lengths agree within the tolerance and the enclosed angles within
/// the angular tolerance.
fn is_coincident(
    p: [&Vector2<f64>; 2],
    q: [&Vector2<f64>; 2],
    config: &SearchConfig,
) -> bool {
    let lengths = [p[0].norm(), p[1].norm(), q[0].norm(), q[1].norm()];
    if (lengths[0] - lengths[2]).abs() >= config.tolerance
        || (lengths[1] - lengths[3]).abs() >= config.tolerance
    {
        return false;
    }
    let delta = (enclosed_angle(p[0], p[1]) - enclosed_angle(q[0], q[1])).abs();
    delta < angular_tolerance(config, lengths)
}

/// Bottom lattice points that have a rotated top lattice point within the
/// length tolerance.
fn matching_points(
    bottom: &Matrix2<f64>,
    top: &Matrix2<f64>,
    coefficients: &[[i64; 2]],
    config: &SearchConfig,
) -> Vec<PointMatch> {
    let Some(inverse) = top.transpose().try_inverse() else {
        return Vec::new();
    };
    // |dn_k| <= |row_k(inverse)| * |dp| bounds the integer search window.
    let spread = [
        config.tolerance * inverse.row(0).norm(),
        config.tolerance * inverse.row(1).norm(),
    ];

    let mut matches = Vec::new();
    for m in coefficients {
        let p = lattice_point(m, bottom);
        let n_real = inverse * p;
        let window = |k: usize| {
            (n_real[k] - spread[k]).ceil() as i64..=(n_real[k] + spread[k]).floor() as i64
        };
        for (i, j) in window(0).cartesian_product(window(1)) {
            let n = [i, j];
            if !is_admissible(&n, config.n_min, config.n_max, config.coefficient_range) {
                continue;
            }
            let q = lattice_point(&n, top);
            if (p - q).norm() < config.tolerance {
                matches.push(PointMatch { m: *m, n, p, q });
            }
        }
    }
    matches
}

/// Combines two point matches into a right-handed superlattice pair and
/// scores it, or rejects it.
fn evaluate_pair(
    first: &PointMatch,
    second: &PointMatch,
    bottom_area: f64,
    config: &SearchConfig,
) -> Option<Candidate> {
    let (e1, e2) = match det2(&[first.m, second.m]).cmp(&0) {
        Ordering::Greater => (first, second),
        Ordering::Less => (second, first),
        Ordering::Equal => return None,
    };
    let m = [e1.m, e2.m];
    let n = [e1.n, e2.n];
    if det2(&n) <= 0 {
        return None;
    }
    let det = det2(&m);
    let area = det as f64 * bottom_area;
    if config.max_area.is_some_and(|max| area > max) {
        return None;
    }
    if !is_coincident([&e1.p, &e2.p], [&e1.q, &e2.q], config) {
        return None;
    }
    let bottom_cell = Matrix2::from_columns(&[e1.p, e2.p]);
    let top_cell = Matrix2::from_columns(&[e1.q, e2.q]);
    let stress = right_stretch_strain(&bottom_cell, &top_cell)?;
    Some(Candidate {
        m,
        n,
        det,
        stress,
        norm: e1.p.norm_squared() + e2.p.norm_squared(),
        area,
    })
}

/// `kept` generates `candidate` if both of its matrices are the same integer
/// multiple `K` of the kept ones, i.e. the candidate is a basis change or a
/// supercell of an already accepted superlattice pair.
fn generates(kept: &Candidate, candidate: &Candidate) -> bool {
    integer_left_quotient(&candidate.m, &kept.m).is_some_and(|k| mul2(&k, &kept.n) == candidate.n)
}

/// Keeps one canonical representative per equivalence class. Smaller cells
/// come first; ties go to lower strain, shorter vectors, then the
/// lexicographically largest matrices.
fn deduplicate(angle: f64, mut candidates: Vec<Candidate>) -> Vec<CoincidenceSolution> {
    candidates.sort_by(|x, y| {
        x.det
            .cmp(&y.det)
            .then_with(|| quantize(x.stress).cmp(&quantize(y.stress)))
            .then_with(|| quantize(x.norm).cmp(&quantize(y.norm)))
            .then_with(|| y.m.cmp(&x.m))
            .then_with(|| y.n.cmp(&x.n))
    });
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if !kept.iter().any(|k| generates(k, &candidate)) {
            kept.push(candidate);
        }
    }
    kept.into_iter()
        .map(|c| CoincidenceSolution {
            angle,
            bottom: c.m,
            top: c.n,
            stress: c.stress,
            area: c.area,
        })
        .collect()
}

fn search_angle(
    angle: f64,
    bottom: &Matrix2<f64>,
    top: &Matrix2<f64>,
    coefficients: &[[i64; 2]],
    config: &SearchConfig,
    tracker: &BudgetTracker,
) -> Vec<CoincidenceSolution> {
    if tracker.is_exhausted() {
        return Vec::new();
    }
    let top = rotated_basis(top, angle);
    let matches = matching_points(bottom, &top, coefficients, config);
    let bottom_area = bottom.determinant().abs();

    let mut candidates = Vec::new();
    for (first, second) in matches.iter().tuple_combinations() {
        if !tracker.try_consume() {
            break;
        }
        if let Some(candidate) = evaluate_pair(first, second, bottom_area, config) {
            candidates.push(candidate);
        }
    }
    let solutions = deduplicate(angle, candidates);
    debug!(
        angle,
        point_matches = matches.len(),
        solutions = solutions.len(),
        "Angle evaluated."
    );
    solutions
}

/// Searches rotation angles and integer superlattices for coincidences between
/// two validated layers.
///
/// The in-plane lattice of `top` is rotated by every configured angle. For
/// each angle, integer combinations of both lattices are paired into
/// superlattices whose vector lengths agree within the length tolerance and
/// whose enclosed angles agree within the angular tolerance. Only
/// right-handed pairs are considered, equivalent pairs are reduced to one
/// representative, and the result is ordered by ascending strain.
///
/// An empty outcome is a normal result. When the configured budget runs out,
/// the solutions found so far are returned with `truncated` set.
///
/// # Errors
///
/// Returns [`EngineError::DegenerateCell`] if either in-plane lattice is
/// singular.
#[instrument(skip_all, name = "coincidence_search_task")]
pub fn run(
    bottom: &Structure,
    top: &Structure,
    config: &SearchConfig,
    reporter: &ProgressReporter,
) -> Result<SearchOutcome, EngineError> {
    config.validate()?;
    let bottom_basis = planar_basis(bottom, "bottom")?;
    let top_basis = planar_basis(top, "top")?;
    let angles = config.angles.angles();
    let coefficients = coefficient_vectors(config.n_min, config.n_max, config.coefficient_range);
    info!(
        angles = angles.len(),
        n_max = config.n_max,
        n_min = config.n_min,
        tolerance = config.tolerance,
        "Searching for coincidence lattices."
    );

    let tracker = BudgetTracker::new(&config.budget);
    reporter.report(Progress::TaskStart {
        total_steps: angles.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = angles.iter();

    #[cfg(feature = "parallel")]
    let iterator = angles.par_iter();

    let per_angle: Vec<Vec<CoincidenceSolution>> = iterator
        .map(|&angle| {
            let solutions = search_angle(
                angle,
                &bottom_basis,
                &top_basis,
                &coefficients,
                config,
                &tracker,
            );
            reporter.report(Progress::TaskIncrement);
            solutions
        })
        .collect();

    reporter.report(Progress::TaskFinish);

    let mut solutions: Vec<CoincidenceSolution> = per_angle.into_iter().flatten().collect();
    solutions.sort_by(|a, b| a.ranking(b));

    let outcome = SearchOutcome {
        solutions,
        truncated: tracker.is_exhausted(),
        candidates_examined: tracker.examined(),
    };
    if outcome.truncated {
        warn!(
            candidates = outcome.candidates_examined,
            solutions = outcome.solutions.len(),
            "Search budget exhausted; returning partial results."
        );
    }
    info!(
        solutions = outcome.solutions.len(),
        candidates = outcome.candidates_examined,
        "Coincidence search complete."
    );
    Ok(outcome)
}
