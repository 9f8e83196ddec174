use super::{read_layer, write_interface};
use crate::cli::MatchArgs;
use crate::config::build_match_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use hetbuilder::core::symmetry::MoyoSymmetry;
use hetbuilder::engine::progress::ProgressReporter;
use hetbuilder::workflows;
use tracing::{info, warn};

pub fn run(args: MatchArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_match_config(&args)?;
    let config = &app.core_config;

    let bottom = read_layer(&app.lower_path)?;
    let top = read_layer(&app.upper_path)?;

    let provider = MoyoSymmetry::new(Some(config.symmetry.angle_tolerance));
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Sweeping tolerances up to {} A in steps of {} A...",
        config.sweep.max_tolerance, config.sweep.step
    );
    let Some(result) = workflows::matching::run(&bottom, &top, config, &provider, &reporter)?
    else {
        warn!("Tolerance sweep finished without a match.");
        println!(
            "No coincidence lattice found up to a tolerance of {} A.",
            config.sweep.max_tolerance
        );
        return Ok(());
    };

    if result.truncated {
        println!("Warning: the search budget ran out; a better match may exist.");
    }

    std::fs::create_dir_all(&app.output_dir)?;
    let path = app.output_dir.join(result.interface.default_file_name());
    write_interface(&result.interface, &path)?;

    println!(
        "✓ Best interface at tolerance {:.3} A ({} candidate(s)): angle {:.4} deg, stress {:.4} %, {} atoms",
        result.tolerance,
        result.candidates,
        result.solution.angle,
        result.solution.stress,
        result.interface.structure.len()
    );
    println!("  Written to: {}", path.display());
    Ok(())
}
